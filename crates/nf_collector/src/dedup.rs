use std::collections::HashSet;
use std::sync::Arc;

use nf_core::storage::PersistenceGateway;
use nf_core::ProcessedArticle;
use tracing::{debug, warn};

/// Result of filtering one batch.
#[derive(Debug, Default)]
pub struct DedupOutcome {
    pub kept: Vec<ProcessedArticle>,
    /// Already seen earlier in this run.
    pub dropped_seen: usize,
    /// Already present in the persistent store.
    pub dropped_persisted: usize,
}

impl DedupOutcome {
    pub fn dropped(&self) -> usize {
        self.dropped_seen + self.dropped_persisted
    }
}

/// Exact-match URL filter over the run and the persistent store.
///
/// URLs are remembered for the whole run, so the first article with a given
/// URL wins regardless of category.
pub struct DeduplicationIndex {
    gateway: Arc<dyn PersistenceGateway>,
    seen: HashSet<String>,
}

impl DeduplicationIndex {
    pub fn new(gateway: Arc<dyn PersistenceGateway>) -> Self {
        Self {
            gateway,
            seen: HashSet::new(),
        }
    }

    /// Keeps articles whose URL is neither stored nor seen earlier, in input
    /// order. A failed lookup keeps the article; the save step is the last
    /// line against duplicates.
    pub async fn filter(&mut self, articles: Vec<ProcessedArticle>) -> DedupOutcome {
        let mut outcome = DedupOutcome::default();
        for article in articles {
            if !self.seen.insert(article.url.clone()) {
                debug!(url = %article.url, source = %article.source_name, "Duplicate URL in run");
                outcome.dropped_seen += 1;
                continue;
            }
            match self.gateway.exists_by_url(&article.url).await {
                Ok(true) => {
                    debug!(url = %article.url, "Already stored");
                    outcome.dropped_persisted += 1;
                }
                Ok(false) => outcome.kept.push(article),
                Err(e) => {
                    warn!(url = %article.url, error = %e, "URL lookup failed; keeping article");
                    outcome.kept.push(article);
                }
            }
        }
        outcome
    }
}
