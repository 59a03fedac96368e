use std::collections::BTreeMap;
use std::path::Path;

use chrono::{DateTime, Utc};
use nf_core::Result;
use serde::Serialize;
use tracing::info;

use crate::scheduler::SourceStats;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CategorySummary {
    pub articles: usize,
    pub groups: usize,
    pub singletons: usize,
}

/// Operator-facing counts for one run.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub cancelled: bool,
    pub articles_fetched: usize,
    pub articles_rejected: usize,
    pub rejected_by_reason: BTreeMap<String, usize>,
    pub duplicates_dropped: usize,
    pub groups_formed: usize,
    pub singletons: usize,
    pub articles_saved: usize,
    pub persistence_conflicts: usize,
    pub persistence_failures: usize,
    pub sources: BTreeMap<String, SourceStats>,
    pub categories: BTreeMap<String, CategorySummary>,
}

impl RunReport {
    pub fn new(started_at: DateTime<Utc>) -> Self {
        Self {
            started_at,
            finished_at: None,
            cancelled: false,
            articles_fetched: 0,
            articles_rejected: 0,
            rejected_by_reason: BTreeMap::new(),
            duplicates_dropped: 0,
            groups_formed: 0,
            singletons: 0,
            articles_saved: 0,
            persistence_conflicts: 0,
            persistence_failures: 0,
            sources: BTreeMap::new(),
            categories: BTreeMap::new(),
        }
    }

    pub fn record_rejection(&mut self, reason: &str) {
        self.articles_rejected += 1;
        *self.rejected_by_reason.entry(reason.to_string()).or_default() += 1;
    }

    pub fn listing_failures(&self) -> usize {
        self.sources.values().map(|s| s.listing_failures).sum()
    }

    pub fn fetch_failures(&self) -> usize {
        self.sources.values().map(|s| s.fetch_failures).sum()
    }

    pub fn finish(&mut self) {
        self.finished_at = Some(Utc::now());
    }

    pub fn log_summary(&self) {
        info!(
            fetched = self.articles_fetched,
            rejected = self.articles_rejected,
            duplicates = self.duplicates_dropped,
            groups = self.groups_formed,
            singletons = self.singletons,
            saved = self.articles_saved,
            conflicts = self.persistence_conflicts,
            persistence_failures = self.persistence_failures,
            listing_failures = self.listing_failures(),
            fetch_failures = self.fetch_failures(),
            cancelled = self.cancelled,
            "Collection run finished"
        );
        for (source, stats) in &self.sources {
            if stats.listing_failures > 0 || stats.fetch_failures > 0 {
                info!(
                    source = source.as_str(),
                    listed = stats.listed,
                    fetched = stats.fetched,
                    listing_failures = stats.listing_failures,
                    fetch_failures = stats.fetch_failures,
                    "Source had failures"
                );
            }
        }
    }

    pub fn write_json(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }
}
