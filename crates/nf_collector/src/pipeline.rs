//! One collection run end to end: fetch, preprocess, deduplicate, group and
//! persist. Individual failures are counted in the report; `run` itself
//! never fails.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use chrono::Utc;
use futures::future::join_all;
use nf_core::config::AppConfig;
use nf_core::storage::{PersistenceGateway, SaveOutcome};
use nf_core::{CollectionRun, Grouping, ProcessedArticle, RawArticle, Result};
use nf_inference::{create_translator, SimilarityGrouper};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::adapters::{sources_from_config, SourceEntry};
use crate::dedup::DeduplicationIndex;
use crate::preprocess::ArticlePreprocessor;
use crate::report::{CategorySummary, RunReport};
use crate::scheduler::{FetchScheduler, RunPhase};

#[derive(Debug)]
pub struct RunOutput {
    pub run: CollectionRun,
    pub report: RunReport,
}

pub struct Pipeline {
    sources: Vec<SourceEntry>,
    scheduler: FetchScheduler,
    preprocessor: ArticlePreprocessor,
    grouper: SimilarityGrouper,
    gateway: Arc<dyn PersistenceGateway>,
}

impl Pipeline {
    pub fn new(
        sources: Vec<SourceEntry>,
        scheduler: FetchScheduler,
        preprocessor: ArticlePreprocessor,
        grouper: SimilarityGrouper,
        gateway: Arc<dyn PersistenceGateway>,
    ) -> Self {
        Self {
            sources,
            scheduler,
            preprocessor,
            grouper,
            gateway,
        }
    }

    /// Wires HTML adapters, the optional translator and the grouper from
    /// configuration.
    pub fn from_config(config: &AppConfig, gateway: Arc<dyn PersistenceGateway>) -> Result<Self> {
        let sources = sources_from_config(config)?;
        let translator = create_translator(&config.translator);
        if translator.is_none() {
            debug!("No translator endpoint configured");
        }
        Ok(Self::new(
            sources,
            FetchScheduler::new(config.scheduler.clone()),
            ArticlePreprocessor::new(config.preprocess.clone(), translator),
            SimilarityGrouper::new(config.grouping.clone()),
            gateway,
        ))
    }

    pub fn sources(&self) -> &[SourceEntry] {
        &self.sources
    }

    pub fn phase(&self) -> watch::Receiver<RunPhase> {
        self.scheduler.subscribe()
    }

    pub async fn run(&self, cancel: &CancellationToken) -> RunOutput {
        let started_at = Utc::now();
        let mut report = RunReport::new(started_at);
        let mut run = CollectionRun::new(started_at);

        let fetched = self.scheduler.run(&self.sources, cancel).await;
        report.articles_fetched = fetched.fetched();
        report.cancelled = fetched.cancelled;
        report.sources = fetched.stats;

        let mut categories: BTreeSet<String> = self
            .sources
            .iter()
            .flat_map(|entry| entry.categories.iter().map(|(category, _)| category.clone()))
            .collect();
        categories.extend(fetched.articles.keys().cloned());
        let mut raw_by_category = fetched.articles;

        // Categories are independent; each one preprocesses its articles concurrently.
        let processed = join_all(categories.iter().map(|category| {
            let raw = raw_by_category.remove(category).unwrap_or_default();
            self.preprocess(raw)
        }))
        .await;

        let mut index = DeduplicationIndex::new(self.gateway.clone());
        let mut batches = Vec::with_capacity(categories.len());
        for (category, (articles, rejections)) in categories.iter().zip(processed) {
            for reason in rejections {
                report.record_rejection(reason);
            }
            let deduped = index.filter(articles).await;
            report.duplicates_dropped += deduped.dropped();
            batches.push((category.as_str(), deduped.kept));
        }

        let groupings = join_all(
            batches
                .iter()
                .map(|(category, articles)| self.group(category, articles.clone())),
        )
        .await;

        for ((category, articles), grouping) in batches.into_iter().zip(groupings) {
            report.groups_formed += grouping.groups.len();
            report.singletons += grouping.singletons.len();
            report.categories.insert(
                category.to_string(),
                CategorySummary {
                    articles: articles.len(),
                    groups: grouping.groups.len(),
                    singletons: grouping.singletons.len(),
                },
            );
            self.persist(category, &grouping, &mut report).await;
            run.record(category, articles, grouping);
        }

        report.finish();
        report.log_summary();
        RunOutput { run, report }
    }

    /// Returns the surviving articles in input order and the reason code of
    /// every rejection.
    async fn preprocess(&self, raw: Vec<RawArticle>) -> (Vec<ProcessedArticle>, Vec<&'static str>) {
        let results = join_all(raw.into_iter().map(|article| async move {
            let url = article.url.clone();
            let source = article.source_name.clone();
            (url, source, self.preprocessor.process(article).await)
        }))
        .await;

        let mut kept = Vec::with_capacity(results.len());
        let mut rejections = Vec::new();
        for (url, source, result) in results {
            match result {
                Ok(article) => kept.push(article),
                Err(rejection) => {
                    debug!(url = %url, source = %source, reason = %rejection, "Article rejected");
                    rejections.push(rejection.as_str());
                }
            }
        }
        (kept, rejections)
    }

    /// Clustering is CPU-bound and runs off the async workers.
    async fn group(&self, category: &str, articles: Vec<ProcessedArticle>) -> Grouping {
        let grouper = self.grouper.clone();
        let fallback = articles.clone();
        match tokio::task::spawn_blocking(move || grouper.group(articles)).await {
            Ok(grouping) => {
                info!(
                    category,
                    articles = grouping.article_count(),
                    groups = grouping.groups.len(),
                    singletons = grouping.singletons.len(),
                    "Grouped category"
                );
                grouping
            }
            Err(e) => {
                warn!(category, error = %e, "Grouping task failed, keeping every article as a singleton");
                Grouping::all_singletons(fallback)
            }
        }
    }

    async fn persist(&self, category: &str, grouping: &Grouping, report: &mut RunReport) {
        for group in &grouping.groups {
            let representative = group.representative();
            let outcome = self
                .gateway
                .save_story_group(representative, group.members())
                .await;
            record_save(category, &representative.url, outcome, report);
        }
        for article in &grouping.singletons {
            let outcome = self.gateway.save_singleton(article).await;
            record_save(category, &article.url, outcome, report);
        }
    }
}

fn record_save(category: &str, url: &str, outcome: Result<SaveOutcome>, report: &mut RunReport) {
    match outcome {
        Ok(SaveOutcome::Created(id)) => {
            report.articles_saved += 1;
            debug!(category, url, article_id = %id, "Saved");
        }
        Ok(SaveOutcome::AlreadyExists) => {
            report.persistence_conflicts += 1;
            debug!(category, url, "Already stored, skipping");
        }
        Err(e) => {
            report.persistence_failures += 1;
            warn!(category, url, error = %e, "Failed to save article");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use nf_core::config::{GroupingConfig, PreprocessConfig, SchedulerConfig};
    use nf_storage::InMemoryStorage;

    use super::*;
    use crate::testing::ScriptedAdapter;

    #[tokio::test]
    async fn empty_categories_are_reported_without_articles() {
        let adapter = Arc::new(ScriptedAdapter::new("a"));
        let pipeline = Pipeline::new(
            vec![SourceEntry::new(adapter).with_category("world", &["/world"])],
            FetchScheduler::new(SchedulerConfig {
                politeness_min_ms: 0,
                politeness_max_ms: 0,
                ..SchedulerConfig::default()
            }),
            ArticlePreprocessor::new(PreprocessConfig::default(), None),
            SimilarityGrouper::new(GroupingConfig::default()),
            Arc::new(InMemoryStorage::new()),
        );

        let output = pipeline.run(&CancellationToken::new()).await;
        assert_eq!(output.report.categories["world"], CategorySummary::default());
        assert!(output.run.articles["world"].is_empty());
        assert!(output.report.finished_at.is_some());
    }
}
