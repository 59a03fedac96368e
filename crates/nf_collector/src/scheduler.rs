//! Concurrent listing and fetching across all configured sources.
//!
//! A run moves through `Idle → Listing → Fetching → Draining → Done`.
//! Listing calls all run at once, each retried with jittered exponential
//! backoff. Article fetches are bounded by a global semaphore shared by
//! every source plus a per-source one, and each fetch waits a random
//! politeness delay first. Failures are counted and logged per source;
//! nothing raised by an adapter escapes `run`.

use std::collections::{BTreeMap, HashSet};
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use nf_core::config::SchedulerConfig;
use nf_core::source::SourceAdapter;
use nf_core::{ArticleReference, FetchError, FetchFailure, ListingError, RawArticle};
use rand::Rng;
use serde::Serialize;
use tokio::sync::{watch, Semaphore};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::adapters::SourceEntry;
use crate::retry::RetryConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RunPhase {
    Idle,
    Listing,
    Fetching,
    Draining,
    Done,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SourceStats {
    pub listed: usize,
    pub fetched: usize,
    pub listing_failures: usize,
    pub fetch_failures: usize,
}

#[derive(Debug, Default)]
pub struct FetchOutcome {
    /// Successful articles per category, in source, path and listing order.
    pub articles: BTreeMap<String, Vec<RawArticle>>,
    pub stats: BTreeMap<String, SourceStats>,
    pub cancelled: bool,
}

impl FetchOutcome {
    pub fn fetched(&self) -> usize {
        self.articles.values().map(Vec::len).sum()
    }
}

struct FetchJob<'a> {
    source: usize,
    adapter: &'a dyn SourceAdapter,
    category: &'a str,
    reference: ArticleReference,
}

/// `None` when `cancel` fires before `future` completes.
async fn cancellable<F: Future>(cancel: &CancellationToken, future: F) -> Option<F::Output> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => None,
        output = future => Some(output),
    }
}

pub struct FetchScheduler {
    config: SchedulerConfig,
    global: Arc<Semaphore>,
    phase: watch::Sender<RunPhase>,
}

impl FetchScheduler {
    pub fn new(config: SchedulerConfig) -> Self {
        let global = Arc::new(Semaphore::new(config.max_in_flight.max(1)));
        let (phase, _) = watch::channel(RunPhase::Idle);
        Self {
            config,
            global,
            phase,
        }
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    pub fn subscribe(&self) -> watch::Receiver<RunPhase> {
        self.phase.subscribe()
    }

    pub fn phase(&self) -> RunPhase {
        *self.phase.borrow()
    }

    fn enter(&self, phase: RunPhase) {
        self.phase.send_replace(phase);
        debug!(?phase, "Scheduler phase");
    }

    pub async fn run(&self, sources: &[SourceEntry], cancel: &CancellationToken) -> FetchOutcome {
        let mut outcome = FetchOutcome::default();
        for entry in sources {
            outcome.stats.entry(entry.name().to_string()).or_default();
        }

        self.enter(RunPhase::Listing);
        let jobs = self.list_all(sources, cancel, &mut outcome.stats).await;
        info!(
            sources = sources.len(),
            articles = jobs.len(),
            "Listing finished"
        );

        if cancel.is_cancelled() {
            self.enter(RunPhase::Draining);
        } else {
            self.enter(RunPhase::Fetching);
            let results = self.fetch_all(sources, &jobs, cancel).await;
            for (job, result) in jobs.iter().zip(results) {
                let name = sources[job.source].name();
                let Some(stats) = outcome.stats.get_mut(name) else {
                    continue;
                };
                match result {
                    Some(Ok(article)) => {
                        stats.fetched += 1;
                        outcome
                            .articles
                            .entry(job.category.to_string())
                            .or_default()
                            .push(article);
                    }
                    Some(Err(e)) => {
                        stats.fetch_failures += 1;
                        warn!(
                            source = name,
                            category = job.category,
                            url = %e.url,
                            reason = %e.reason,
                            "Article fetch failed"
                        );
                    }
                    None => {}
                }
            }
            // Fetching only reaches Draining itself once every job has started.
            self.phase.send_if_modified(|phase| {
                if *phase == RunPhase::Fetching {
                    *phase = RunPhase::Draining;
                    true
                } else {
                    false
                }
            });
        }

        outcome.cancelled = cancel.is_cancelled();
        self.enter(RunPhase::Done);
        info!(
            fetched = outcome.fetched(),
            cancelled = outcome.cancelled,
            "Fetching finished"
        );
        outcome
    }

    /// Lists every (source, category, path) concurrently and flattens the
    /// references into fetch jobs, deduplicated per source and category.
    async fn list_all<'a>(
        &self,
        sources: &'a [SourceEntry],
        cancel: &CancellationToken,
        stats: &mut BTreeMap<String, SourceStats>,
    ) -> Vec<FetchJob<'a>> {
        let mut calls = Vec::new();
        for (source, entry) in sources.iter().enumerate() {
            for (category, paths) in &entry.categories {
                for path in paths {
                    calls.push((source, category.as_str(), path.as_str()));
                }
            }
        }

        let listings = join_all(calls.iter().map(|(source, _, path)| {
            self.list_with_retry(sources[*source].adapter.as_ref(), path, cancel)
        }))
        .await;

        let mut jobs = Vec::new();
        let mut seen: HashSet<(usize, &str, String)> = HashSet::new();
        for ((source, category, path), listing) in calls.into_iter().zip(listings) {
            let entry = &sources[source];
            let Some(stats) = stats.get_mut(entry.name()) else {
                continue;
            };
            match listing {
                Some(Ok(references)) => {
                    debug!(
                        source = entry.name(),
                        category,
                        path,
                        count = references.len(),
                        "Listed category"
                    );
                    for reference in references {
                        if !seen.insert((source, category, reference.url.clone())) {
                            continue;
                        }
                        stats.listed += 1;
                        jobs.push(FetchJob {
                            source,
                            adapter: entry.adapter.as_ref(),
                            category,
                            reference,
                        });
                    }
                }
                Some(Err(e)) => {
                    stats.listing_failures += 1;
                    warn!(
                        source = entry.name(),
                        category,
                        path,
                        reason = %e.reason,
                        "Listing failed"
                    );
                }
                None => {}
            }
        }
        jobs
    }

    async fn list_with_retry(
        &self,
        adapter: &dyn SourceAdapter,
        path: &str,
        cancel: &CancellationToken,
    ) -> Option<Result<Vec<ArticleReference>, ListingError>> {
        let retry = RetryConfig::new(
            self.config.listing_attempts.max(1),
            self.config.listing_backoff_base_ms,
            self.config.listing_backoff_max_ms,
        );
        let mut attempt = 0;
        loop {
            attempt += 1;
            let result = cancellable(cancel, async {
                let _permit = self.global.acquire().await.ok()?;
                let listed =
                    tokio::time::timeout(self.config.request_timeout(), adapter.list_articles(path))
                        .await;
                Some(listed.unwrap_or_else(|_| {
                    Err(ListingError::new(adapter.name(), path, "listing timed out"))
                }))
            })
            .await??;

            match result {
                Ok(references) => return Some(Ok(references)),
                Err(e) if retry.can_retry(attempt) => {
                    let delay = retry.delay_for_attempt(attempt);
                    debug!(
                        source = adapter.name(),
                        path,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        reason = %e.reason,
                        "Retrying listing"
                    );
                    cancellable(cancel, tokio::time::sleep(delay)).await?;
                }
                Err(e) => return Some(Err(e)),
            }
        }
    }

    /// Results come back in job order. `None` marks a job cut short by
    /// cancellation.
    async fn fetch_all(
        &self,
        sources: &[SourceEntry],
        jobs: &[FetchJob<'_>],
        cancel: &CancellationToken,
    ) -> Vec<Option<Result<RawArticle, FetchError>>> {
        let per_source: Vec<Semaphore> = sources
            .iter()
            .map(|_| Semaphore::new(self.config.max_per_source.max(1)))
            .collect();
        let started = AtomicUsize::new(0);
        let total = jobs.len();

        join_all(jobs.iter().map(|job| {
            self.fetch_one(job, &per_source[job.source], cancel, &started, total)
        }))
        .await
    }

    async fn fetch_one(
        &self,
        job: &FetchJob<'_>,
        per_source: &Semaphore,
        cancel: &CancellationToken,
        started: &AtomicUsize,
        total: usize,
    ) -> Option<Result<RawArticle, FetchError>> {
        let _source_permit = cancellable(cancel, per_source.acquire()).await?.ok()?;
        let politeness = self.politeness_delay();
        if !politeness.is_zero() {
            cancellable(cancel, tokio::time::sleep(politeness)).await?;
        }

        let mut attempt = 0;
        loop {
            attempt += 1;
            let result = cancellable(cancel, async {
                let _permit = self.global.acquire().await.ok()?;
                if attempt == 1 && started.fetch_add(1, Ordering::SeqCst) + 1 == total {
                    self.phase.send_if_modified(|phase| {
                        if *phase == RunPhase::Fetching {
                            *phase = RunPhase::Draining;
                            true
                        } else {
                            false
                        }
                    });
                }
                let fetched = tokio::time::timeout(
                    self.config.request_timeout(),
                    job.adapter.fetch_article(&job.reference, job.category),
                )
                .await;
                Some(fetched.unwrap_or_else(|_| {
                    Err(FetchError::new(&job.reference.url, FetchFailure::Timeout))
                }))
            })
            .await??;

            match result {
                Ok(article) => return Some(Ok(article)),
                Err(e) if e.is_retryable() && attempt <= self.config.fetch_retries => {
                    debug!(
                        source = job.adapter.name(),
                        url = %e.url,
                        attempt,
                        reason = %e.reason,
                        "Retrying fetch"
                    );
                    cancellable(cancel, tokio::time::sleep(self.config.fetch_retry_delay()))
                        .await?;
                }
                Err(e) => return Some(Err(e)),
            }
        }
    }

    fn politeness_delay(&self) -> Duration {
        let min = self.config.politeness_min_ms;
        let max = self.config.politeness_max_ms.max(min);
        if max == 0 {
            return Duration::ZERO;
        }
        Duration::from_millis(rand::thread_rng().gen_range(min..=max))
    }
}
