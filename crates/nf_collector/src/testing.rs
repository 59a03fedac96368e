//! In-process adapter driven by scripted responses, for exercising the
//! scheduler and pipeline without a network.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use nf_core::source::SourceAdapter;
use nf_core::{ArticleReference, FetchError, FetchFailure, ListingError, RawArticle};

#[derive(Debug, Clone)]
struct Page {
    title: String,
    body: String,
    image_url: Option<String>,
}

/// Responses are consumed front to back; the last one repeats forever.
#[derive(Debug)]
struct Script<T>(VecDeque<T>);

impl<T: Clone> Script<T> {
    fn next(&mut self) -> Option<T> {
        if self.0.len() > 1 {
            self.0.pop_front()
        } else {
            self.0.front().cloned()
        }
    }
}

impl<T> Default for Script<T> {
    fn default() -> Self {
        Self(VecDeque::new())
    }
}

#[derive(Debug, Default)]
pub struct ScriptedAdapter {
    name: String,
    listings: Mutex<HashMap<String, Script<Result<Vec<ArticleReference>, String>>>>,
    pages: Mutex<HashMap<String, Script<Result<Page, FetchFailure>>>>,
    fetch_delay: Duration,
    list_calls: AtomicUsize,
    fetch_calls: Mutex<HashMap<String, usize>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl ScriptedAdapter {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Self::default()
        }
    }

    pub fn with_listing(self, path: &str, references: Vec<ArticleReference>) -> Self {
        self.push_listing(path, Ok(references));
        self
    }

    pub fn with_listing_failure(self, path: &str, reason: &str) -> Self {
        self.push_listing(path, Err(reason.to_string()));
        self
    }

    pub fn with_article(self, url: &str, title: &str, body: &str) -> Self {
        self.push_page(
            url,
            Ok(Page {
                title: title.to_string(),
                body: body.to_string(),
                image_url: None,
            }),
        );
        self
    }

    pub fn with_fetch_failure(self, url: &str, failure: FetchFailure) -> Self {
        self.push_page(url, Err(failure));
        self
    }

    /// Lists `(url, title, body)` under `path` and serves each page.
    pub fn with_articles(self, path: &str, articles: &[(&str, &str, &str)]) -> Self {
        let references = articles
            .iter()
            .map(|(url, title, _)| ArticleReference::new(*title, *url))
            .collect();
        let adapter = self.with_listing(path, references);
        articles
            .iter()
            .fold(adapter, |adapter, (url, title, body)| {
                adapter.with_article(url, title, body)
            })
    }

    /// Every fetch sleeps this long while counted as in flight.
    pub fn with_fetch_delay(mut self, delay: Duration) -> Self {
        self.fetch_delay = delay;
        self
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    pub fn fetch_calls(&self, url: &str) -> usize {
        lock(&self.fetch_calls).get(url).copied().unwrap_or(0)
    }

    /// Highest number of fetches observed running at once.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    fn push_listing(&self, path: &str, response: Result<Vec<ArticleReference>, String>) {
        lock(&self.listings)
            .entry(path.to_string())
            .or_default()
            .0
            .push_back(response);
    }

    fn push_page(&self, url: &str, response: Result<Page, FetchFailure>) {
        lock(&self.pages)
            .entry(url.to_string())
            .or_default()
            .0
            .push_back(response);
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[async_trait]
impl SourceAdapter for ScriptedAdapter {
    fn name(&self) -> &str {
        &self.name
    }

    async fn list_articles(&self, category_path: &str) -> Result<Vec<ArticleReference>, ListingError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        tokio::task::yield_now().await;
        let response = lock(&self.listings)
            .get_mut(category_path)
            .and_then(Script::next)
            .unwrap_or_else(|| Ok(Vec::new()));
        response.map_err(|reason| ListingError::new(&self.name, category_path, reason))
    }

    async fn fetch_article(
        &self,
        reference: &ArticleReference,
        category: &str,
    ) -> Result<RawArticle, FetchError> {
        *lock(&self.fetch_calls).entry(reference.url.clone()).or_default() += 1;
        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(current, Ordering::SeqCst);
        if self.fetch_delay.is_zero() {
            tokio::task::yield_now().await;
        } else {
            tokio::time::sleep(self.fetch_delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        let response = lock(&self.pages)
            .get_mut(&reference.url)
            .and_then(Script::next)
            .unwrap_or(Err(FetchFailure::HttpError { status: Some(404) }));
        let page = response.map_err(|reason| FetchError::new(&reference.url, reason))?;
        Ok(RawArticle {
            url: reference.url.clone(),
            title: page.title,
            body_text: page.body,
            image_url: page.image_url,
            source_name: self.name.clone(),
            category: category.to_string(),
            fetched_at: Utc::now(),
        })
    }
}
