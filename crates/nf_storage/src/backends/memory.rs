use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use nf_core::storage::{ArticleId, PersistenceGateway, SaveOutcome};
use nf_core::{ProcessedArticle, Result};
use serde::Serialize;
use tokio::sync::RwLock;

/// Where a stored article was reported.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SourceRecord {
    pub title: String,
    pub url: String,
    pub press_company: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoredArticle {
    pub id: ArticleId,
    pub title: String,
    pub body: String,
    pub category: String,
    pub image_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub sources: Vec<SourceRecord>,
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    next_id: i64,
    articles: BTreeMap<ArticleId, StoredArticle>,
    urls: HashMap<String, ArticleId>,
}

impl MemoryStore {
    fn contains(&self, url: &str) -> bool {
        self.urls.contains_key(url)
    }

    fn insert(&mut self, representative: &ProcessedArticle, members: &[ProcessedArticle]) -> ArticleId {
        self.next_id += 1;
        let id = ArticleId(self.next_id);
        let mut sources = Vec::with_capacity(members.len());
        for member in members {
            if self.urls.contains_key(&member.url) {
                continue;
            }
            self.urls.insert(member.url.clone(), id);
            sources.push(SourceRecord {
                title: member.title.clone(),
                url: member.url.clone(),
                press_company: member.source_name.clone(),
            });
        }
        self.articles.insert(
            id,
            StoredArticle {
                id,
                title: representative.title.clone(),
                body: representative.body_text.clone(),
                category: representative.category.clone(),
                image_url: representative.image_url.clone(),
                created_at: Utc::now(),
                sources,
            },
        );
        id
    }
}

/// Process-local gateway. Each save holds the write lock for its whole
/// check-and-insert, which makes it atomic.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStorage {
    store: Arc<RwLock<MemoryStore>>,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn articles(&self) -> Vec<StoredArticle> {
        self.store.read().await.articles.values().cloned().collect()
    }

    pub async fn source_count(&self) -> usize {
        self.store.read().await.urls.len()
    }
}

#[async_trait]
impl PersistenceGateway for InMemoryStorage {
    async fn exists_by_url(&self, url: &str) -> Result<bool> {
        Ok(self.store.read().await.contains(url))
    }

    async fn save_singleton(&self, article: &ProcessedArticle) -> Result<SaveOutcome> {
        let mut store = self.store.write().await;
        if store.contains(&article.url) {
            return Ok(SaveOutcome::AlreadyExists);
        }
        let id = store.insert(article, std::slice::from_ref(article));
        Ok(SaveOutcome::Created(id))
    }

    async fn save_story_group(
        &self,
        representative: &ProcessedArticle,
        members: &[ProcessedArticle],
    ) -> Result<SaveOutcome> {
        let mut store = self.store.write().await;
        if members.iter().any(|member| store.contains(&member.url)) {
            return Ok(SaveOutcome::AlreadyExists);
        }
        Ok(SaveOutcome::Created(store.insert(representative, members)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn article(url: &str, source: &str) -> ProcessedArticle {
        ProcessedArticle {
            url: url.to_string(),
            title: format!("Headline {url}"),
            body_text: "Body text long enough to be stored as an article.".to_string(),
            image_url: Some("https://img.example/1.jpg".to_string()),
            source_name: source.to_string(),
            category: "politics".to_string(),
            fetched_at: Utc::now(),
            language: "ko".to_string(),
            translated: false,
        }
    }

    #[tokio::test]
    async fn singleton_is_saved_once() {
        let storage = InMemoryStorage::new();
        let first = article("https://a.example/1", "a");

        let outcome = storage.save_singleton(&first).await.unwrap();
        assert_eq!(outcome, SaveOutcome::Created(ArticleId(1)));
        assert!(storage.exists_by_url(&first.url).await.unwrap());
        assert_eq!(
            storage.save_singleton(&first).await.unwrap(),
            SaveOutcome::AlreadyExists
        );
        assert_eq!(storage.articles().await.len(), 1);
    }

    #[tokio::test]
    async fn group_stores_one_article_with_every_source() {
        let storage = InMemoryStorage::new();
        let members = vec![
            article("https://a.example/1", "a"),
            article("https://b.example/1", "b"),
            article("https://c.example/1", "c"),
        ];

        let outcome = storage
            .save_story_group(&members[0], &members)
            .await
            .unwrap();
        let id = outcome.id().unwrap();

        let stored = storage.articles().await;
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].id, id);
        assert_eq!(stored[0].title, members[0].title);
        assert_eq!(stored[0].sources.len(), 3);
        assert_eq!(stored[0].sources[1].press_company, "b");
        assert_eq!(stored[0].image_url.as_deref(), Some("https://img.example/1.jpg"));
    }

    #[tokio::test]
    async fn group_with_known_member_writes_nothing() {
        let storage = InMemoryStorage::new();
        let known = article("https://b.example/1", "b");
        storage.save_singleton(&known).await.unwrap();

        let members = vec![article("https://a.example/1", "a"), known];
        assert_eq!(
            storage.save_story_group(&members[0], &members).await.unwrap(),
            SaveOutcome::AlreadyExists
        );
        assert!(!storage.exists_by_url("https://a.example/1").await.unwrap());
        assert_eq!(storage.source_count().await, 1);
    }
}
