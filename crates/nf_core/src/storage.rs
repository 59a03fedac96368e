use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::types::ProcessedArticle;
use crate::Result;

/// Identifier of a stored article record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ArticleId(pub i64);

impl fmt::Display for ArticleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveOutcome {
    Created(ArticleId),
    /// A URL was already persisted; nothing was written.
    AlreadyExists,
}

impl SaveOutcome {
    pub fn id(self) -> Option<ArticleId> {
        match self {
            Self::Created(id) => Some(id),
            Self::AlreadyExists => None,
        }
    }
}

#[async_trait]
pub trait PersistenceGateway: Send + Sync {
    /// Whether an article with this URL has been stored before
    async fn exists_by_url(&self, url: &str) -> Result<bool>;

    /// Store an article that has no peer in its batch
    async fn save_singleton(&self, article: &ProcessedArticle) -> Result<SaveOutcome>;

    /// Store a story group as one atomic unit.
    ///
    /// The representative becomes the article record and every member
    /// becomes one of its source records. Either all of them are written or
    /// none are.
    async fn save_story_group(
        &self,
        representative: &ProcessedArticle,
        members: &[ProcessedArticle],
    ) -> Result<SaveOutcome>;
}
