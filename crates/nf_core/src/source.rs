use async_trait::async_trait;

use crate::error::{FetchError, ListingError};
use crate::types::{ArticleReference, RawArticle};

/// A publisher the collector can read from.
///
/// Implementations only perform network I/O and return data; they never
/// touch scheduler or persistence state.
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    /// Name used in logs, reports and stored source records
    fn name(&self) -> &str;

    /// List the articles currently linked from a category path.
    ///
    /// An empty listing is a valid answer, not an error.
    async fn list_articles(&self, category_path: &str)
        -> Result<Vec<ArticleReference>, ListingError>;

    /// Fetch and extract a single article
    async fn fetch_article(
        &self,
        reference: &ArticleReference,
        category: &str,
    ) -> Result<RawArticle, FetchError>;
}
