use async_trait::async_trait;

use crate::error::TranslationError;

#[async_trait]
pub trait Translator: Send + Sync {
    /// Translate a piece of text into the configured target language
    async fn translate(&self, text: &str) -> Result<String, TranslationError>;
}
