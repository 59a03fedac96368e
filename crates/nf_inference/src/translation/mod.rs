pub mod http;

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use nf_core::config::TranslatorConfig;
use nf_core::models::Translator;
use nf_core::TranslationError;
use tokio::sync::OnceCell;
use tracing::info;

pub use self::http::HttpTranslator;

type TranslatorFactory =
    Box<dyn Fn() -> Result<Arc<dyn Translator>, TranslationError> + Send + Sync>;

/// Builds its inner translator on first use and reuses it afterwards.
///
/// Concurrent first calls wait on a single construction. A failed
/// construction is not cached, so the next call tries again.
pub struct SharedTranslator {
    factory: TranslatorFactory,
    inner: OnceCell<Arc<dyn Translator>>,
}

impl SharedTranslator {
    pub fn new<F>(factory: F) -> Self
    where
        F: Fn() -> Result<Arc<dyn Translator>, TranslationError> + Send + Sync + 'static,
    {
        Self {
            factory: Box::new(factory),
            inner: OnceCell::new(),
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.inner.initialized()
    }

    async fn get(&self) -> Result<&Arc<dyn Translator>, TranslationError> {
        self.inner
            .get_or_try_init(|| async {
                let translator = (self.factory)()?;
                info!("Translator initialized");
                Ok::<_, TranslationError>(translator)
            })
            .await
    }
}

impl fmt::Debug for SharedTranslator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedTranslator")
            .field("initialized", &self.is_initialized())
            .finish()
    }
}

#[async_trait]
impl Translator for SharedTranslator {
    async fn translate(&self, text: &str) -> Result<String, TranslationError> {
        self.get().await?.translate(text).await
    }
}

/// Returns `None` when no translation endpoint is configured.
pub fn create_translator(config: &TranslatorConfig) -> Option<Arc<dyn Translator>> {
    if config.endpoint.is_none() {
        return None;
    }
    let config = config.clone();
    Some(Arc::new(SharedTranslator::new(move || {
        Ok(Arc::new(HttpTranslator::new(&config)?) as Arc<dyn Translator>)
    })))
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    struct Upper;

    #[async_trait]
    impl Translator for Upper {
        async fn translate(&self, text: &str) -> Result<String, TranslationError> {
            tokio::task::yield_now().await;
            Ok(text.to_uppercase())
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_callers_share_one_construction() {
        let built = Arc::new(AtomicUsize::new(0));
        let counter = built.clone();
        let shared = Arc::new(SharedTranslator::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(Arc::new(Upper) as Arc<dyn Translator>)
        }));

        let calls = (0..16).map(|i| {
            let shared = shared.clone();
            tokio::spawn(async move { shared.translate(&format!("text {i}")).await })
        });
        for result in futures::future::join_all(calls).await {
            assert!(result.unwrap().is_ok());
        }
        assert_eq!(built.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn failed_construction_is_retried() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let counter = attempts.clone();
        let shared = SharedTranslator::new(move || {
            if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                Err(TranslationError::Unavailable("model not ready".to_string()))
            } else {
                Ok(Arc::new(Upper) as Arc<dyn Translator>)
            }
        });

        assert!(shared.translate("hello").await.is_err());
        assert!(!shared.is_initialized());
        assert_eq!(shared.translate("hello").await.unwrap(), "HELLO");
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn no_endpoint_means_no_translator() {
        assert!(create_translator(&TranslatorConfig::default()).is_none());
    }
}
