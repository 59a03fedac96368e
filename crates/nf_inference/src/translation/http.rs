use std::fmt;

use async_trait::async_trait;
use nf_core::config::TranslatorConfig;
use nf_core::models::Translator;
use nf_core::TranslationError;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Serialize)]
struct TranslateRequest<'a> {
    text: &'a str,
    source: &'a str,
    target: &'a str,
}

#[derive(Deserialize)]
struct TranslateResponse {
    translated_text: String,
}

/// Translator backed by a JSON translation service.
pub struct HttpTranslator {
    client: Client,
    endpoint: String,
    api_key: Option<String>,
    source_lang: String,
    target_lang: String,
}

impl HttpTranslator {
    pub fn new(config: &TranslatorConfig) -> Result<Self, TranslationError> {
        let endpoint = config
            .endpoint
            .clone()
            .ok_or_else(|| TranslationError::Unavailable("no endpoint configured".to_string()))?;
        let client = Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| TranslationError::Unavailable(e.to_string()))?;
        Ok(Self {
            client,
            endpoint,
            api_key: config.api_key.clone(),
            source_lang: config.source_lang.clone(),
            target_lang: config.target_lang.clone(),
        })
    }
}

impl fmt::Debug for HttpTranslator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpTranslator")
            .field("client", &"<reqwest::Client>")
            .field("endpoint", &self.endpoint)
            .field("api_key", &self.api_key.as_deref().map(|_| "<redacted>"))
            .field("source_lang", &self.source_lang)
            .field("target_lang", &self.target_lang)
            .finish()
    }
}

#[async_trait]
impl Translator for HttpTranslator {
    async fn translate(&self, text: &str) -> Result<String, TranslationError> {
        let request = TranslateRequest {
            text,
            source: &self.source_lang,
            target: &self.target_lang,
        };
        let mut builder = self.client.post(&self.endpoint).json(&request);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| TranslationError::Request(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(TranslationError::Request(format!(
                "translation service returned {status}"
            )));
        }
        let body: TranslateResponse = response
            .json()
            .await
            .map_err(|e| TranslationError::Request(e.to_string()))?;

        let translated = body.translated_text.trim();
        if translated.is_empty() {
            return Err(TranslationError::EmptyResult);
        }
        debug!(chars = text.chars().count(), "Translated text");
        Ok(translated.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config_for(server: &MockServer) -> TranslatorConfig {
        TranslatorConfig {
            endpoint: Some(format!("{}/translate", server.uri())),
            api_key: Some("secret".to_string()),
            ..TranslatorConfig::default()
        }
    }

    #[tokio::test]
    async fn sends_text_with_language_pair() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/translate"))
            .and(header("authorization", "Bearer secret"))
            .and(body_json(serde_json::json!({
                "text": "Hello world",
                "source": "en",
                "target": "ko"
            })))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({ "translated_text": " 안녕 세계 " })),
            )
            .expect(1)
            .mount(&server)
            .await;

        let translator = HttpTranslator::new(&config_for(&server)).unwrap();
        assert_eq!(translator.translate("Hello world").await.unwrap(), "안녕 세계");
    }

    #[tokio::test]
    async fn server_errors_are_request_failures() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let translator = HttpTranslator::new(&config_for(&server)).unwrap();
        assert!(matches!(
            translator.translate("Hello").await,
            Err(TranslationError::Request(_))
        ));
    }

    #[tokio::test]
    async fn blank_translation_is_rejected() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({ "translated_text": "  " })),
            )
            .mount(&server)
            .await;

        let translator = HttpTranslator::new(&config_for(&server)).unwrap();
        assert_eq!(
            translator.translate("Hello").await,
            Err(TranslationError::EmptyResult)
        );
    }

    #[test]
    fn requires_endpoint() {
        assert!(matches!(
            HttpTranslator::new(&TranslatorConfig::default()),
            Err(TranslationError::Unavailable(_))
        ));
    }

    #[test]
    fn debug_redacts_api_key() {
        let config = TranslatorConfig {
            endpoint: Some("http://localhost:1/translate".to_string()),
            api_key: Some("secret".to_string()),
            ..TranslatorConfig::default()
        };
        let rendered = format!("{:?}", HttpTranslator::new(&config).unwrap());
        assert!(rendered.contains("<redacted>"));
        assert!(!rendered.contains("secret"));
    }
}
