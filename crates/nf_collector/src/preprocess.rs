use std::fmt;
use std::sync::Arc;

use lingua::{Language, LanguageDetector, LanguageDetectorBuilder};
use nf_core::config::{PreprocessConfig, TargetScript};
use nf_core::models::Translator;
use nf_core::{ProcessedArticle, RawArticle};
use once_cell::sync::Lazy;
use tracing::{debug, warn};

use crate::text::clean_text;

static DETECTOR: Lazy<LanguageDetector> = Lazy::new(|| {
    LanguageDetectorBuilder::from_languages(&[Language::English, Language::Korean])
        .with_minimum_relative_distance(0.1)
        .build()
});

/// ISO 639-1 code of the detected language, `und` when undecided.
pub fn detect_language(text: &str) -> &'static str {
    match DETECTOR.detect_language_of(text) {
        Some(Language::English) => "en",
        Some(Language::Korean) => "ko",
        _ => "und",
    }
}

fn is_hangul(c: char) -> bool {
    matches!(c,
        '\u{AC00}'..='\u{D7A3}'
        | '\u{1100}'..='\u{11FF}'
        | '\u{3130}'..='\u{318F}'
        | '\u{A960}'..='\u{A97F}'
        | '\u{D7B0}'..='\u{D7FF}')
}

fn is_latin(c: char) -> bool {
    c.is_ascii_alphabetic() || matches!(c, '\u{00C0}'..='\u{024F}')
}

/// Share of alphabetic characters outside the target script. Text without
/// alphabetic characters has ratio 0.
pub fn foreign_ratio(text: &str, target: TargetScript) -> f64 {
    let in_target: fn(char) -> bool = match target {
        TargetScript::Hangul => is_hangul,
        TargetScript::Latin => is_latin,
    };
    let (alphabetic, foreign) = text
        .chars()
        .filter(|c| c.is_alphabetic())
        .fold((0usize, 0usize), |(total, foreign), c| {
            (total + 1, foreign + usize::from(!in_target(c)))
        });
    if alphabetic == 0 {
        return 0.0;
    }
    foreign as f64 / alphabetic as f64
}

/// Why an article was dropped before grouping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    MissingTitle,
    MissingUrl,
    TooShort { chars: usize },
}

impl Rejection {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::MissingTitle => "missing_title",
            Self::MissingUrl => "missing_url",
            Self::TooShort { .. } => "too_short",
        }
    }
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TooShort { chars } => write!(f, "too_short ({chars} chars)"),
            other => f.write_str(other.as_str()),
        }
    }
}

pub struct ArticlePreprocessor {
    config: PreprocessConfig,
    translator: Option<Arc<dyn Translator>>,
}

impl ArticlePreprocessor {
    pub fn new(config: PreprocessConfig, translator: Option<Arc<dyn Translator>>) -> Self {
        Self { config, translator }
    }

    /// Cleans, validates and language-tags one article. Translation, when
    /// triggered, is best-effort: failures keep the original text.
    pub async fn process(&self, raw: RawArticle) -> Result<ProcessedArticle, Rejection> {
        if raw.url.trim().is_empty() {
            return Err(Rejection::MissingUrl);
        }
        if raw.title.trim().is_empty() {
            return Err(Rejection::MissingTitle);
        }

        let body = clean_text(&raw.body_text);
        let chars = body.chars().count();
        if chars < self.config.min_body_chars {
            return Err(Rejection::TooShort { chars });
        }

        let language = detect_language(&body);
        let mut article = ProcessedArticle::from_raw(raw, body, language);
        article.title = article.title.trim().to_string();

        let ratio = foreign_ratio(&article.body_text, self.config.target_script);
        if ratio > self.config.translation_threshold {
            self.translate(&mut article, ratio).await;
        }
        Ok(article)
    }

    async fn translate(&self, article: &mut ProcessedArticle, ratio: f64) {
        let Some(translator) = &self.translator else {
            debug!(url = %article.url, ratio, "No translator configured; keeping original text");
            return;
        };

        match translator.translate(&article.body_text).await {
            Ok(body) => {
                article.body_text = body;
                article.translated = true;
            }
            Err(e) => {
                warn!(url = %article.url, source = %article.source_name, error = %e, "Body translation failed");
                return;
            }
        }
        match translator.translate(&article.title).await {
            Ok(title) => article.title = title,
            Err(e) => {
                warn!(url = %article.url, source = %article.source_name, error = %e, "Title translation failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use chrono::Utc;
    use nf_core::TranslationError;
    use rstest::rstest;

    use super::*;

    #[derive(Default)]
    struct Recording {
        calls: AtomicUsize,
        fail: bool,
    }

    #[async_trait]
    impl Translator for Recording {
        async fn translate(&self, text: &str) -> Result<String, TranslationError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(TranslationError::Request("503".to_string()));
            }
            Ok(format!("번역: {text}"))
        }
    }

    fn raw(title: &str, body: &str) -> RawArticle {
        RawArticle {
            url: "https://news.example/1".to_string(),
            title: title.to_string(),
            body_text: body.to_string(),
            image_url: None,
            source_name: "example".to_string(),
            category: "world".to_string(),
            fetched_at: Utc::now(),
        }
    }

    fn preprocessor(translator: &Arc<Recording>) -> ArticlePreprocessor {
        ArticlePreprocessor::new(PreprocessConfig::default(), Some(translator.clone()))
    }

    #[rstest]
    #[case::below(69, false)]
    #[case::at(70, false)]
    #[case::above(71, true)]
    #[tokio::test]
    async fn translation_threshold_boundary(#[case] foreign: usize, #[case] translated: bool) {
        let body = format!("{}{}", "a".repeat(foreign), "가".repeat(100 - foreign));
        let translator = Arc::new(Recording::default());

        let article = preprocessor(&translator)
            .process(raw("제목", &body))
            .await
            .unwrap();

        assert_eq!(article.translated, translated);
        assert_eq!(translator.calls.load(Ordering::SeqCst) > 0, translated);
        if translated {
            assert!(article.body_text.starts_with("번역: "));
            assert_eq!(article.title, "번역: 제목");
        } else {
            assert_eq!(article.body_text, body);
        }
    }

    #[tokio::test]
    async fn translation_failure_keeps_original_text() {
        let translator = Arc::new(Recording {
            fail: true,
            ..Recording::default()
        });
        let body = "The central bank raised interest rates again on Thursday.";

        let article = preprocessor(&translator)
            .process(raw("Rates rise", body))
            .await
            .unwrap();
        assert!(!article.translated);
        assert_eq!(article.body_text, body);
        assert_eq!(article.title, "Rates rise");
        assert_eq!(article.language, "en");
    }

    #[tokio::test]
    async fn without_translator_foreign_text_passes_through() {
        let body = "The central bank raised interest rates again on Thursday.";
        let article = ArticlePreprocessor::new(PreprocessConfig::default(), None)
            .process(raw("Rates rise", body))
            .await
            .unwrap();
        assert!(!article.translated);
        assert_eq!(article.body_text, body);
    }

    #[tokio::test]
    async fn short_bodies_are_rejected_after_cleaning() {
        let translator = Arc::new(Recording::default());
        // 29 characters of content once the byline is gone
        let body = format!("홍길동 기자 {}", "가".repeat(29));
        let rejection = preprocessor(&translator)
            .process(raw("제목", &body))
            .await
            .unwrap_err();
        assert_eq!(rejection, Rejection::TooShort { chars: 29 });
    }

    #[tokio::test]
    async fn missing_fields_are_rejected() {
        let translator = Arc::new(Recording::default());
        let processor = preprocessor(&translator);
        let body = "가".repeat(40);

        assert_eq!(
            processor.process(raw("  ", &body)).await.unwrap_err(),
            Rejection::MissingTitle
        );
        let mut no_url = raw("제목", &body);
        no_url.url.clear();
        assert_eq!(processor.process(no_url).await.unwrap_err(), Rejection::MissingUrl);
    }

    #[tokio::test]
    async fn korean_text_is_tagged_and_not_translated() {
        let translator = Arc::new(Recording::default());
        let body = "정부가 오늘 내년도 예산안을 발표했다. 예산 규모는 역대 최대 수준이다.";
        let article = preprocessor(&translator)
            .process(raw("예산안 발표", body))
            .await
            .unwrap();
        assert_eq!(article.language, "ko");
        assert!(!article.translated);
        assert_eq!(translator.calls.load(Ordering::SeqCst), 0);
    }

    #[rstest]
    #[case::empty("", TargetScript::Hangul, 0.0)]
    #[case::digits_only("2024 12 31", TargetScript::Hangul, 0.0)]
    #[case::all_target("가나다라", TargetScript::Hangul, 0.0)]
    #[case::all_foreign("abcd", TargetScript::Hangul, 1.0)]
    #[case::latin_target("abc가", TargetScript::Latin, 0.25)]
    fn ratio_counts_alphabetic_characters_only(
        #[case] text: &str,
        #[case] target: TargetScript,
        #[case] expected: f64,
    ) {
        assert_eq!(foreign_ratio(text, target), expected);
    }
}
