use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{Error, Result};

/// Everything a collection run needs, loaded once per run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub sources: BTreeMap<String, SourceConfig>,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub preprocess: PreprocessConfig,
    #[serde(default)]
    pub grouping: GroupingConfig,
    #[serde(default)]
    pub translator: TranslatorConfig,
}

impl AppConfig {
    /// Load and validate a YAML configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("cannot read {}: {e}", path.display()))
        })?;
        let config = Self::from_yaml_str(&raw)?;
        debug!(path = %path.display(), sources = config.sources.len(), "Loaded configuration");
        Ok(config)
    }

    pub fn from_yaml_str(raw: &str) -> Result<Self> {
        let config: Self =
            serde_yaml::from_str(raw).map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let categories: usize = self.sources.values().map(|s| s.categories.len()).sum();
        if categories == 0 {
            return Err(Error::Config(
                "no sources or categories configured".to_string(),
            ));
        }
        for (name, source) in &self.sources {
            url::Url::parse(&source.base_url).map_err(|e| {
                Error::Config(format!("source {name}: invalid base_url: {e}"))
            })?;
            if let Some((category, _)) = source.categories.iter().find(|(_, p)| p.is_empty()) {
                return Err(Error::Config(format!(
                    "source {name}: category {category} has no paths"
                )));
            }
        }
        self.scheduler.validate()?;
        self.preprocess.validate()?;
        self.grouping.validate()?;
        Ok(())
    }
}

/// One publisher and the category pages to read from it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    pub base_url: String,
    pub categories: BTreeMap<String, CategoryPaths>,
    #[serde(default)]
    pub selectors: SelectorConfig,
    /// Article links must contain this substring to be followed.
    #[serde(default)]
    pub link_filter: Option<String>,
    /// The body is cut at the first of these markers.
    #[serde(default)]
    pub cut_markers: Vec<String>,
    #[serde(default)]
    pub user_agent: Option<String>,
}

/// A category maps to one path or to several that are merged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CategoryPaths {
    One(String),
    Many(Vec<String>),
}

impl CategoryPaths {
    pub fn paths(&self) -> &[String] {
        match self {
            Self::One(path) => std::slice::from_ref(path),
            Self::Many(paths) => paths,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.paths().is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectorConfig {
    pub link: String,
    pub title: String,
    pub body: String,
    pub image: Option<String>,
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            link: "a[href]".to_string(),
            title: "h1".to_string(),
            body: "article p".to_string(),
            image: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Ceiling on in-flight requests across all sources.
    pub max_in_flight: usize,
    pub max_per_source: usize,
    pub request_timeout_ms: u64,
    pub listing_attempts: u32,
    pub listing_backoff_base_ms: u64,
    pub listing_backoff_max_ms: u64,
    /// Extra attempts after the first failed fetch.
    pub fetch_retries: u32,
    pub fetch_retry_delay_ms: u64,
    pub politeness_min_ms: u64,
    pub politeness_max_ms: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_in_flight: 10,
            max_per_source: 4,
            request_timeout_ms: 30_000,
            listing_attempts: 3,
            listing_backoff_base_ms: 500,
            listing_backoff_max_ms: 8_000,
            fetch_retries: 2,
            fetch_retry_delay_ms: 2_000,
            politeness_min_ms: 1_000,
            politeness_max_ms: 3_000,
        }
    }
}

impl SchedulerConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn fetch_retry_delay(&self) -> Duration {
        Duration::from_millis(self.fetch_retry_delay_ms)
    }

    fn validate(&self) -> Result<()> {
        if self.max_in_flight == 0 || self.max_per_source == 0 {
            return Err(Error::Config(
                "scheduler concurrency limits must be at least 1".to_string(),
            ));
        }
        if self.listing_attempts == 0 {
            return Err(Error::Config(
                "scheduler.listing_attempts must be at least 1".to_string(),
            ));
        }
        if self.politeness_min_ms > self.politeness_max_ms {
            return Err(Error::Config(
                "scheduler.politeness_min_ms exceeds politeness_max_ms".to_string(),
            ));
        }
        Ok(())
    }
}

/// Script the stored text is expected to be written in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetScript {
    #[default]
    Hangul,
    Latin,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PreprocessConfig {
    pub min_body_chars: usize,
    /// Share of foreign-script letters above which text is translated.
    pub translation_threshold: f64,
    pub target_script: TargetScript,
}

impl Default for PreprocessConfig {
    fn default() -> Self {
        Self {
            min_body_chars: 30,
            translation_threshold: 0.7,
            target_script: TargetScript::Hangul,
        }
    }
}

impl PreprocessConfig {
    fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.translation_threshold) {
            return Err(Error::Config(
                "preprocess.translation_threshold must be within [0, 1]".to_string(),
            ));
        }
        Ok(())
    }
}

/// A document-frequency bound: an absolute document count when written
/// as an integer, a proportion of the batch when written as a float.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DfBound {
    Count(usize),
    Fraction(f64),
}

impl DfBound {
    /// Smallest document frequency satisfying this bound as a minimum.
    pub fn min_docs(self, n_docs: usize) -> usize {
        match self {
            Self::Count(count) => count,
            Self::Fraction(fraction) => (fraction * n_docs as f64).ceil() as usize,
        }
    }

    /// Largest document frequency satisfying this bound as a maximum.
    pub fn max_docs(self, n_docs: usize) -> usize {
        match self {
            Self::Count(count) => count,
            Self::Fraction(fraction) => (fraction * n_docs as f64).floor() as usize,
        }
    }

    fn is_valid(self) -> bool {
        match self {
            Self::Count(_) => true,
            Self::Fraction(fraction) => (0.0..=1.0).contains(&fraction),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GroupingConfig {
    /// Neighborhood radius in cosine distance.
    pub eps: f64,
    /// Neighbors (the point itself included) that make a core point.
    pub min_samples: usize,
    pub min_df: DfBound,
    pub max_df: DfBound,
    pub ngram_range: (usize, usize),
}

impl Default for GroupingConfig {
    fn default() -> Self {
        Self {
            eps: 0.5,
            min_samples: 2,
            min_df: DfBound::Count(1),
            max_df: DfBound::Fraction(1.0),
            ngram_range: (1, 1),
        }
    }
}

impl GroupingConfig {
    pub fn validate(&self) -> Result<()> {
        if self.eps.is_nan() || self.eps <= 0.0 {
            return Err(Error::Config("grouping.eps must be positive".to_string()));
        }
        if self.min_samples == 0 {
            return Err(Error::Config(
                "grouping.min_samples must be at least 1".to_string(),
            ));
        }
        if !self.min_df.is_valid() || !self.max_df.is_valid() {
            return Err(Error::Config(
                "grouping document-frequency fractions must be within [0, 1]".to_string(),
            ));
        }
        let (low, high) = self.ngram_range;
        if low == 0 || low > high {
            return Err(Error::Config(format!(
                "grouping.ngram_range ({low}, {high}) is not a valid range"
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TranslatorConfig {
    /// Translation service URL. Translation is disabled without one.
    pub endpoint: Option<String>,
    pub api_key: Option<String>,
    pub source_lang: String,
    pub target_lang: String,
    pub timeout_ms: u64,
}

impl Default for TranslatorConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            api_key: None,
            source_lang: "en".to_string(),
            target_lang: "ko".to_string(),
            timeout_ms: 60_000,
        }
    }
}

impl TranslatorConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const MINIMAL: &str = r#"
sources:
  yonhap:
    base_url: https://www.yna.co.kr
    categories:
      politics: /politics/all
      world: [/international/all, /nk/all]
"#;

    #[test]
    fn minimal_config_gets_defaults() {
        let config = AppConfig::from_yaml_str(MINIMAL).unwrap();
        assert_eq!(config.scheduler, SchedulerConfig::default());
        assert_eq!(config.grouping.eps, 0.5);
        assert_eq!(config.grouping.min_samples, 2);
        assert_eq!(config.grouping.max_df, DfBound::Fraction(1.0));
        assert_eq!(config.grouping.max_df.max_docs(7), 7);
        assert_eq!(config.preprocess.min_body_chars, 30);
        assert_eq!(config.translator.target_lang, "ko");

        let yonhap = &config.sources["yonhap"];
        assert_eq!(yonhap.categories["politics"].paths(), ["/politics/all"]);
        assert_eq!(
            yonhap.categories["world"].paths(),
            ["/international/all", "/nk/all"]
        );
        assert_eq!(yonhap.selectors, SelectorConfig::default());
    }

    #[test]
    fn df_bounds_accept_counts_and_fractions() {
        let config = AppConfig::from_yaml_str(&format!(
            "{MINIMAL}grouping:\n  min_df: 2\n  max_df: 0.5\n  ngram_range: [1, 2]\n"
        ))
        .unwrap();
        assert_eq!(config.grouping.min_df, DfBound::Count(2));
        assert_eq!(config.grouping.max_df, DfBound::Fraction(0.5));
        assert_eq!(config.grouping.ngram_range, (1, 2));
        assert_eq!(config.grouping.max_df.max_docs(5), 2);
        assert_eq!(DfBound::Fraction(0.5).min_docs(5), 3);
    }

    #[test]
    fn empty_sources_are_fatal() {
        let err = AppConfig::from_yaml_str("sources: {}\n").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn missing_sources_section_is_fatal() {
        assert!(AppConfig::from_yaml_str("scheduler:\n  max_in_flight: 3\n").is_err());
    }

    #[test]
    fn rejects_inverted_ngram_range() {
        let err = AppConfig::from_yaml_str(&format!(
            "{MINIMAL}grouping:\n  ngram_range: [2, 1]\n"
        ))
        .unwrap_err();
        assert!(err.to_string().contains("ngram_range"));
    }

    #[test]
    fn loads_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(MINIMAL.as_bytes()).unwrap();
        let config = AppConfig::load(file.path()).unwrap();
        assert_eq!(config.sources.len(), 1);
    }

    #[test]
    fn unreadable_file_is_a_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = AppConfig::load(dir.path().join("missing.yaml")).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}
