use std::fmt;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Listing(#[from] ListingError),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Translation(#[from] TranslationError),

    #[error(transparent)]
    Vectorization(#[from] VectorizationError),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Article already persisted: {0}")]
    PersistenceConflict(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("External error: {0}")]
    External(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

/// A source could not produce its article listing for a category path.
#[derive(Error, Debug, Clone)]
#[error("listing {source_name}/{category} failed: {reason}")]
pub struct ListingError {
    pub source_name: String,
    pub category: String,
    pub reason: String,
}

impl ListingError {
    pub fn new(source_name: &str, category: &str, reason: impl Into<String>) -> Self {
        Self {
            source_name: source_name.to_string(),
            category: category.to_string(),
            reason: reason.into(),
        }
    }
}

/// Why a single article fetch failed.
///
/// Only `Timeout` and `HttpError` are transient; the other two mean the
/// content is not there and asking again will not change that.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchFailure {
    Timeout,
    HttpError { status: Option<u16> },
    EmptyBody,
    ParseFailure,
}

impl FetchFailure {
    pub fn is_retryable(self) -> bool {
        matches!(self, Self::Timeout | Self::HttpError { .. })
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Timeout => "timeout",
            Self::HttpError { .. } => "http_error",
            Self::EmptyBody => "empty_body",
            Self::ParseFailure => "parse_failure",
        }
    }
}

impl fmt::Display for FetchFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::HttpError { status: Some(status) } => write!(f, "http_error ({status})"),
            other => f.write_str(other.as_str()),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("fetching {url} failed: {reason}")]
pub struct FetchError {
    pub url: String,
    pub reason: FetchFailure,
}

impl FetchError {
    pub fn new(url: &str, reason: FetchFailure) -> Self {
        Self {
            url: url.to_string(),
            reason,
        }
    }

    /// Classifies a transport error into a fetch failure reason.
    pub fn from_reqwest(url: &str, error: &reqwest::Error) -> Self {
        let reason = if error.is_timeout() {
            FetchFailure::Timeout
        } else if error.is_decode() {
            FetchFailure::ParseFailure
        } else {
            FetchFailure::HttpError {
                status: error.status().map(|s| s.as_u16()),
            }
        };
        Self::new(url, reason)
    }

    pub fn is_retryable(&self) -> bool {
        self.reason.is_retryable()
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TranslationError {
    #[error("translator unavailable: {0}")]
    Unavailable(String),
    #[error("translation request failed: {0}")]
    Request(String),
    #[error("translator returned an empty result")]
    EmptyResult,
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum VectorizationError {
    #[error("no terms left after document-frequency filtering")]
    EmptyVocabulary,
    #[error("max_df corresponds to {max_docs} documents, fewer than min_df ({min_docs})")]
    InvalidDocumentFrequency { min_docs: usize, max_docs: usize },
}
