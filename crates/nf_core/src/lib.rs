pub mod config;
pub mod error;
pub mod models;
pub mod source;
pub mod storage;
pub mod types;

pub use error::{
    Error, FetchError, FetchFailure, ListingError, Result, TranslationError, VectorizationError,
};
pub use types::{
    ArticleReference, CollectionRun, Grouping, ProcessedArticle, RawArticle, Singleton, StoryGroup,
};
