pub mod grouping;
pub mod translation;

pub use grouping::SimilarityGrouper;
pub use translation::{create_translator, HttpTranslator, SharedTranslator};

pub mod prelude {
    pub use super::grouping::SimilarityGrouper;
    pub use super::translation::create_translator;
    pub use nf_core::config::GroupingConfig;
    pub use nf_core::{Grouping, ProcessedArticle, StoryGroup};
}
