pub mod adapters;
pub mod dedup;
pub mod logging;
pub mod pipeline;
pub mod preprocess;
pub mod report;
pub mod retry;
pub mod scheduler;
pub mod testing;
pub mod text;

pub use adapters::{sources_from_config, HtmlSourceAdapter, SourceEntry};
pub use dedup::{DedupOutcome, DeduplicationIndex};
pub use logging::{init_logging, LogFormat};
pub use pipeline::{Pipeline, RunOutput};
pub use preprocess::{ArticlePreprocessor, Rejection};
pub use report::RunReport;
pub use scheduler::{FetchOutcome, FetchScheduler, RunPhase, SourceStats};

pub mod prelude {
    pub use super::adapters::SourceEntry;
    pub use super::pipeline::{Pipeline, RunOutput};
    pub use super::report::RunReport;
    pub use super::scheduler::RunPhase;
    pub use tokio_util::sync::CancellationToken;
}
