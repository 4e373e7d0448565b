pub mod config;
pub mod error;
pub mod models;
pub mod retry;
pub mod store;

pub use config::PipelineConfig;
pub use error::Error;
pub use models::{
    Article, ArticleUpsert, EmptySendBehavior, JobError, JobErrorKind, JobRun, JobStatus, Metric,
    MetricType, RunCompletion, Settings, Source, SourceConfig, SourceKind,
};
pub use store::{ArticleStore, MetricStore, RunStore, SettingsStore, SourceStore};

pub type Result<T> = std::result::Result<T, Error>;

pub mod prelude {
    pub use super::models::*;
    pub use super::store::*;
    pub use super::{Error, PipelineConfig, Result};
}
