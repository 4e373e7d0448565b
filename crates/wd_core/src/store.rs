use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::models::{
    Article, ArticleUpsert, JobRun, JobStatus, Metric, MetricType, RunCompletion, Settings, Source,
};
use crate::Result;

/// Run records. Backends must make `create_running` atomic: checking for an
/// active run and inserting the new one happen under one lock, so two
/// concurrent triggers cannot both start.
#[async_trait]
pub trait RunStore: Send + Sync {
    /// Create a new run in `Running`. Fails with `Error::JobAlreadyRunning`
    /// if a run is currently `Running` or `Stopping`.
    async fn create_running(&self) -> Result<JobRun>;

    /// The run currently in `Running` or `Stopping`, if any.
    async fn find_active(&self) -> Result<Option<JobRun>>;

    /// The most recently finished terminal run.
    async fn find_last_terminal(&self) -> Result<Option<JobRun>>;

    async fn get(&self, id: Uuid) -> Result<Option<JobRun>>;

    async fn update_status(
        &self,
        id: Uuid,
        status: JobStatus,
        completion: RunCompletion,
    ) -> Result<()>;

    /// Mark the running run as `Stopping`. Returns its id, or None if no run
    /// is running.
    async fn request_stop(&self) -> Result<Option<Uuid>>;
}

#[async_trait]
pub trait SourceStore: Send + Sync {
    /// All sources, ordered by creation time.
    async fn list_all(&self) -> Result<Vec<Source>>;

    async fn exists(&self, id: Uuid) -> Result<bool>;
}

#[async_trait]
pub trait ArticleStore: Send + Sync {
    /// Insert a new article, or refresh an existing one matched by URL. On
    /// update the summary is reset to None so the article is re-summarized.
    async fn upsert_by_url(&self, upsert: ArticleUpsert) -> Result<Article>;

    /// Articles awaiting summarization, newest first.
    async fn find_summary_null(&self) -> Result<Vec<Article>>;

    /// Summarized articles collected within the window, newest first.
    async fn find_summarized_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Article>>;

    async fn set_summary(&self, id: Uuid, summary: &str) -> Result<()>;

    async fn get_by_url(&self, url: &str) -> Result<Option<Article>>;
}

#[async_trait]
pub trait MetricStore: Send + Sync {
    async fn append(&self, run_id: Uuid, metric_type: MetricType, value: f64) -> Result<Metric>;

    /// Sum of all values of the given type recorded at or after `since`.
    async fn sum_since(&self, metric_type: MetricType, since: DateTime<Utc>) -> Result<f64>;
}

#[async_trait]
pub trait SettingsStore: Send + Sync {
    async fn get(&self) -> Result<Settings>;
}
