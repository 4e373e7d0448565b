use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One end-to-end pipeline execution, from trigger to terminal state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobRun {
    pub id: Uuid,
    pub status: JobStatus,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub articles_collected: u32,
    pub articles_summarized: u32,
    pub errors: Vec<JobError>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Running,
    Stopping,
    Stopped,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Stopped | Self::Completed | Self::Failed)
    }

    /// Running or Stopping, the states that block a new run from starting.
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Running | Self::Stopping)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobErrorKind {
    ScrapingFailed,
    CostLimitReached,
    SummarizationFailed,
    EmailDeliveryFailed,
    JobFailed,
}

/// Structured error record persisted on the run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobError {
    pub kind: JobErrorKind,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub article_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub article_id: Option<Uuid>,
}

impl JobError {
    pub fn scraping(source_url: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: JobErrorKind::ScrapingFailed,
            message: message.into(),
            source_url: Some(source_url.into()),
            article_url: None,
            article_id: None,
        }
    }

    pub fn cost_limit(message: impl Into<String>) -> Self {
        Self {
            kind: JobErrorKind::CostLimitReached,
            message: message.into(),
            source_url: None,
            article_url: None,
            article_id: None,
        }
    }

    pub fn summarization(
        article_id: Uuid,
        article_url: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            kind: JobErrorKind::SummarizationFailed,
            message: message.into(),
            source_url: None,
            article_url: Some(article_url.into()),
            article_id: Some(article_id),
        }
    }

    pub fn delivery(message: impl Into<String>) -> Self {
        Self {
            kind: JobErrorKind::EmailDeliveryFailed,
            message: message.into(),
            source_url: None,
            article_url: None,
            article_id: None,
        }
    }

    pub fn fatal(message: impl Into<String>) -> Self {
        Self {
            kind: JobErrorKind::JobFailed,
            message: message.into(),
            source_url: None,
            article_url: None,
            article_id: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// The source URL is itself the article.
    Single,
    /// The source URL is an index page linking to articles.
    List,
}

/// Extraction overrides for list sources.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SourceConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub list_link_selector: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub article_url_pattern: Option<String>,
}

/// A configured web location to scrape. Read-only to the pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Source {
    pub id: Uuid,
    pub url: String,
    pub kind: SourceKind,
    pub selector: Option<String>,
    pub config: Option<SourceConfig>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Article {
    pub id: Uuid,
    pub url: String,
    pub title: Option<String>,
    pub content: String,
    /// None until the summarize stage runs; cleared again whenever content
    /// is refreshed.
    pub summary: Option<String>,
    pub source_id: Option<Uuid>,
    pub collected_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Write shape used by the scrape stage when inserting or refreshing an
/// article by URL.
#[derive(Debug, Clone)]
pub struct ArticleUpsert {
    pub url: String,
    pub title: Option<String>,
    pub content: String,
    pub source_id: Option<Uuid>,
    pub collected_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricType {
    ApiTokensInput,
    ApiTokensOutput,
    ApiCostUsd,
}

/// Append-only usage record written by the summarize stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Metric {
    pub id: Uuid,
    pub run_id: Uuid,
    pub metric_type: MetricType,
    pub value: f64,
    pub recorded_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmptySendBehavior {
    /// Send nothing when a run collects no articles.
    Skip,
    /// Send a "no new articles" notice instead.
    Notify,
}

/// Singleton application settings, read-only to the pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    pub send_hour_utc: u8,
    pub recipient_email: Option<String>,
    pub empty_send_behavior: EmptySendBehavior,
    pub cost_limit_monthly_usd: Option<f64>,
    pub cost_warning_ratio: f64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            send_hour_utc: 7,
            recipient_email: None,
            empty_send_behavior: EmptySendBehavior::Skip,
            cost_limit_monthly_usd: None,
            cost_warning_ratio: 0.8,
        }
    }
}

/// Fields the orchestrator sets when finalizing a run.
#[derive(Debug, Clone, Default)]
pub struct RunCompletion {
    pub finished_at: Option<DateTime<Utc>>,
    pub articles_collected: Option<u32>,
    pub articles_summarized: Option<u32>,
    pub errors: Option<Vec<JobError>>,
}
