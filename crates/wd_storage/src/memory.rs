use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use wd_core::models::{
    Article, ArticleUpsert, JobRun, JobStatus, Metric, MetricType, RunCompletion, Settings, Source,
};
use wd_core::store::{ArticleStore, MetricStore, RunStore, SettingsStore, SourceStore};
use wd_core::{Error, Result};

#[derive(Default)]
struct Inner {
    runs: Vec<JobRun>,
    sources: Vec<Source>,
    articles: Vec<Article>,
    metrics: Vec<Metric>,
    settings: Settings,
}

/// In-memory backend implementing every store trait. The default backend of
/// the binary and the test double for the pipeline crates.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<RwLock<Inner>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn set_settings(&self, settings: Settings) {
        self.inner.write().await.settings = settings;
    }

    pub async fn insert_source(&self, source: Source) {
        self.inner.write().await.sources.push(source);
    }

    pub async fn insert_article(&self, article: Article) {
        self.inner.write().await.articles.push(article);
    }

    /// Seed a run directly, bypassing the active-run check. Test helper.
    pub async fn insert_run(&self, run: JobRun) {
        self.inner.write().await.runs.push(run);
    }

    pub async fn all_articles(&self) -> Vec<Article> {
        self.inner.read().await.articles.clone()
    }

    pub async fn all_runs(&self) -> Vec<JobRun> {
        self.inner.read().await.runs.clone()
    }

    pub async fn all_metrics(&self) -> Vec<Metric> {
        self.inner.read().await.metrics.clone()
    }
}

#[async_trait]
impl RunStore for MemoryStore {
    async fn create_running(&self) -> Result<JobRun> {
        // Check and insert under one write lock; two concurrent triggers
        // cannot both pass the active-run check.
        let mut inner = self.inner.write().await;
        if inner.runs.iter().any(|r| r.status.is_active()) {
            return Err(Error::JobAlreadyRunning);
        }
        let run = JobRun {
            id: Uuid::new_v4(),
            status: JobStatus::Running,
            started_at: Utc::now(),
            finished_at: None,
            articles_collected: 0,
            articles_summarized: 0,
            errors: Vec::new(),
        };
        inner.runs.push(run.clone());
        Ok(run)
    }

    async fn find_active(&self) -> Result<Option<JobRun>> {
        let inner = self.inner.read().await;
        Ok(inner
            .runs
            .iter()
            .filter(|r| r.status.is_active())
            .max_by_key(|r| r.started_at)
            .cloned())
    }

    async fn find_last_terminal(&self) -> Result<Option<JobRun>> {
        let inner = self.inner.read().await;
        Ok(inner
            .runs
            .iter()
            .filter(|r| r.status.is_terminal() && r.finished_at.is_some())
            .max_by_key(|r| r.finished_at)
            .cloned())
    }

    async fn get(&self, id: Uuid) -> Result<Option<JobRun>> {
        let inner = self.inner.read().await;
        Ok(inner.runs.iter().find(|r| r.id == id).cloned())
    }

    async fn update_status(
        &self,
        id: Uuid,
        status: JobStatus,
        completion: RunCompletion,
    ) -> Result<()> {
        let mut inner = self.inner.write().await;
        let run = inner
            .runs
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or_else(|| Error::Storage(format!("run not found: {}", id)))?;
        run.status = status;
        if let Some(finished_at) = completion.finished_at {
            run.finished_at = Some(finished_at);
        }
        if let Some(collected) = completion.articles_collected {
            run.articles_collected = collected;
        }
        if let Some(summarized) = completion.articles_summarized {
            run.articles_summarized = summarized;
        }
        if let Some(errors) = completion.errors {
            run.errors = errors;
        }
        Ok(())
    }

    async fn request_stop(&self) -> Result<Option<Uuid>> {
        let mut inner = self.inner.write().await;
        let run = inner
            .runs
            .iter_mut()
            .find(|r| r.status == JobStatus::Running);
        match run {
            Some(run) => {
                run.status = JobStatus::Stopping;
                Ok(Some(run.id))
            }
            None => Ok(None),
        }
    }
}

#[async_trait]
impl SourceStore for MemoryStore {
    async fn list_all(&self) -> Result<Vec<Source>> {
        let inner = self.inner.read().await;
        let mut sources = inner.sources.clone();
        sources.sort_by_key(|s| s.created_at);
        Ok(sources)
    }

    async fn exists(&self, id: Uuid) -> Result<bool> {
        let inner = self.inner.read().await;
        Ok(inner.sources.iter().any(|s| s.id == id))
    }
}

#[async_trait]
impl ArticleStore for MemoryStore {
    async fn upsert_by_url(&self, upsert: ArticleUpsert) -> Result<Article> {
        let mut inner = self.inner.write().await;
        if let Some(existing) = inner.articles.iter_mut().find(|a| a.url == upsert.url) {
            existing.title = upsert.title;
            existing.content = upsert.content;
            existing.collected_at = upsert.collected_at;
            existing.updated_at = Utc::now();
            // Content changed; force re-summarization.
            existing.summary = None;
            return Ok(existing.clone());
        }
        let article = Article {
            id: Uuid::new_v4(),
            url: upsert.url,
            title: upsert.title,
            content: upsert.content,
            summary: None,
            source_id: upsert.source_id,
            collected_at: upsert.collected_at,
            updated_at: Utc::now(),
        };
        inner.articles.push(article.clone());
        Ok(article)
    }

    async fn find_summary_null(&self) -> Result<Vec<Article>> {
        let inner = self.inner.read().await;
        let mut articles: Vec<Article> = inner
            .articles
            .iter()
            .filter(|a| a.summary.is_none())
            .cloned()
            .collect();
        articles.sort_by(|a, b| b.collected_at.cmp(&a.collected_at));
        Ok(articles)
    }

    async fn find_summarized_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Article>> {
        let inner = self.inner.read().await;
        let mut articles: Vec<Article> = inner
            .articles
            .iter()
            .filter(|a| a.summary.is_some() && a.collected_at >= start && a.collected_at <= end)
            .cloned()
            .collect();
        articles.sort_by(|a, b| b.collected_at.cmp(&a.collected_at));
        Ok(articles)
    }

    async fn set_summary(&self, id: Uuid, summary: &str) -> Result<()> {
        let mut inner = self.inner.write().await;
        let article = inner
            .articles
            .iter_mut()
            .find(|a| a.id == id)
            .ok_or_else(|| Error::Storage(format!("article not found: {}", id)))?;
        article.summary = Some(summary.to_string());
        article.updated_at = Utc::now();
        Ok(())
    }

    async fn get_by_url(&self, url: &str) -> Result<Option<Article>> {
        let inner = self.inner.read().await;
        Ok(inner.articles.iter().find(|a| a.url == url).cloned())
    }
}

#[async_trait]
impl MetricStore for MemoryStore {
    async fn append(&self, run_id: Uuid, metric_type: MetricType, value: f64) -> Result<Metric> {
        let metric = Metric {
            id: Uuid::new_v4(),
            run_id,
            metric_type,
            value,
            recorded_at: Utc::now(),
        };
        self.inner.write().await.metrics.push(metric.clone());
        Ok(metric)
    }

    async fn sum_since(&self, metric_type: MetricType, since: DateTime<Utc>) -> Result<f64> {
        let inner = self.inner.read().await;
        Ok(inner
            .metrics
            .iter()
            .filter(|m| m.metric_type == metric_type && m.recorded_at >= since)
            .map(|m| m.value)
            .sum())
    }
}

#[async_trait]
impl SettingsStore for MemoryStore {
    async fn get(&self) -> Result<Settings> {
        Ok(self.inner.read().await.settings.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn upsert(url: &str, content: &str) -> ArticleUpsert {
        ArticleUpsert {
            url: url.to_string(),
            title: Some("Test Article".to_string()),
            content: content.to_string(),
            source_id: None,
            collected_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_upsert_dedups_by_url() {
        let store = MemoryStore::new();
        let first = store
            .upsert_by_url(upsert("http://example.com/a", "original"))
            .await
            .unwrap();
        store.set_summary(first.id, "a summary").await.unwrap();

        let second = store
            .upsert_by_url(upsert("http://example.com/a", "updated"))
            .await
            .unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(second.content, "updated");
        // Content refresh clears the summary.
        assert!(second.summary.is_none());
        assert_eq!(store.all_articles().await.len(), 1);
    }

    #[tokio::test]
    async fn test_find_summary_null() {
        let store = MemoryStore::new();
        let a = store
            .upsert_by_url(upsert("http://example.com/a", "one"))
            .await
            .unwrap();
        store
            .upsert_by_url(upsert("http://example.com/b", "two"))
            .await
            .unwrap();
        store.set_summary(a.id, "done").await.unwrap();

        let pending = store.find_summary_null().await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].url, "http://example.com/b");
    }

    #[tokio::test]
    async fn test_create_running_rejects_second_run() {
        let store = MemoryStore::new();
        let run = store.create_running().await.unwrap();
        assert_eq!(run.status, JobStatus::Running);

        let second = store.create_running().await;
        assert!(matches!(second, Err(Error::JobAlreadyRunning)));

        store
            .update_status(
                run.id,
                JobStatus::Completed,
                RunCompletion {
                    finished_at: Some(Utc::now()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert!(store.create_running().await.is_ok());
    }

    #[tokio::test]
    async fn test_request_stop_marks_running_run() {
        let store = MemoryStore::new();
        assert!(store.request_stop().await.unwrap().is_none());

        let run = store.create_running().await.unwrap();
        let stopped = store.request_stop().await.unwrap();
        assert_eq!(stopped, Some(run.id));

        let active = store.find_active().await.unwrap().unwrap();
        assert_eq!(active.status, JobStatus::Stopping);
    }

    #[tokio::test]
    async fn test_metric_sum_since() {
        let store = MemoryStore::new();
        let run_id = Uuid::new_v4();
        store
            .append(run_id, MetricType::ApiCostUsd, 1.5)
            .await
            .unwrap();
        store
            .append(run_id, MetricType::ApiCostUsd, 2.25)
            .await
            .unwrap();
        store
            .append(run_id, MetricType::ApiTokensInput, 1000.0)
            .await
            .unwrap();

        let since = Utc::now() - Duration::hours(1);
        let total = store.sum_since(MetricType::ApiCostUsd, since).await.unwrap();
        assert!((total - 3.75).abs() < f64::EPSILON);

        let future = Utc::now() + Duration::hours(1);
        assert_eq!(
            store.sum_since(MetricType::ApiCostUsd, future).await.unwrap(),
            0.0
        );
    }
}
