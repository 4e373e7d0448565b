use std::sync::Arc;

use futures::future::join_all;
use tokio::sync::Semaphore;
use tracing::{error, info};
use uuid::Uuid;

use wd_core::models::{Article, MetricType};
use wd_core::retry::{retry_with_backoff, MAX_ATTEMPTS, RETRY_DELAYS};
use wd_core::store::{ArticleStore, MetricStore};
use wd_core::{PipelineConfig, Result};

use crate::api::{estimate_cost_usd, Summarizer};

#[derive(Debug, Clone)]
pub struct SummaryError {
    pub article_id: Uuid,
    pub article_url: String,
    pub message: String,
}

#[derive(Debug, Clone, Default)]
pub struct SummarizeReport {
    pub summarized: u32,
    pub errors: Vec<SummaryError>,
}

/// The summarize stage: generates a summary for every article handed to it,
/// with a fan-out cap, per-article retry, and per-article error isolation.
/// Usage metrics are appended for each successful call.
pub struct SummarizeStage {
    summarizer: Arc<dyn Summarizer>,
    articles: Arc<dyn ArticleStore>,
    metrics: Arc<dyn MetricStore>,
    config: PipelineConfig,
}

impl SummarizeStage {
    pub fn new(
        summarizer: Arc<dyn Summarizer>,
        articles: Arc<dyn ArticleStore>,
        metrics: Arc<dyn MetricStore>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            summarizer,
            articles,
            metrics,
            config,
        }
    }

    pub async fn summarize_articles(&self, articles: &[Article], run_id: Uuid) -> SummarizeReport {
        if articles.is_empty() {
            return SummarizeReport::default();
        }

        info!(count = articles.len(), "starting summarization");
        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrent_summarizations));

        let tasks: Vec<_> = articles
            .iter()
            .map(|article| {
                let semaphore = semaphore.clone();
                async move {
                    let _permit = semaphore.acquire().await.expect("semaphore open");
                    self.summarize_one(article, run_id)
                        .await
                        .map_err(|err| SummaryError {
                            article_id: article.id,
                            article_url: article.url.clone(),
                            message: err.to_string(),
                        })
                }
            })
            .collect();

        let mut report = SummarizeReport::default();
        for outcome in join_all(tasks).await {
            match outcome {
                Ok(()) => report.summarized += 1,
                Err(err) => {
                    error!(
                        article_url = %err.article_url,
                        error = %err.message,
                        "summarization failed"
                    );
                    report.errors.push(err);
                }
            }
        }
        info!(
            summarized = report.summarized,
            failed = report.errors.len(),
            "summarization finished"
        );
        report
    }

    async fn summarize_one(&self, article: &Article, run_id: Uuid) -> Result<()> {
        let summary = retry_with_backoff(MAX_ATTEMPTS, &RETRY_DELAYS, |_| {
            self.summarizer
                .summarize(article.title.as_deref(), &article.content)
        })
        .await?;

        self.articles
            .set_summary(article.id, summary.text.trim())
            .await?;

        self.metrics
            .append(
                run_id,
                MetricType::ApiTokensInput,
                summary.input_tokens as f64,
            )
            .await?;
        self.metrics
            .append(
                run_id,
                MetricType::ApiTokensOutput,
                summary.output_tokens as f64,
            )
            .await?;
        self.metrics
            .append(
                run_id,
                MetricType::ApiCostUsd,
                estimate_cost_usd(summary.input_tokens, summary.output_tokens),
            )
            .await?;
        Ok(())
    }
}
