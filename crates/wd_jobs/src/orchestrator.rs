use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::time::Instant;
use tracing::{error, info, warn};
use uuid::Uuid;

use wd_core::models::{EmptySendBehavior, JobError, JobRun, JobStatus, RunCompletion};
use wd_core::store::{ArticleStore, RunStore, SettingsStore, SourceStore};
use wd_core::{PipelineConfig, Result};
use wd_delivery::DeliveryService;
use wd_scraper::Scraper;
use wd_summarizer::{CostManager, SummarizeStage};

use crate::guard::RunGuard;

/// Terminal result of one triggered run.
#[derive(Debug, Clone)]
pub enum RunOutcome {
    Completed {
        run_id: Uuid,
        articles_collected: u32,
        articles_summarized: u32,
        errors: Vec<JobError>,
    },
    Stopped {
        run_id: Uuid,
    },
    Failed {
        run_id: Uuid,
        error: String,
    },
}

/// Owns the run state machine: creates the run record, sequences the
/// scrape, cost-gate, summarize and deliver stages, honors stop requests
/// between stages, and persists the final record with the merged errors.
pub struct JobOrchestrator {
    runs: Arc<dyn RunStore>,
    sources: Arc<dyn SourceStore>,
    articles: Arc<dyn ArticleStore>,
    settings: Arc<dyn SettingsStore>,
    scraper: Arc<Scraper>,
    summarize: Arc<SummarizeStage>,
    cost: Arc<CostManager>,
    delivery: Arc<DeliveryService>,
    guard: RunGuard,
    config: PipelineConfig,
}

impl JobOrchestrator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        runs: Arc<dyn RunStore>,
        sources: Arc<dyn SourceStore>,
        articles: Arc<dyn ArticleStore>,
        settings: Arc<dyn SettingsStore>,
        scraper: Arc<Scraper>,
        summarize: Arc<SummarizeStage>,
        cost: Arc<CostManager>,
        delivery: Arc<DeliveryService>,
        config: PipelineConfig,
    ) -> Self {
        let guard = RunGuard::new(runs.clone(), config.clone());
        Self {
            runs,
            sources,
            articles,
            settings,
            scraper,
            summarize,
            cost,
            delivery,
            guard,
            config,
        }
    }

    /// Guarded entry point for the trigger surface. Errors mean no run
    /// record was created: `JobAlreadyRunning` or `JobInCooldown`.
    pub async fn trigger(&self) -> Result<RunOutcome> {
        self.guard.ensure_no_active_run().await?;
        self.guard.ensure_cooldown().await?;
        self.run().await
    }

    /// Create the run record and execute the pipeline. Any error escaping a
    /// stage boundary marks the run `Failed` with a single synthetic error.
    pub async fn run(&self) -> Result<RunOutcome> {
        let run = self.runs.create_running().await?;
        info!(run_id = %run.id, "job run started");

        match self.execute(&run).await {
            Ok(outcome) => Ok(outcome),
            Err(err) => {
                error!(run_id = %run.id, error = %err, "job run failed");
                let message = err.to_string();
                if let Err(update_err) = self
                    .runs
                    .update_status(
                        run.id,
                        JobStatus::Failed,
                        RunCompletion {
                            finished_at: Some(Utc::now()),
                            errors: Some(vec![JobError::fatal(message.clone())]),
                            ..Default::default()
                        },
                    )
                    .await
                {
                    error!(run_id = %run.id, error = %update_err, "failed to persist failed run");
                }
                Ok(RunOutcome::Failed {
                    run_id: run.id,
                    error: message,
                })
            }
        }
    }

    async fn execute(&self, run: &JobRun) -> Result<RunOutcome> {
        let job_started = Instant::now();

        let mut sources = self.sources.list_all().await?;
        if let Some(max) = self.config.max_sources_per_run {
            if sources.len() > max {
                info!(total = sources.len(), max, "limiting sources for this run");
                sources.truncate(max);
            }
        }

        let scrape = self.scraper.scrape_all(&sources).await;
        let mut errors: Vec<JobError> = scrape
            .errors
            .iter()
            .map(|e| JobError::scraping(e.source_url.as_str(), e.message.as_str()))
            .collect();

        if job_started.elapsed() > self.config.max_job_time {
            warn!(max_ms = self.config.max_job_time.as_millis() as u64, "job time budget exceeded");
            errors.push(JobError::scraping(
                "system",
                format!(
                    "Job timeout: exceeded {}ms",
                    self.config.max_job_time.as_millis()
                ),
            ));
        }

        // Stop-check #1: skip summarization and delivery entirely.
        if self.is_stopping(run.id).await? {
            self.finalize_stopped(run.id, errors).await?;
            return Ok(RunOutcome::Stopped { run_id: run.id });
        }

        let cost_check = self.cost.check_from_settings().await?;
        if !cost_check.allowed {
            info!(
                current_cost = cost_check.current_cost_usd,
                limit = ?cost_check.limit_usd,
                "cost limit reached, skipping summarization"
            );
            errors.push(JobError::cost_limit(format!(
                "Monthly cost limit reached: {:.4} USD >= {} USD. Summarization skipped.",
                cost_check.current_cost_usd,
                cost_check.limit_usd.unwrap_or_default()
            )));
            self.runs
                .update_status(
                    run.id,
                    JobStatus::Completed,
                    RunCompletion {
                        finished_at: Some(Utc::now()),
                        articles_collected: Some(scrape.total_collected),
                        articles_summarized: Some(0),
                        errors: Some(errors.clone()),
                    },
                )
                .await?;
            return Ok(RunOutcome::Completed {
                run_id: run.id,
                articles_collected: scrape.total_collected,
                articles_summarized: 0,
                errors,
            });
        }
        if cost_check.warning_threshold_reached {
            warn!(
                current_cost = cost_check.current_cost_usd,
                limit = ?cost_check.limit_usd,
                "cost warning threshold reached"
            );
        }

        let pending = self.articles.find_summary_null().await?;
        let summary_report = self.summarize.summarize_articles(&pending, run.id).await;
        errors.extend(summary_report.errors.iter().map(|e| {
            JobError::summarization(e.article_id, e.article_url.as_str(), e.message.as_str())
        }));

        // Stop-check #2: skip delivery.
        if self.is_stopping(run.id).await? {
            self.finalize_stopped(run.id, errors).await?;
            return Ok(RunOutcome::Stopped { run_id: run.id });
        }

        let settings = self.settings.get().await?;
        match settings.recipient_email.as_deref() {
            None => info!("no recipient configured, skipping email delivery"),
            Some(recipient) => {
                let (day_start, day_end) = day_window(run.started_at);
                let eligible = self
                    .articles
                    .find_summarized_between(day_start, day_end)
                    .await?;
                info!(count = eligible.len(), "articles eligible for digest");

                if eligible.is_empty() {
                    // Precedence: errors > collected-but-unsummarized >
                    // configured behavior. A failure notice covers the
                    // first two cases; an empty notice on top would be a
                    // contradiction.
                    let should_send_empty = scrape.total_collected == 0
                        && errors.is_empty()
                        && settings.empty_send_behavior == EmptySendBehavior::Notify;
                    if should_send_empty {
                        info!("no articles collected, sending empty notice");
                        if let Err(err) = self.delivery.send_empty_notice(recipient).await {
                            errors.push(JobError::delivery(format!(
                                "Failed to send empty notice: {}",
                                err
                            )));
                        }
                    } else if !errors.is_empty() {
                        info!("errors occurred, skipping empty notice");
                    } else if scrape.total_collected > 0 {
                        info!("articles collected but none summarized, skipping empty notice");
                    } else {
                        info!("no articles collected, skipping email (empty_send_behavior=skip)");
                    }
                } else if let Err(err) = self.delivery.send_digest(recipient, &eligible).await {
                    errors.push(JobError::delivery(format!(
                        "Failed to send digest: {}",
                        err
                    )));
                }
            }
        }

        // Best effort: a failure of the failure notice itself is only
        // logged, never recorded, to avoid a retry/notify loop.
        if !errors.is_empty() {
            if let Some(recipient) = settings.recipient_email.as_deref() {
                info!(count = errors.len(), "sending failure notice");
                if let Err(err) = self.delivery.send_failure_notice(recipient, &errors).await {
                    error!(error = %err, "failed to send failure notice");
                }
            }
        }

        let summarized = summary_report.summarized;
        self.runs
            .update_status(
                run.id,
                JobStatus::Completed,
                RunCompletion {
                    finished_at: Some(Utc::now()),
                    articles_collected: Some(scrape.total_collected),
                    articles_summarized: Some(summarized),
                    errors: Some(errors.clone()),
                },
            )
            .await?;
        info!(
            run_id = %run.id,
            collected = scrape.total_collected,
            summarized,
            errors = errors.len(),
            "job run completed"
        );
        Ok(RunOutcome::Completed {
            run_id: run.id,
            articles_collected: scrape.total_collected,
            articles_summarized: summarized,
            errors,
        })
    }

    async fn is_stopping(&self, run_id: Uuid) -> Result<bool> {
        Ok(self
            .runs
            .get(run_id)
            .await?
            .map(|r| r.status == JobStatus::Stopping)
            .unwrap_or(false))
    }

    async fn finalize_stopped(&self, run_id: Uuid, errors: Vec<JobError>) -> Result<()> {
        info!(run_id = %run_id, "stop requested, finalizing run as stopped");
        self.runs
            .update_status(
                run_id,
                JobStatus::Stopped,
                RunCompletion {
                    finished_at: Some(Utc::now()),
                    errors: Some(errors),
                    ..Default::default()
                },
            )
            .await
    }
}

/// UTC day window of the run start; articles summarized within it are
/// eligible for the digest.
fn day_window(started_at: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
    let date = started_at.date_naive();
    let start = date.and_hms_opt(0, 0, 0).expect("midnight valid").and_utc();
    let end = date
        .and_hms_milli_opt(23, 59, 59, 999)
        .expect("end of day valid")
        .and_utc();
    (start, end)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_day_window_spans_utc_day() {
        let started = Utc.with_ymd_and_hms(2026, 8, 7, 13, 45, 12).unwrap();
        let (start, end) = day_window(started);
        assert_eq!(start, Utc.with_ymd_and_hms(2026, 8, 7, 0, 0, 0).unwrap());
        assert!(end > started);
        assert_eq!(end.date_naive(), started.date_naive());
    }
}
