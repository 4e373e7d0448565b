use std::sync::Arc;

use chrono::Utc;
use tracing::warn;

use wd_core::models::{JobStatus, RunCompletion};
use wd_core::store::RunStore;
use wd_core::{Error, PipelineConfig, Result};

/// Pre-run guards: the single-flight check (with stale-Stopping recovery)
/// and the post-run cooldown.
pub struct RunGuard {
    runs: Arc<dyn RunStore>,
    config: PipelineConfig,
}

impl RunGuard {
    pub fn new(runs: Arc<dyn RunStore>, config: PipelineConfig) -> Self {
        Self { runs, config }
    }

    /// Reject while a run is active. A run stuck in `Stopping` past the
    /// staleness window is abandoned: force-close it to `Stopped` so the
    /// system cannot stay wedged.
    pub async fn ensure_no_active_run(&self) -> Result<()> {
        let Some(active) = self.runs.find_active().await? else {
            return Ok(());
        };

        if active.status == JobStatus::Stopping {
            let elapsed = (Utc::now() - active.started_at).to_std().unwrap_or_default();
            if elapsed > self.config.stale_stopping_window {
                warn!(
                    run_id = %active.id,
                    elapsed_secs = elapsed.as_secs(),
                    "stale stopping run, marking as stopped"
                );
                self.runs
                    .update_status(
                        active.id,
                        JobStatus::Stopped,
                        RunCompletion {
                            finished_at: Some(Utc::now()),
                            ..Default::default()
                        },
                    )
                    .await?;
                // Anything else still active blocks the new run.
                if self.runs.find_active().await?.is_some() {
                    return Err(Error::JobAlreadyRunning);
                }
                return Ok(());
            }
        }

        Err(Error::JobAlreadyRunning)
    }

    /// Reject within the cooldown window after the previous terminal run.
    pub async fn ensure_cooldown(&self) -> Result<()> {
        let Some(last) = self.runs.find_last_terminal().await? else {
            return Ok(());
        };
        let Some(finished_at) = last.finished_at else {
            return Ok(());
        };
        let elapsed = (Utc::now() - finished_at).to_std().unwrap_or_default();
        if elapsed < self.config.cooldown {
            let remaining = (self.config.cooldown - elapsed).as_secs_f64().ceil() as u64;
            return Err(Error::JobInCooldown {
                remaining_secs: remaining,
            });
        }
        Ok(())
    }
}
