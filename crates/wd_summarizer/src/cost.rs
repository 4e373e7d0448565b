use std::sync::Arc;

use chrono::{DateTime, Datelike, Utc};
use tracing::info;

use wd_core::models::MetricType;
use wd_core::store::{MetricStore, SettingsStore};
use wd_core::Result;

const DEFAULT_WARNING_RATIO: f64 = 0.8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenyReason {
    LimitReached,
}

#[derive(Debug, Clone)]
pub struct CostCheck {
    pub allowed: bool,
    pub reason: Option<DenyReason>,
    pub current_cost_usd: f64,
    pub limit_usd: Option<f64>,
    pub warning_threshold_reached: bool,
}

/// Monthly spend gate in front of the summarize stage. Aggregates recorded
/// cost metrics since the first instant of the current calendar month.
pub struct CostManager {
    metrics: Arc<dyn MetricStore>,
    settings: Arc<dyn SettingsStore>,
}

impl CostManager {
    pub fn new(metrics: Arc<dyn MetricStore>, settings: Arc<dyn SettingsStore>) -> Self {
        Self { metrics, settings }
    }

    pub async fn current_month_cost(&self) -> Result<f64> {
        self.metrics
            .sum_since(MetricType::ApiCostUsd, month_start(Utc::now()))
            .await
    }

    pub async fn check(&self, limit_usd: Option<f64>, warning_ratio: f64) -> Result<CostCheck> {
        let current = self.current_month_cost().await?;

        let limit = match limit_usd {
            Some(limit) if limit > 0.0 => limit,
            _ => {
                return Ok(CostCheck {
                    allowed: true,
                    reason: None,
                    current_cost_usd: current,
                    limit_usd: None,
                    warning_threshold_reached: false,
                })
            }
        };

        if current >= limit {
            return Ok(CostCheck {
                allowed: false,
                reason: Some(DenyReason::LimitReached),
                current_cost_usd: current,
                limit_usd: Some(limit),
                warning_threshold_reached: false,
            });
        }

        let warning_threshold_reached = current >= limit * warning_ratio;
        Ok(CostCheck {
            allowed: true,
            reason: None,
            current_cost_usd: current,
            limit_usd: Some(limit),
            warning_threshold_reached,
        })
    }

    /// Pull the limit and warning ratio from Settings.
    pub async fn check_from_settings(&self) -> Result<CostCheck> {
        let settings = self.settings.get().await?;
        let ratio = if settings.cost_warning_ratio > 0.0 {
            settings.cost_warning_ratio
        } else {
            DEFAULT_WARNING_RATIO
        };
        let check = self.check(settings.cost_limit_monthly_usd, ratio).await?;
        info!(
            allowed = check.allowed,
            current_cost = check.current_cost_usd,
            limit = ?check.limit_usd,
            "cost check"
        );
        Ok(check)
    }
}

fn month_start(now: DateTime<Utc>) -> DateTime<Utc> {
    now.date_naive()
        .with_day(1)
        .expect("day 1 always valid")
        .and_hms_opt(0, 0, 0)
        .expect("midnight always valid")
        .and_utc()
}
