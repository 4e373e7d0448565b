use std::sync::Arc;

use wd_core::store::RunStore;
use wd_jobs::JobOrchestrator;

pub struct AppState {
    pub orchestrator: Arc<JobOrchestrator>,
    pub runs: Arc<dyn RunStore>,
    pub cron_secret: Option<String>,
}
