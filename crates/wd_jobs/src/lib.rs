pub mod guard;
pub mod orchestrator;

pub use guard::RunGuard;
pub use orchestrator::{JobOrchestrator, RunOutcome};

pub mod prelude {
    pub use super::{JobOrchestrator, RunGuard, RunOutcome};
    pub use wd_core::{Error, Result};
}
