pub mod api;
pub mod cost;
pub mod stage;

pub use api::{AnthropicClient, Summarizer, Summary};
pub use cost::{CostCheck, CostManager, DenyReason};
pub use stage::{SummarizeReport, SummarizeStage, SummaryError};

pub mod prelude {
    pub use super::{AnthropicClient, CostManager, SummarizeStage, Summarizer};
    pub use wd_core::{Error, Result};
}
