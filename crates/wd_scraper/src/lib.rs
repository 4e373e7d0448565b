pub mod extract;
pub mod ratelimit;
pub mod robots;
pub mod stage;

pub use ratelimit::RateLimiter;
pub use robots::RobotsChecker;
pub use stage::{ScrapeError, ScrapeReport, Scraper, SourceOutcome};

pub mod prelude {
    pub use super::{RateLimiter, RobotsChecker, ScrapeReport, Scraper};
    pub use wd_core::{Error, Result};
}
