use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Scraping error: {0}")]
    Scraping(String),

    #[error("Summarization error: {0}")]
    Summarization(String),

    #[error("Delivery error: {0}")]
    Delivery(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("a job is already running")]
    JobAlreadyRunning,

    #[error("job cooldown active, retry in {remaining_secs}s")]
    JobInCooldown { remaining_secs: u64 },

    #[error("External error: {0}")]
    External(#[from] anyhow::Error),
}
