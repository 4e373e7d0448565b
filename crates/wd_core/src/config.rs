use std::time::Duration;

/// Pipeline tunables. Test mode (`TEST_MODE=true`) shrinks the limits so a
/// verification run finishes in minutes instead of tens of minutes.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub test_mode: bool,

    /// Scrape stage fan-out cap.
    pub max_concurrent_sources: usize,
    /// Summarize stage fan-out cap.
    pub max_concurrent_summarizations: usize,

    /// Minimum spacing between requests to the same origin.
    pub rate_limit_interval: Duration,
    /// Timeout for the robots.txt fetch.
    pub robots_timeout: Duration,
    /// Timeout for list and article fetches.
    pub fetch_timeout: Duration,

    /// Cap on article URLs extracted from one list source.
    pub max_article_urls_per_source: usize,
    /// Wall-clock budget for the whole scrape stage.
    pub max_scrape_time: Duration,
    /// Wall-clock budget for the whole run.
    pub max_job_time: Duration,
    /// Cap on sources processed per run; None means all.
    pub max_sources_per_run: Option<usize>,

    /// Do not start a new run within this window of the last terminal run.
    pub cooldown: Duration,
    /// A run stuck in Stopping longer than this is force-closed.
    pub stale_stopping_window: Duration,

    pub user_agent: String,

    pub summarization_api_key: Option<String>,
    pub smtp_user: Option<String>,
    pub smtp_password: Option<String>,
    pub cron_secret: Option<String>,
}

impl PipelineConfig {
    pub fn from_env() -> Self {
        let test_mode = std::env::var("TEST_MODE")
            .map(|v| v == "true")
            .unwrap_or(false);
        Self {
            max_article_urls_per_source: if test_mode { 5 } else { 50 },
            max_scrape_time: if test_mode {
                Duration::from_secs(60)
            } else {
                Duration::from_secs(300)
            },
            max_job_time: if test_mode {
                Duration::from_secs(120)
            } else {
                Duration::from_secs(600)
            },
            max_sources_per_run: if test_mode { Some(2) } else { None },
            summarization_api_key: std::env::var("ANTHROPIC_API_KEY").ok(),
            smtp_user: std::env::var("GMAIL_USER").ok(),
            smtp_password: std::env::var("GMAIL_APP_PASSWORD").ok(),
            cron_secret: std::env::var("CRON_SECRET").ok(),
            test_mode,
            ..Self::default()
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            test_mode: false,
            max_concurrent_sources: 3,
            max_concurrent_summarizations: 5,
            rate_limit_interval: Duration::from_millis(1200),
            robots_timeout: Duration::from_secs(5),
            fetch_timeout: Duration::from_secs(15),
            max_article_urls_per_source: 50,
            max_scrape_time: Duration::from_secs(300),
            max_job_time: Duration::from_secs(600),
            max_sources_per_run: None,
            cooldown: Duration::from_secs(180),
            stale_stopping_window: Duration::from_secs(600),
            user_agent: "WebDigest/1.0 (+https://github.com/webdigest)".to_string(),
            summarization_api_key: None,
            smtp_user: None,
            smtp_password: None,
            cron_secret: None,
        }
    }
}
