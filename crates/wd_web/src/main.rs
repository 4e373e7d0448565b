use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use wd_core::{PipelineConfig, Result};
use wd_delivery::{DeliveryService, SmtpMailer};
use wd_jobs::JobOrchestrator;
use wd_scraper::Scraper;
use wd_storage::MemoryStore;
use wd_summarizer::{AnthropicClient, CostManager, SummarizeStage, Summarizer, Summary};
use wd_web::{create_app, AppState};

/// Stand-in used when no API key is configured; every summarization fails
/// with a per-article error instead of blocking startup.
struct UnconfiguredSummarizer;

#[async_trait]
impl Summarizer for UnconfiguredSummarizer {
    async fn summarize(&self, _title: Option<&str>, _content: &str) -> Result<Summary> {
        Err(wd_core::Error::Summarization(
            "ANTHROPIC_API_KEY is not configured".into(),
        ))
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = PipelineConfig::from_env();
    if config.test_mode {
        info!("TEST_MODE enabled, running with reduced limits");
    }

    let store = Arc::new(MemoryStore::new());

    let summarizer: Arc<dyn Summarizer> =
        match AnthropicClient::new(config.summarization_api_key.clone()) {
            Ok(client) => Arc::new(client),
            Err(err) => {
                warn!(error = %err, "summarization disabled");
                Arc::new(UnconfiguredSummarizer)
            }
        };

    let scraper = Arc::new(Scraper::new(store.clone(), store.clone(), config.clone()));
    let summarize = Arc::new(SummarizeStage::new(
        summarizer,
        store.clone(),
        store.clone(),
        config.clone(),
    ));
    let cost = Arc::new(CostManager::new(store.clone(), store.clone()));
    let mailer = Arc::new(SmtpMailer::new(
        config.smtp_user.clone(),
        config.smtp_password.clone(),
    ));
    let delivery = Arc::new(DeliveryService::new(mailer));

    let orchestrator = Arc::new(JobOrchestrator::new(
        store.clone(),
        store.clone(),
        store.clone(),
        store.clone(),
        scraper,
        summarize,
        cost,
        delivery,
        config.clone(),
    ));

    let state = AppState {
        orchestrator,
        runs: store,
        cron_secret: config.cron_secret.clone(),
    };
    let app = create_app(state);

    let addr = std::env::var("WD_LISTEN").unwrap_or_else(|_| "127.0.0.1:3000".to_string());
    info!(%addr, "listening");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
