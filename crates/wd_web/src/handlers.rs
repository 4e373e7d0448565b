use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use serde_json::json;
use std::sync::Arc;
use tracing::error;

use wd_core::Error;
use wd_jobs::RunOutcome;

use crate::AppState;

pub async fn health() -> impl IntoResponse {
    Json(json!({"status": "ok"}))
}

/// Bearer-secret check shared by the trigger and stop endpoints.
fn authorize(state: &AppState, headers: &HeaderMap) -> Result<(), (StatusCode, Json<serde_json::Value>)> {
    let Some(secret) = state.cron_secret.as_deref() else {
        error!("CRON_SECRET is not set");
        return Err((
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"error": "Server configuration error"})),
        ));
    };
    let token = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "));
    if token != Some(secret) {
        return Err((
            StatusCode::UNAUTHORIZED,
            Json(json!({"error": "Invalid or missing CRON_SECRET"})),
        ));
    }
    Ok(())
}

/// POST /api/cron/daily: run the pipeline once, end to end.
pub async fn trigger_daily_run(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> impl IntoResponse {
    if let Err(rejection) = authorize(&state, &headers) {
        return rejection;
    }

    match state.orchestrator.trigger().await {
        Ok(RunOutcome::Completed {
            run_id,
            articles_collected,
            articles_summarized,
            errors,
        }) => (
            StatusCode::OK,
            Json(json!({
                "status": "completed",
                "job_run_id": run_id,
                "articles_collected": articles_collected,
                "articles_summarized": articles_summarized,
                "errors": errors,
            })),
        ),
        Ok(RunOutcome::Stopped { run_id }) => (
            StatusCode::OK,
            Json(json!({"status": "stopped", "job_run_id": run_id})),
        ),
        Ok(RunOutcome::Failed { run_id, error }) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"status": "failed", "job_run_id": run_id, "error": error})),
        ),
        Err(Error::JobAlreadyRunning) => (
            StatusCode::CONFLICT,
            Json(json!({"status": "skipped", "reason": "Job already running"})),
        ),
        Err(Error::JobInCooldown { remaining_secs }) => (
            StatusCode::TOO_MANY_REQUESTS,
            Json(json!({"status": "cooldown", "retry_after_secs": remaining_secs})),
        ),
        Err(err) => {
            error!(error = %err, "trigger failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"error": err.to_string()})),
            )
        }
    }
}

/// POST /api/jobs/stop: request a cooperative stop of the running job.
pub async fn stop_job(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> impl IntoResponse {
    if let Err(rejection) = authorize(&state, &headers) {
        return rejection;
    }

    match state.runs.request_stop().await {
        Ok(Some(run_id)) => (
            StatusCode::OK,
            Json(json!({"status": "stopping", "job_run_id": run_id})),
        ),
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(json!({"error": "No running job found"})),
        ),
        Err(err) => {
            error!(error = %err, "stop request failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"error": err.to_string()})),
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;
    use wd_core::store::RunStore;
    use wd_core::PipelineConfig;
    use wd_core::Result;
    use wd_delivery::{DeliveryService, SmtpMailer};
    use wd_jobs::JobOrchestrator;
    use wd_scraper::Scraper;
    use wd_storage::MemoryStore;
    use wd_summarizer::{CostManager, SummarizeStage, Summarizer, Summary};

    struct UnconfiguredSummarizer;

    #[async_trait::async_trait]
    impl Summarizer for UnconfiguredSummarizer {
        async fn summarize(&self, _title: Option<&str>, _content: &str) -> Result<Summary> {
            Err(Error::Summarization("not configured".into()))
        }
    }

    fn test_app(secret: Option<&str>) -> (axum::Router, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        let config = PipelineConfig::default();
        let scraper = Arc::new(Scraper::new(store.clone(), store.clone(), config.clone()));
        let summarize = Arc::new(SummarizeStage::new(
            Arc::new(UnconfiguredSummarizer),
            store.clone(),
            store.clone(),
            config.clone(),
        ));
        let cost = Arc::new(CostManager::new(store.clone(), store.clone()));
        let delivery = Arc::new(DeliveryService::new(Arc::new(SmtpMailer::new(None, None))));
        let orchestrator = Arc::new(JobOrchestrator::new(
            store.clone(),
            store.clone(),
            store.clone(),
            store.clone(),
            scraper,
            summarize,
            cost,
            delivery,
            config,
        ));
        let state = AppState {
            orchestrator,
            runs: store.clone(),
            cron_secret: secret.map(String::from),
        };
        (crate::create_app(state), store)
    }

    fn post(uri: &str, bearer: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder().method("POST").uri(uri);
        if let Some(token) = bearer {
            builder = builder.header("authorization", format!("Bearer {}", token));
        }
        builder.body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let (app, _) = test_app(Some("secret"));
        let response = app
            .oneshot(Request::builder().uri("/api/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_missing_secret_is_server_error() {
        let (app, _) = test_app(None);
        let response = app.oneshot(post("/api/cron/daily", None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn test_wrong_token_is_unauthorized() {
        let (app, _) = test_app(Some("secret"));
        let response = app
            .oneshot(post("/api/cron/daily", Some("wrong")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_stop_without_running_job_is_not_found() {
        let (app, _) = test_app(Some("secret"));
        let response = app
            .oneshot(post("/api/jobs/stop", Some("secret")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_stop_marks_running_job() {
        let (app, store) = test_app(Some("secret"));
        store.create_running().await.unwrap();

        let response = app
            .oneshot(post("/api/jobs/stop", Some("secret")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let active = store.find_active().await.unwrap().unwrap();
        assert_eq!(active.status, wd_core::models::JobStatus::Stopping);
    }
}
