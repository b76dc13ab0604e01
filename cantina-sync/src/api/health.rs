//! Health check endpoint

use axum::{extract::State, routing::get, Json, Router};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::AppState;

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub module: String,
    pub version: String,
    pub uptime_seconds: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_pipeline_run: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_collection_run: Option<DateTime<Utc>>,
    /// Failure of the latest pipeline run, for diagnostics
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pipeline_error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub collection_error: Option<String>,
}

/// GET /health
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let uptime = Utc::now().signed_duration_since(state.startup_time);
    let status = state.sync_status.read().await.clone();

    Json(HealthResponse {
        status: "ok".to_string(),
        module: "cantina-sync".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: uptime.num_seconds().max(0) as u64,
        last_pipeline_run: status.last_pipeline_run,
        last_collection_run: status.last_collection_run,
        pipeline_error: status.pipeline_error,
        collection_error: status.collection_error,
    })
}

/// Build health check routes
pub fn health_routes() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}
