//! cantina-sync library interface
//!
//! Weekly canteen menu synchronization: pages the upstream menu feed into the
//! store, enriches items through the generation provider, garbage-collects
//! orphaned images and serves the enriched result over HTTP.

pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod feed;
pub mod generation;
pub mod pipeline;
pub mod scheduler;
pub mod utils;

pub use crate::error::{ApiError, ApiResult};

use axum::Router;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::scheduler::SharedSyncStatus;

/// Settings the HTTP handlers need
#[derive(Debug, Clone)]
pub struct ApiSettings {
    /// URL prefix for image links
    pub public_address: String,
    /// Admin routes are open when `None`
    pub admin_key: Option<String>,
    /// Directory served under `/images`
    pub asset_dir: PathBuf,
}

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Store pool, shared with the schedules
    pub db: SqlitePool,
    pub settings: Arc<ApiSettings>,
    /// Latest schedule outcomes
    pub sync_status: SharedSyncStatus,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    pub fn new(db: SqlitePool, settings: ApiSettings, sync_status: SharedSyncStatus) -> Self {
        Self {
            db,
            settings: Arc::new(settings),
            sync_status,
            startup_time: Utc::now(),
        }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    let assets = ServeDir::new(&state.settings.asset_dir);

    Router::new()
        .merge(api::menu_routes())
        .merge(api::surveillance_routes())
        .merge(api::admin_routes())
        .merge(api::health_routes())
        .nest_service("/images", assets)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
