//! Health check endpoint

use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;
use tracing::warn;

use crate::AppState;

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub module: String,
    pub version: String,
    pub uptime_seconds: u64,
    /// "ok" or "unavailable"
    pub redis: String,
}

/// GET /health
///
/// Does not require authentication. Reports the store as unavailable instead of
/// failing, so the process itself still reads as alive.
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let redis = match state.store.ping().await {
        Ok(()) => "ok",
        Err(e) => {
            warn!("Health check: store ping failed: {}", e);
            "unavailable"
        }
    };

    Json(HealthResponse {
        status: "ok".to_string(),
        module: "yaktoon-api".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.started_at.elapsed().as_secs(),
        redis: redis.to_string(),
    })
}

/// Build health check routes
pub fn health_routes() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}
