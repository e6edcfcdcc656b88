use axum::extract::State;
use axum::{routing::get, Json, Router};
use serde::Serialize;
use soilsense_core::types::Timestamp;

use crate::state::AppState;

/// Health check response payload.
#[derive(Serialize)]
pub struct HealthResponse {
    /// Overall service status.
    pub status: &'static str,
    /// Crate version from Cargo.toml.
    pub version: &'static str,
    pub timestamp: Timestamp,
    /// Whether the sensor bus transport is currently connected.
    pub sensor_bus_connected: bool,
}

/// GET /health -- returns service and sensor bus health.
async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        timestamp: chrono::Utc::now(),
        sensor_bus_connected: state.sensor_bus.is_connected(),
    })
}

/// GET / -- plain-text banner.
async fn banner() -> &'static str {
    "SoilSense back-end is running (WebSocket + sensor bus)"
}

/// Mount root-level routes (NOT under `/api/v1`).
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(banner))
        .route("/health", get(health_check))
}

/// Health check under `/api/v1`.
pub fn api_router() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}
