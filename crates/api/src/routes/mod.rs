pub mod health;
pub mod jobs;

use axum::routing::get;
use axum::Router;

use crate::state::AppState;
use crate::ws;

/// Build the `/api/v1` route tree.
///
/// ```text
/// /health                 service health
/// /jobs/{job_id}          current job record
/// /ws                     WebSocket
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .merge(health::api_router())
        .route("/jobs/{job_id}", get(jobs::get_job))
        .route("/ws", get(ws::ws_handler))
}
