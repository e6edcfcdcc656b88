use axum::extract::{Path, State};
use axum::Json;
use soilsense_core::error::CoreError;
use soilsense_store::Job;

use crate::error::AppResult;
use crate::state::AppState;

/// GET /api/v1/jobs/{job_id} -- current record of one job.
pub async fn get_job(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> AppResult<Json<Job>> {
    let job = state
        .jobs
        .get(&job_id)
        .await
        .ok_or(CoreError::NotFound { entity: "job", id: job_id })?;
    Ok(Json(job))
}
