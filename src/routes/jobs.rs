//! OCR job routes
//!
//! Endpoints:
//! - POST   /api/v1/ocr/jobs - Submit one image
//! - POST   /api/v1/ocr/jobs/batch - Submit many images (all when omitted)
//! - GET    /api/v1/ocr/jobs/:job_id - Job status, `unknown` for foreign ids
//! - DELETE /api/v1/ocr/jobs/:job_id - Cancel a queued or running job

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::Result;
use crate::jobs::{JobId, JobStatus};
use crate::state::AppState;
use crate::storage::ImageRef;

#[derive(Debug, Serialize, Deserialize)]
pub struct SubmitRequest {
    pub image_ref: ImageRef,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SubmitResponse {
    pub job_id: JobId,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct BatchSubmitRequest {
    #[serde(default)]
    pub image_refs: Option<Vec<ImageRef>>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct BatchSubmitResponse {
    pub job_ids: Vec<JobId>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CancelResponse {
    pub cancelled: bool,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/ocr/jobs", post(submit_job))
        .route("/ocr/jobs/batch", post(submit_batch))
        .route("/ocr/jobs/:job_id", get(job_status).delete(cancel_job))
}

async fn submit_job(
    State(state): State<AppState>,
    Json(request): Json<SubmitRequest>,
) -> Result<(StatusCode, Json<SubmitResponse>)> {
    let job_id = state.jobs().submit(&request.image_ref).await?;
    Ok((StatusCode::ACCEPTED, Json(SubmitResponse { job_id })))
}

/// A missing body or a missing `image_refs` submits every uploaded image
async fn submit_batch(
    State(state): State<AppState>,
    body: Option<Json<BatchSubmitRequest>>,
) -> Result<(StatusCode, Json<BatchSubmitResponse>)> {
    let requested = body.and_then(|Json(request)| request.image_refs);
    let image_refs = match requested {
        Some(refs) => refs,
        None => state
            .images()
            .list_images()
            .await?
            .into_iter()
            .map(|info| info.image_ref)
            .collect(),
    };

    let job_ids = state.jobs().submit_batch(&image_refs).await?;
    tracing::info!(requested = image_refs.len(), queued = job_ids.len(), "Batch OCR submitted");
    Ok((StatusCode::ACCEPTED, Json(BatchSubmitResponse { job_ids })))
}

async fn job_status(State(state): State<AppState>, Path(job_id): Path<String>) -> Json<JobStatus> {
    Json(state.jobs().status(&job_id))
}

async fn cancel_job(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> Json<CancelResponse> {
    let cancelled = Uuid::parse_str(&job_id)
        .map(|id| state.jobs().cancel(id))
        .unwrap_or(false);
    Json(CancelResponse { cancelled })
}
