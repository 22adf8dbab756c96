//! Result review routes
//!
//! Endpoints:
//! - GET   /api/v1/images/:image_ref/results - Current region list
//! - PATCH /api/v1/images/:image_ref/results/:index - Rename and/or set status
//! - POST  /api/v1/images/:image_ref/results/:index/remove - Soft-remove
//! - POST  /api/v1/images/:image_ref/results/:index/restore - Restore
//! - POST  /api/v1/images/:image_ref/clean - Resolve overlapping regions
//! - GET   /api/v1/images/:image_ref/hit?x=&y= - Region under a point
//! - GET   /api/v1/images/:image_ref/export.csv - CSV of active regions
//!
//! Indices always refer to the list as it is at the moment the request is
//! applied. Clients that hold an older view re-locate regions by identity.

use axum::{
    extract::{Path, Query, State},
    http::header,
    response::IntoResponse,
    routing::{get, patch, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::results::{self, to_csv, DetectedRegion, Point, RegionStatus};
use crate::state::AppState;
use crate::storage::ImageRef;

#[derive(Debug, Serialize, Deserialize)]
pub struct ResultsResponse {
    pub image_ref: ImageRef,
    pub items: Vec<DetectedRegion>,
}

/// PATCH body; at least one field must be set
#[derive(Debug, Default, Deserialize)]
pub struct UpdateRegionRequest {
    #[serde(default, alias = "name")]
    pub text: Option<String>,
    #[serde(default)]
    pub status: Option<RegionStatus>,
}

#[derive(Debug, Deserialize)]
pub struct HitQuery {
    pub x: i64,
    pub y: i64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HitResponse {
    pub index: Option<usize>,
    pub region: Option<DetectedRegion>,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/images/:image_ref/results", get(list_results))
        .route("/images/:image_ref/results/:index", patch(update_region))
        .route("/images/:image_ref/results/:index/remove", post(remove_region))
        .route("/images/:image_ref/results/:index/restore", post(restore_region))
        .route("/images/:image_ref/clean", post(clean_results))
        .route("/images/:image_ref/hit", get(hit_test))
        .route("/images/:image_ref/export.csv", get(export_csv))
}

async fn list_results(
    State(state): State<AppState>,
    Path(image_ref): Path<String>,
) -> Json<ResultsResponse> {
    let image_ref = ImageRef::new(image_ref);
    let items = state.results().list(&image_ref);
    Json(ResultsResponse { image_ref, items })
}

async fn update_region(
    State(state): State<AppState>,
    Path((image_ref, index)): Path<(String, usize)>,
    Json(request): Json<UpdateRegionRequest>,
) -> Result<Json<DetectedRegion>> {
    if request.text.is_none() && request.status.is_none() {
        return Err(AppError::BadRequest(
            "Expected at least one of 'text' or 'status'".to_string(),
        ));
    }

    let image_ref = ImageRef::new(image_ref);
    let updated = state
        .results()
        .update(&image_ref, index, request.text, request.status)
        .await?;

    tracing::debug!(image_ref = %image_ref, index, "Updated region");
    Ok(Json(updated))
}

async fn remove_region(
    State(state): State<AppState>,
    Path((image_ref, index)): Path<(String, usize)>,
) -> Result<Json<DetectedRegion>> {
    let image_ref = ImageRef::new(image_ref);
    let region = state
        .results()
        .set_status(&image_ref, index, RegionStatus::Removed)
        .await?;
    Ok(Json(region))
}

async fn restore_region(
    State(state): State<AppState>,
    Path((image_ref, index)): Path<(String, usize)>,
) -> Result<Json<DetectedRegion>> {
    let image_ref = ImageRef::new(image_ref);
    let region = state
        .results()
        .set_status(&image_ref, index, RegionStatus::Active)
        .await?;
    Ok(Json(region))
}

async fn clean_results(
    State(state): State<AppState>,
    Path(image_ref): Path<String>,
) -> Result<Json<ResultsResponse>> {
    let image_ref = ImageRef::new(image_ref);
    let items = state.results().clean(&image_ref).await?;
    Ok(Json(ResultsResponse { image_ref, items }))
}

async fn hit_test(
    State(state): State<AppState>,
    Path(image_ref): Path<String>,
    Query(query): Query<HitQuery>,
) -> Json<HitResponse> {
    let regions = state.results().list(&ImageRef::new(image_ref));
    let index = results::hit(Point::new(query.x, query.y), &regions);
    let region = index.and_then(|i| regions.get(i).cloned());
    Json(HitResponse { index, region })
}

async fn export_csv(
    State(state): State<AppState>,
    Path(image_ref): Path<String>,
) -> impl IntoResponse {
    let image_ref = ImageRef::new(image_ref);
    let csv = to_csv(&image_ref, &state.results().list(&image_ref));
    (
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!(
                    "attachment; filename*=UTF-8''{}",
                    urlencoding::encode(&format!("{}.csv", image_ref))
                ),
            ),
        ],
        csv,
    )
}
