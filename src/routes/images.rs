//! Image routes
//!
//! Endpoints:
//! - GET  /api/v1/images - List uploaded images
//! - POST /api/v1/images - Upload one image (multipart)
//! - POST /api/v1/images/batch - Upload many images (multipart)
//! - GET  /api/v1/images/:image_ref/file - Raw image bytes

use axum::{
    body::Body,
    extract::{DefaultBodyLimit, Multipart, Path, State},
    http::{header, StatusCode},
    response::Response,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;

use crate::error::{AppError, Result};
use crate::state::AppState;
use crate::storage::{ImageInfo, ImageRef, StorageError, StoredImage};

/// Upload size limit per request
const MAX_UPLOAD_BYTES: usize = 50 * 1024 * 1024;

#[derive(Debug, Serialize)]
pub struct ImageListResponse {
    pub images: Vec<ImageInfo>,
    pub total: usize,
}

#[derive(Debug, Serialize)]
pub struct RejectedUpload {
    pub filename: String,
    pub reason: String,
}

#[derive(Debug, Serialize)]
pub struct BatchUploadResponse {
    pub images: Vec<StoredImage>,
    pub rejected: Vec<RejectedUpload>,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/images", get(list_images).post(upload_image))
        .route("/images/batch", post(upload_batch))
        .route("/images/:image_ref/file", get(serve_image))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
}

async fn list_images(State(state): State<AppState>) -> Result<Json<ImageListResponse>> {
    let images = state.images().list_images().await?;
    let total = images.len();
    Ok(Json(ImageListResponse { images, total }))
}

/// POST /api/v1/images
///
/// Stores the first file field. Re-uploading identical bytes answers 200
/// with the existing image instead of 201.
async fn upload_image(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<StoredImage>)> {
    while let Some(field) = multipart.next_field().await? {
        let Some(filename) = field.file_name().map(|s| s.to_string()) else {
            continue;
        };
        let data = field.bytes().await?;
        tracing::debug!("Read {} bytes for upload '{}'", data.len(), filename);

        let stored = state.images().put(&filename, &data).await?;
        let status = if stored.is_duplicate {
            StatusCode::OK
        } else {
            StatusCode::CREATED
        };
        return Ok((status, Json(stored)));
    }

    tracing::warn!("No file field found in multipart upload");
    Err(AppError::BadRequest("No file found in upload".to_string()))
}

/// POST /api/v1/images/batch
///
/// Every file field is stored independently; a bad file is reported in
/// `rejected` without failing the others.
async fn upload_batch(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<BatchUploadResponse>> {
    let mut images = Vec::new();
    let mut rejected = Vec::new();

    while let Some(field) = multipart.next_field().await? {
        let Some(filename) = field.file_name().map(|s| s.to_string()) else {
            continue;
        };
        let data = field.bytes().await?;

        match state.images().put(&filename, &data).await {
            Ok(stored) => images.push(stored),
            Err(e @ (StorageError::EmptyUpload(_) | StorageError::InvalidImage(_))) => {
                tracing::warn!(filename = %filename, error = %e, "Rejected upload");
                rejected.push(RejectedUpload {
                    filename,
                    reason: e.to_string(),
                });
            }
            Err(e) => return Err(e.into()),
        }
    }

    if images.is_empty() && rejected.is_empty() {
        return Err(AppError::BadRequest("No files found in upload".to_string()));
    }

    tracing::info!(stored = images.len(), rejected = rejected.len(), "Batch upload finished");
    Ok(Json(BatchUploadResponse { images, rejected }))
}

async fn serve_image(
    State(state): State<AppState>,
    Path(image_ref): Path<String>,
) -> Result<Response> {
    let image_ref = ImageRef::new(image_ref);
    let info = state
        .images()
        .info(&image_ref)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Image not found: {}", image_ref)))?;
    let bytes = state.images().fetch_image(&image_ref).await?;

    let content_type = mime_guess::from_path(&info.filename)
        .first_or_octet_stream()
        .to_string();

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, content_type)
        .header(header::CONTENT_LENGTH, bytes.len())
        .header(
            header::CONTENT_DISPOSITION,
            format!(
                "inline; filename*=UTF-8''{}",
                urlencoding::encode(&info.filename)
            ),
        )
        .header(header::CACHE_CONTROL, "public, max-age=86400")
        .body(Body::from(bytes))
        .map_err(|e| AppError::Internal(e.to_string()))
}
