//! Bulk export

use axum::{extract::State, http::header, response::IntoResponse, routing::get, Router};

use crate::error::Result;
use crate::results::to_zip;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/exports/results.zip", get(export_zip))
}

/// GET /api/v1/exports/results.zip
///
/// One `<image_ref>.csv` per image that has results.
async fn export_zip(State(state): State<AppState>) -> Result<impl IntoResponse> {
    let results = state.results();
    let lists: Vec<_> = results
        .image_refs()
        .into_iter()
        .map(|image_ref| {
            let regions = results.list(&image_ref);
            (image_ref, regions)
        })
        .collect();

    let archive = to_zip(lists.iter().map(|(r, regions)| (r, regions.as_slice())))?;
    tracing::info!(images = lists.len(), bytes = archive.len(), "Built results archive");

    Ok((
        [
            (header::CONTENT_TYPE, "application/zip"),
            (
                header::CONTENT_DISPOSITION,
                "attachment; filename=\"results.zip\"",
            ),
        ],
        archive,
    ))
}
