//! Error types for the OCR review server

use axum::{
    extract::multipart::MultipartError,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::jobs::JobError;
use crate::ocr::OcrError;
use crate::results::{ExportError, StoreError};
use crate::storage::StorageError;

/// Application-wide result type
pub type Result<T> = std::result::Result<T, AppError>;

/// Application error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Result store error: {0}")]
    Store(#[from] StoreError),

    #[error("Job error: {0}")]
    Job(#[from] JobError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("OCR error: {0}")]
    Ocr(#[from] OcrError),

    #[error("Export error: {0}")]
    Export(#[from] ExportError),

    #[error("Multipart error: {0}")]
    Multipart(#[from] MultipartError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::BadRequest(_) | AppError::Multipart(_) => StatusCode::BAD_REQUEST,
            AppError::Store(StoreError::IndexOutOfRange { .. }) => StatusCode::NOT_FOUND,
            AppError::Job(JobError::ImageNotFound(_)) => StatusCode::NOT_FOUND,
            AppError::Job(JobError::QueueClosed) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Storage(StorageError::NotFound(_)) => StatusCode::NOT_FOUND,
            AppError::Storage(StorageError::EmptyUpload(_) | StorageError::InvalidImage(_)) => {
                StatusCode::BAD_REQUEST
            }
            AppError::Ocr(OcrError::ProviderNotAvailable(_)) => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_type(&self) -> &'static str {
        match self.status_code() {
            StatusCode::NOT_FOUND => "not_found",
            StatusCode::BAD_REQUEST => "bad_request",
            StatusCode::SERVICE_UNAVAILABLE => "unavailable",
            _ => match self {
                AppError::Store(_) => "store_error",
                AppError::Job(_) => "job_error",
                AppError::Storage(_) => "storage_error",
                AppError::Ocr(_) => "ocr_error",
                AppError::Export(_) => "export_error",
                AppError::Io(_) => "io_error",
                _ => "internal_error",
            },
        }
    }
}

/// Error response body
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let error_type = self.error_type();

        let (message, details) = if status.is_server_error() {
            tracing::error!("{}", self);
            let message = match &self {
                AppError::Job(JobError::QueueClosed) => "OCR worker is not running".to_string(),
                AppError::Ocr(e @ OcrError::ProviderNotAvailable(_)) => e.to_string(),
                _ => "An internal error occurred".to_string(),
            };
            (message, None)
        } else {
            let details = match &self {
                AppError::Store(StoreError::IndexOutOfRange { index, len }) => {
                    Some(format!("index={} len={}", index, len))
                }
                _ => None,
            };
            (self.to_string(), details)
        };

        let body = Json(ErrorResponse {
            error: error_type.to_string(),
            message,
            details,
        });

        (status, body).into_response()
    }
}
