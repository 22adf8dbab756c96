//! OCR Types
//!
//! Defines the engine-neutral detection type and OCR errors.

use serde::{Deserialize, Serialize};

use crate::results::{BoundingBox, DetectedRegion};

/// OCR engine kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OcrProvider {
    /// Tesseract CLI (local)
    Tesseract,
    /// HTTP OCR service (e.g. an EasyOCR sidecar)
    Remote,
    /// Fixed detections, for offline runs and tests
    Static,
}

impl OcrProvider {
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "tesseract" => Some(Self::Tesseract),
            "remote" | "http" => Some(Self::Remote),
            "static" => Some(Self::Static),
            _ => None,
        }
    }
}

/// One text instance found by an engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OcrDetection {
    pub bbox: BoundingBox,
    pub text: String,
    /// Confidence in `[0, 1]`
    pub confidence: Option<f64>,
}

impl OcrDetection {
    pub fn new(bbox: BoundingBox, text: impl Into<String>, confidence: Option<f64>) -> Self {
        Self {
            bbox,
            text: text.into(),
            confidence,
        }
    }
}

impl From<OcrDetection> for DetectedRegion {
    fn from(d: OcrDetection) -> Self {
        DetectedRegion::new(d.bbox, d.text, d.confidence)
    }
}

/// OCR error types
#[derive(Debug, thiserror::Error)]
pub enum OcrError {
    #[error("OCR provider not available: {0}")]
    ProviderNotAvailable(String),

    #[error("OCR processing failed: {0}")]
    ProcessingError(String),

    #[error("API error: {0}")]
    ApiError(String),

    #[error("OCR timed out after {0} seconds")]
    Timeout(u64),
}
