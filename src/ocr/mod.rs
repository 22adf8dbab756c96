//! OCR Module
//!
//! Turns image bytes into detected text regions.
//!
//! Supports multiple engines:
//! - Tesseract (local CLI, TSV output merged into lines)
//! - Remote HTTP OCR service
//! - Static detections (offline runs, tests)
//!
//! ## Usage
//!
//! ```rust,ignore
//! use ocr_review_server::ocr::OcrService;
//!
//! let service = OcrService::from_config(&config.ocr);
//! let detections = service.recognize(&image_bytes).await?;
//! ```

mod provider;
mod service;
mod types;

pub use provider::{parse_tsv, OcrEngine, RemoteOcrEngine, StaticEngine, TesseractEngine};
pub use service::OcrService;
pub use types::{OcrDetection, OcrError, OcrProvider};
