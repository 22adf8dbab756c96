//! OCR Service
//!
//! Orchestrates OCR engines: the first available engine in configured order
//! wins, and a failing engine falls through to the next one.

use std::sync::Arc;
use std::time::Duration;

use super::{
    provider::{OcrEngine, RemoteOcrEngine, StaticEngine, TesseractEngine},
    types::{OcrDetection, OcrError, OcrProvider},
};
use crate::config::OcrConfig;

/// OCR service handed to the worker
pub struct OcrService {
    engines: Vec<Arc<dyn OcrEngine>>,
    timeout: Duration,
}

impl OcrService {
    /// Build engines from configuration, in configured order
    pub fn from_config(config: &OcrConfig) -> Self {
        let timeout = Duration::from_secs(config.timeout_secs);
        let mut engines: Vec<Arc<dyn OcrEngine>> = Vec::new();

        for provider in &config.providers {
            match provider {
                OcrProvider::Tesseract => engines.push(Arc::new(TesseractEngine::new(
                    &config.tesseract_cmd,
                    &config.language,
                ))),
                OcrProvider::Remote => match &config.remote_url {
                    Some(url) => match RemoteOcrEngine::new(url, &config.language, timeout) {
                        Ok(engine) => engines.push(Arc::new(engine)),
                        Err(e) => tracing::warn!("Skipping remote OCR provider: {}", e),
                    },
                    None => tracing::warn!("Remote OCR provider configured without OCR_REMOTE_URL"),
                },
                OcrProvider::Static => engines.push(Arc::new(StaticEngine::new(Vec::new()))),
            }
        }

        Self { engines, timeout }
    }

    /// Service over explicit engines
    pub fn with_engines(engines: Vec<Arc<dyn OcrEngine>>, timeout: Duration) -> Self {
        Self { engines, timeout }
    }

    /// Get available providers
    pub async fn available_providers(&self) -> Vec<OcrProvider> {
        let mut available = Vec::new();
        for engine in &self.engines {
            if engine.is_available().await {
                available.push(engine.provider_type());
            }
        }
        available
    }

    /// Run OCR on an image, falling back across engines
    pub async fn recognize(&self, image_data: &[u8]) -> Result<Vec<OcrDetection>, OcrError> {
        let mut last_error = None;

        for engine in &self.engines {
            if !engine.is_available().await {
                continue;
            }
            let attempt = tokio::time::timeout(self.timeout, engine.recognize(image_data)).await;
            match attempt {
                Ok(Ok(detections)) => return Ok(detections),
                Ok(Err(e)) => {
                    tracing::warn!(
                        "OCR provider {:?} failed: {}, trying next",
                        engine.provider_type(),
                        e
                    );
                    last_error = Some(e);
                }
                Err(_) => {
                    tracing::warn!(
                        "OCR provider {:?} timed out, trying next",
                        engine.provider_type()
                    );
                    last_error = Some(OcrError::Timeout(self.timeout.as_secs()));
                }
            }
        }

        Err(last_error.unwrap_or_else(|| {
            OcrError::ProviderNotAvailable("No OCR providers available".to_string())
        }))
    }
}
