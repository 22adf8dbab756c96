//! OCR Engines
//!
//! Defines the engine trait and implementations for different OCR backends.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

use super::types::{OcrDetection, OcrError, OcrProvider};
use crate::results::confidence;
use crate::results::BoundingBox;

/// OCR engine trait
///
/// `recognize` is called exactly once per job with the raw image bytes.
#[async_trait]
pub trait OcrEngine: Send + Sync {
    /// Get the provider type
    fn provider_type(&self) -> OcrProvider;

    /// Check if the engine can currently be used
    async fn is_available(&self) -> bool;

    /// Detect text regions in an image
    async fn recognize(&self, image_data: &[u8]) -> Result<Vec<OcrDetection>, OcrError>;
}

// ============================================================================
// Tesseract
// ============================================================================

/// Tesseract CLI engine
///
/// Runs `tesseract <input> stdout -l <lang> tsv` and merges word boxes into
/// line regions.
pub struct TesseractEngine {
    command: String,
    language: String,
}

impl TesseractEngine {
    pub fn new(command: &str, language: &str) -> Self {
        Self {
            command: command.to_string(),
            language: language.to_string(),
        }
    }
}

#[async_trait]
impl OcrEngine for TesseractEngine {
    fn provider_type(&self) -> OcrProvider {
        OcrProvider::Tesseract
    }

    async fn is_available(&self) -> bool {
        tokio::process::Command::new(&self.command)
            .arg("--version")
            .output()
            .await
            .map(|o| o.status.success())
            .unwrap_or(false)
    }

    async fn recognize(&self, image_data: &[u8]) -> Result<Vec<OcrDetection>, OcrError> {
        let input_path = std::env::temp_dir().join(format!("ocr_input_{}", uuid::Uuid::new_v4()));

        tokio::fs::write(&input_path, image_data)
            .await
            .map_err(|e| OcrError::ProcessingError(format!("Failed to write temp file: {}", e)))?;

        let output = tokio::process::Command::new(&self.command)
            .arg(&input_path)
            .arg("stdout")
            .arg("-l")
            .arg(&self.language)
            .arg("--psm")
            .arg("3")
            .arg("tsv")
            .output()
            .await;

        let _ = tokio::fs::remove_file(&input_path).await;

        let output = output
            .map_err(|e| OcrError::ProcessingError(format!("Failed to run tesseract: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(OcrError::ProcessingError(format!(
                "Tesseract failed: {}",
                stderr.trim()
            )));
        }

        Ok(parse_tsv(&String::from_utf8_lossy(&output.stdout)))
    }
}

/// Merge Tesseract TSV word rows into one detection per text line
pub fn parse_tsv(tsv: &str) -> Vec<OcrDetection> {
    #[derive(Default)]
    struct Line {
        words: Vec<String>,
        bbox: Option<BoundingBox>,
        confidences: Vec<f64>,
    }

    let mut lines: BTreeMap<(u32, u32, u32, u32), Line> = BTreeMap::new();

    for row in tsv.lines().skip(1) {
        let cols: Vec<&str> = row.split('\t').collect();
        if cols.len() < 12 || cols[0] != "5" {
            continue;
        }
        let text = cols[11].trim();
        if text.is_empty() {
            continue;
        }
        let nums: Option<Vec<i64>> = cols[6..10].iter().map(|c| c.trim().parse().ok()).collect();
        let Some(nums) = nums else {
            continue;
        };
        let key: Option<Vec<u32>> = cols[1..5].iter().map(|c| c.trim().parse().ok()).collect();
        let Some(key) = key else {
            continue;
        };

        let word_box = BoundingBox::new(nums[0], nums[1], nums[0] + nums[2], nums[1] + nums[3]);
        let line = lines.entry((key[0], key[1], key[2], key[3])).or_default();
        line.words.push(text.to_string());
        line.bbox = Some(match line.bbox {
            Some(b) => BoundingBox::new(
                b.x1().min(word_box.x1()),
                b.y1().min(word_box.y1()),
                b.x2().max(word_box.x2()),
                b.y2().max(word_box.y2()),
            ),
            None => word_box,
        });
        if let Some(conf) = cols[10].trim().parse::<f64>().ok().and_then(confidence::normalize) {
            line.confidences.push(conf);
        }
    }

    lines
        .into_values()
        .filter_map(|line| {
            let bbox = line.bbox?;
            let conf = if line.confidences.is_empty() {
                None
            } else {
                Some(line.confidences.iter().sum::<f64>() / line.confidences.len() as f64)
            };
            Some(OcrDetection::new(bbox, line.words.join(" "), conf))
        })
        .collect()
}

// ============================================================================
// Remote HTTP service
// ============================================================================

/// OCR over HTTP
///
/// POSTs `{"image": <base64>, "language": ...}` to `<base_url>/ocr` and
/// expects `{"items": [{"bbox": ..., "text": ..., "confidence": ...}]}`.
/// Boxes may be `{x1,y1,x2,y2}`, `[x1,y1,x2,y2]` or a four-point quad;
/// confidence may be a fraction, a percentage or a `"87%"` string.
pub struct RemoteOcrEngine {
    base_url: String,
    language: String,
    client: reqwest::Client,
}

impl RemoteOcrEngine {
    pub fn new(base_url: &str, language: &str, timeout: Duration) -> Result<Self, OcrError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| OcrError::ProviderNotAvailable(format!("HTTP client: {}", e)))?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            language: language.to_string(),
            client,
        })
    }
}

#[derive(Deserialize)]
struct RemoteResponse {
    #[serde(default)]
    items: Vec<RemoteItem>,
}

#[derive(Deserialize)]
struct RemoteItem {
    bbox: RemoteBox,
    #[serde(default, alias = "name")]
    text: Option<String>,
    #[serde(default)]
    confidence: Value,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RemoteBox {
    Corners { x1: f64, y1: f64, x2: f64, y2: f64 },
    Quad(Vec<[f64; 2]>),
    Flat([f64; 4]),
}

impl RemoteBox {
    fn to_bbox(&self) -> Option<BoundingBox> {
        match self {
            Self::Corners { x1, y1, x2, y2 } | Self::Flat([x1, y1, x2, y2]) => Some(BoundingBox::new(
                x1.round() as i64,
                y1.round() as i64,
                x2.round() as i64,
                y2.round() as i64,
            )),
            Self::Quad(points) => BoundingBox::from_points(points.iter().map(|[x, y]| (*x, *y))),
        }
    }
}

fn convert_remote(response: RemoteResponse) -> Vec<OcrDetection> {
    response
        .items
        .into_iter()
        .filter_map(|item| {
            let bbox = item.bbox.to_bbox()?;
            Some(OcrDetection::new(
                bbox,
                item.text.unwrap_or_default(),
                confidence::parse_value(&item.confidence),
            ))
        })
        .collect()
}

#[async_trait]
impl OcrEngine for RemoteOcrEngine {
    fn provider_type(&self) -> OcrProvider {
        OcrProvider::Remote
    }

    async fn is_available(&self) -> bool {
        let url = format!("{}/health", self.base_url);
        match self.client.get(&url).send().await {
            Ok(response) => response.status().is_success(),
            Err(_) => false,
        }
    }

    async fn recognize(&self, image_data: &[u8]) -> Result<Vec<OcrDetection>, OcrError> {
        use base64::Engine;

        let url = format!("{}/ocr", self.base_url);
        let request = serde_json::json!({
            "image": base64::engine::general_purpose::STANDARD.encode(image_data),
            "language": self.language,
        });

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| OcrError::ApiError(format!("Failed to call OCR service: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(OcrError::ApiError(format!(
                "OCR service returned {}: {}",
                status, body
            )));
        }

        let parsed: RemoteResponse = response
            .json()
            .await
            .map_err(|e| OcrError::ApiError(format!("Failed to parse response: {}", e)))?;

        Ok(convert_remote(parsed))
    }
}

// ============================================================================
// Static
// ============================================================================

/// Engine returning a fixed set of detections
pub struct StaticEngine {
    detections: Vec<OcrDetection>,
    delay: Duration,
    failure: Option<String>,
}

impl StaticEngine {
    pub fn new(detections: Vec<OcrDetection>) -> Self {
        Self {
            detections,
            delay: Duration::ZERO,
            failure: None,
        }
    }

    /// Engine whose every call fails with `message`
    pub fn failing(message: &str) -> Self {
        Self {
            detections: Vec::new(),
            delay: Duration::ZERO,
            failure: Some(message.to_string()),
        }
    }

    /// Sleep this long before answering
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

#[async_trait]
impl OcrEngine for StaticEngine {
    fn provider_type(&self) -> OcrProvider {
        OcrProvider::Static
    }

    async fn is_available(&self) -> bool {
        true
    }

    async fn recognize(&self, _image_data: &[u8]) -> Result<Vec<OcrDetection>, OcrError> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        match &self.failure {
            Some(message) => Err(OcrError::ProcessingError(message.clone())),
            None => Ok(self.detections.clone()),
        }
    }
}
