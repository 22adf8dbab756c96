#![allow(dead_code)]

use std::io::Cursor;
use std::sync::Arc;
use std::time::Duration;

use ocr_review_server::config::Config;
use ocr_review_server::jobs::{JobId, JobState};
use ocr_review_server::ocr::{OcrDetection, OcrEngine, OcrService, StaticEngine};
use ocr_review_server::results::{BoundingBox, ResultRepository};
use ocr_review_server::state::AppState;
use ocr_review_server::storage::{ImageRef, ImageStore, LocalImageStore};
use tempfile::TempDir;

/// Encoded PNG; distinct shades give distinct content hashes
pub fn png(shade: u8) -> Vec<u8> {
    let img = image::RgbImage::from_pixel(100, 80, image::Rgb([shade, 0, 0]));
    let mut buffer = Vec::new();
    img.write_to(&mut Cursor::new(&mut buffer), image::ImageFormat::Png)
        .unwrap();
    buffer
}

/// Three mutually overlapping detections plus one standalone line
pub fn detections() -> Vec<OcrDetection> {
    vec![
        OcrDetection::new(BoundingBox::new(0, 0, 40, 20), "A", Some(0.9)),
        OcrDetection::new(BoundingBox::new(10, 5, 30, 15), "", Some(0.99)),
        OcrDetection::new(BoundingBox::new(20, 10, 50, 30), "B", Some(0.5)),
        OcrDetection::new(BoundingBox::new(60, 50, 90, 70), "Berlin", Some(0.8)),
    ]
}

pub struct TestApp {
    pub state: AppState,
    pub dir: TempDir,
}

impl TestApp {
    pub async fn new() -> Self {
        Self::with_engine(StaticEngine::new(detections())).await
    }

    pub async fn with_engine(engine: StaticEngine) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.storage.data_dir = dir.path().to_path_buf();

        let images = LocalImageStore::open(config.storage.images_dir()).await.unwrap();
        let results = ResultRepository::open(config.storage.results_dir()).await.unwrap();
        let engines: Vec<Arc<dyn OcrEngine>> = vec![Arc::new(engine)];
        let ocr = OcrService::with_engines(engines, Duration::from_secs(5));

        let state = AppState::with_components(config, Arc::new(images), results, ocr);
        Self { state, dir }
    }

    pub async fn upload(&self, name: &str, shade: u8) -> ImageRef {
        self.state
            .images()
            .put(name, &png(shade))
            .await
            .unwrap()
            .info
            .image_ref
    }

    pub async fn wait_terminal(&self, job_id: JobId) -> JobState {
        for _ in 0..300 {
            let state = self.state.jobs().status_of(job_id).state;
            if state.is_terminal() {
                return state;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("job {} did not finish", job_id);
    }
}
