//! Application state management

use std::sync::Arc;

use parking_lot::Mutex;

use crate::config::Config;
use crate::jobs::{JobRegistry, OcrWorker, WorkerHandle};
use crate::ocr::OcrService;
use crate::results::{ResultRepository, StoreError};
use crate::storage::{ImageStore, LocalImageStore, StorageError};

/// Error type for state initialization
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("Failed to open image store: {0}")]
    Images(#[from] StorageError),

    #[error("Failed to open result store: {0}")]
    Results(#[from] StoreError),
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: Config,
    images: Arc<dyn ImageStore>,
    results: ResultRepository,
    jobs: JobRegistry,
    ocr: Arc<OcrService>,
    worker: Mutex<Option<WorkerHandle>>,
}

impl AppState {
    /// Open the on-disk stores under `data_dir` and start the OCR worker
    pub async fn from_config(config: Config) -> Result<Self, StateError> {
        let images = LocalImageStore::open(config.storage.images_dir()).await?;
        let results = ResultRepository::open(config.storage.results_dir()).await?;
        let ocr = OcrService::from_config(&config.ocr);

        let available = ocr.available_providers().await;
        if available.is_empty() {
            tracing::warn!("No OCR provider is available; jobs will fail until one is");
        } else {
            tracing::info!("Available OCR providers: {:?}", available);
        }

        Ok(Self::with_components(config, Arc::new(images), results, ocr))
    }

    /// Assemble state from explicit components
    ///
    /// Spawns the worker, so it must be called inside a tokio runtime.
    pub fn with_components(
        config: Config,
        images: Arc<dyn ImageStore>,
        results: ResultRepository,
        ocr: OcrService,
    ) -> Self {
        let ocr = Arc::new(ocr);
        let (jobs, queue) = JobRegistry::new(results.clone(), images.clone());
        let worker = OcrWorker::new(
            jobs.clone(),
            images.clone(),
            ocr.clone(),
            config.worker.concurrency,
        )
        .spawn(queue);

        Self {
            inner: Arc::new(AppStateInner {
                config,
                images,
                results,
                jobs,
                ocr,
                worker: Mutex::new(Some(worker)),
            }),
        }
    }

    /// Get the configuration
    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    /// Get the image store
    pub fn images(&self) -> &Arc<dyn ImageStore> {
        &self.inner.images
    }

    /// Get the result repository
    pub fn results(&self) -> &ResultRepository {
        &self.inner.results
    }

    /// Get the job registry
    pub fn jobs(&self) -> &JobRegistry {
        &self.inner.jobs
    }

    pub fn ocr(&self) -> &Arc<OcrService> {
        &self.inner.ocr
    }

    /// Stop the OCR worker; safe to call more than once
    pub async fn shutdown(&self) {
        tracing::info!("Shutting down application state...");
        let handle = self.inner.worker.lock().take();
        if let Some(handle) = handle {
            handle.shutdown().await;
        }
    }
}
