//! Background OCR worker
//!
//! Drains the job queue and runs OCR off the request path. At most
//! `concurrency` jobs run at once.

use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::registry::{JobQueue, JobRegistry, QueuedJob};
use crate::ocr::OcrService;
use crate::results::DetectedRegion;
use crate::storage::ImageStore;

/// Handle to a running worker
pub struct WorkerHandle {
    shutdown: CancellationToken,
    task: JoinHandle<()>,
}

impl WorkerHandle {
    /// Stop taking new jobs and wait for the dispatch loop to exit
    pub async fn shutdown(self) {
        self.shutdown.cancel();
        if let Err(e) = self.task.await {
            tracing::error!("OCR worker task failed: {}", e);
        }
    }

    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }
}

#[derive(Clone)]
pub struct OcrWorker {
    registry: JobRegistry,
    images: Arc<dyn ImageStore>,
    ocr: Arc<OcrService>,
    concurrency: usize,
}

impl OcrWorker {
    pub fn new(
        registry: JobRegistry,
        images: Arc<dyn ImageStore>,
        ocr: Arc<OcrService>,
        concurrency: usize,
    ) -> Self {
        Self {
            registry,
            images,
            ocr,
            concurrency: concurrency.max(1),
        }
    }

    /// Spawn the dispatch loop
    pub fn spawn(self, queue: JobQueue) -> WorkerHandle {
        let shutdown = CancellationToken::new();
        let task = tokio::spawn(self.run(queue, shutdown.clone()));
        WorkerHandle { shutdown, task }
    }

    async fn run(self, mut queue: JobQueue, shutdown: CancellationToken) {
        let permits = Arc::new(Semaphore::new(self.concurrency));
        tracing::info!(concurrency = self.concurrency, "OCR worker started");

        loop {
            let job = tokio::select! {
                _ = shutdown.cancelled() => break,
                next = queue.recv() => match next {
                    Some(job) => job,
                    None => break,
                },
            };

            let permit = tokio::select! {
                _ = shutdown.cancelled() => {
                    self.registry.fail(job.job_id, "worker shut down");
                    break;
                }
                permit = permits.clone().acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => break,
                },
            };

            let worker = self.clone();
            tokio::spawn(async move {
                worker.process(job).await;
                drop(permit);
            });
        }

        tracing::info!("OCR worker stopped");
    }

    async fn process(&self, job: QueuedJob) {
        let job_id = job.job_id;
        if !self.registry.start(job_id) {
            tracing::debug!(job_id = %job_id, "Skipping job that is no longer queued");
            return;
        }

        let info = match self.images.info(&job.image_ref).await {
            Ok(Some(info)) => info,
            Ok(None) => {
                self.registry.fail(job_id, &format!("Image not found: {}", job.image_ref));
                return;
            }
            Err(e) => {
                self.registry.fail(job_id, &e.to_string());
                return;
            }
        };

        let bytes = match self.images.fetch_image(&job.image_ref).await {
            Ok(bytes) => bytes,
            Err(e) => {
                self.registry.fail(job_id, &e.to_string());
                return;
            }
        };
        self.registry.report_progress(job_id, 10);

        let recognized = tokio::select! {
            _ = job.cancel.cancelled() => {
                self.registry.fail(job_id, "cancelled");
                return;
            }
            result = self.ocr.recognize(&bytes) => result,
        };
        self.registry.report_progress(job_id, 90);

        let detections = match recognized {
            Ok(detections) => detections,
            Err(e) => {
                self.registry.fail(job_id, &e.to_string());
                return;
            }
        };

        let regions: Vec<DetectedRegion> = detections
            .into_iter()
            .map(DetectedRegion::from)
            .map(|mut region| {
                if let (Some(w), Some(h)) = (info.width, info.height) {
                    region.bbox = region.bbox.clip(w, h);
                }
                region
            })
            .collect();

        self.registry.finish(job_id, regions).await;
    }
}
