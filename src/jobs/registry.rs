//! Job Registry
//!
//! Tracks OCR jobs with:
//! - In-memory job table behind a lock, never held across an await
//! - A queue feeding the background worker
//! - Result population on success, committed before `done` is visible
//! - Best-effort cancellation and retention cleanup

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use parking_lot::RwLock;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use super::types::{Job, JobError, JobId, JobState, JobStatus};
use crate::results::{DetectedRegion, ResultRepository};
use crate::storage::{ImageRef, ImageStore};

/// Job handed to the worker
#[derive(Debug, Clone)]
pub struct QueuedJob {
    pub job_id: JobId,
    pub image_ref: ImageRef,
    pub cancel: CancellationToken,
}

/// Receiving end of the job queue
pub struct JobQueue {
    rx: mpsc::UnboundedReceiver<QueuedJob>,
}

impl JobQueue {
    pub async fn recv(&mut self) -> Option<QueuedJob> {
        self.rx.recv().await
    }
}

struct JobEntry {
    job: Job,
    cancel: CancellationToken,
}

/// Registry of OCR jobs
#[derive(Clone)]
pub struct JobRegistry {
    inner: Arc<JobRegistryInner>,
}

struct JobRegistryInner {
    jobs: RwLock<HashMap<JobId, JobEntry>>,
    queue: mpsc::UnboundedSender<QueuedJob>,
    results: ResultRepository,
    images: Arc<dyn ImageStore>,
}

impl JobRegistry {
    /// Create a registry and the queue its worker consumes
    pub fn new(results: ResultRepository, images: Arc<dyn ImageStore>) -> (Self, JobQueue) {
        let (tx, rx) = mpsc::unbounded_channel();
        let registry = Self {
            inner: Arc::new(JobRegistryInner {
                jobs: RwLock::new(HashMap::new()),
                queue: tx,
                results,
                images,
            }),
        };
        (registry, JobQueue { rx })
    }

    // ========================================================================
    // Submission
    // ========================================================================

    /// Create a queued job for an image
    pub async fn submit(&self, image_ref: &ImageRef) -> Result<JobId, JobError> {
        if self.inner.images.info(image_ref).await?.is_none() {
            return Err(JobError::ImageNotFound(image_ref.clone()));
        }

        let job = Job::new(image_ref.clone());
        let job_id = job.id;
        let cancel = CancellationToken::new();

        self.inner.jobs.write().insert(
            job_id,
            JobEntry {
                job,
                cancel: cancel.clone(),
            },
        );

        let queued = QueuedJob {
            job_id,
            image_ref: image_ref.clone(),
            cancel,
        };
        if self.inner.queue.send(queued).is_err() {
            self.inner.jobs.write().remove(&job_id);
            return Err(JobError::QueueClosed);
        }

        tracing::info!(job_id = %job_id, image_ref = %image_ref, "Queued OCR job");
        Ok(job_id)
    }

    /// Create one job per resolvable image; unknown images are skipped
    pub async fn submit_batch(&self, image_refs: &[ImageRef]) -> Result<Vec<JobId>, JobError> {
        let mut job_ids = Vec::with_capacity(image_refs.len());
        for image_ref in image_refs {
            match self.submit(image_ref).await {
                Ok(id) => job_ids.push(id),
                Err(JobError::ImageNotFound(r)) => {
                    tracing::warn!(image_ref = %r, "Skipping unknown image in batch");
                }
                Err(e) => return Err(e),
            }
        }
        Ok(job_ids)
    }

    // ========================================================================
    // Queries
    // ========================================================================

    /// Status for a raw job id; never fails
    pub fn status(&self, job_id: &str) -> JobStatus {
        match Uuid::parse_str(job_id) {
            Ok(id) => self.status_of(id),
            Err(_) => JobStatus::unknown(job_id),
        }
    }

    pub fn status_of(&self, job_id: JobId) -> JobStatus {
        self.inner
            .jobs
            .read()
            .get(&job_id)
            .map(|entry| JobStatus::from(&entry.job))
            .unwrap_or_else(|| JobStatus::unknown(job_id.to_string()))
    }

    pub fn get(&self, job_id: JobId) -> Option<Job> {
        self.inner.jobs.read().get(&job_id).map(|e| e.job.clone())
    }

    pub fn job_count(&self) -> usize {
        self.inner.jobs.read().len()
    }

    // ========================================================================
    // Transitions
    // ========================================================================

    /// queued -> running; false when the job is gone or no longer queued
    pub fn start(&self, job_id: JobId) -> bool {
        let mut jobs = self.inner.jobs.write();
        match jobs.get_mut(&job_id) {
            Some(entry) if entry.job.state == JobState::Queued => {
                entry.job.state = JobState::Running;
                entry.job.updated_at = Utc::now();
                tracing::debug!(job_id = %job_id, "OCR job running");
                true
            }
            _ => false,
        }
    }

    /// Raise the progress of a running job; never lowers it
    pub fn report_progress(&self, job_id: JobId, progress: u8) {
        let mut jobs = self.inner.jobs.write();
        if let Some(entry) = jobs.get_mut(&job_id) {
            if entry.job.state == JobState::Running {
                entry.job.progress = entry.job.progress.max(progress.min(100));
                entry.job.updated_at = Utc::now();
            }
        }
    }

    /// Commit results for a running job, then mark it done
    ///
    /// The regions are in the result store (and written through to disk) before any reader
    /// can observe `done`.
    pub async fn finish(&self, job_id: JobId, regions: Vec<DetectedRegion>) {
        let (image_ref, cancel) = {
            let jobs = self.inner.jobs.read();
            match jobs.get(&job_id) {
                Some(entry) if entry.job.state == JobState::Running => {
                    (entry.job.image_ref.clone(), entry.cancel.clone())
                }
                _ => return,
            }
        };

        if cancel.is_cancelled() {
            self.fail(job_id, "cancelled");
            return;
        }

        let count = regions.len();
        self.inner.results.commit(&image_ref, regions).await;

        let mut jobs = self.inner.jobs.write();
        if let Some(entry) = jobs.get_mut(&job_id) {
            if entry.job.state == JobState::Running {
                entry.job.state = JobState::Done;
                entry.job.progress = 100;
                entry.job.updated_at = Utc::now();
            }
        }

        tracing::info!(job_id = %job_id, image_ref = %image_ref, regions = count, "OCR job done");
    }

    /// Move a non-terminal job to `error`
    pub fn fail(&self, job_id: JobId, reason: &str) {
        let mut jobs = self.inner.jobs.write();
        if let Some(entry) = jobs.get_mut(&job_id) {
            if !entry.job.state.is_terminal() {
                entry.job.state = JobState::Error;
                entry.job.error = Some(reason.to_string());
                entry.job.updated_at = Utc::now();
                tracing::warn!(job_id = %job_id, reason = %reason, "OCR job failed");
            }
        }
    }

    /// Request cancellation of a queued or running job
    ///
    /// A queued job fails immediately; a running job fails once the worker
    /// notices. Returns false for terminal or unknown jobs.
    pub fn cancel(&self, job_id: JobId) -> bool {
        let mut jobs = self.inner.jobs.write();
        let Some(entry) = jobs.get_mut(&job_id) else {
            return false;
        };

        match entry.job.state {
            JobState::Queued => {
                entry.cancel.cancel();
                entry.job.state = JobState::Error;
                entry.job.error = Some("cancelled".to_string());
                entry.job.updated_at = Utc::now();
            }
            JobState::Running => entry.cancel.cancel(),
            _ => return false,
        }

        tracing::info!(job_id = %job_id, "OCR job cancellation requested");
        true
    }

    // ========================================================================
    // Cleanup
    // ========================================================================

    /// Drop terminal jobs last updated before `now - older_than`
    pub fn purge_finished(&self, older_than: chrono::Duration) -> usize {
        let cutoff = Utc::now() - older_than;
        let mut jobs = self.inner.jobs.write();
        let before = jobs.len();
        jobs.retain(|_, entry| !(entry.job.state.is_terminal() && entry.job.updated_at < cutoff));
        let count = before - jobs.len();

        if count > 0 {
            tracing::info!(count = count, "Purged finished OCR jobs");
        }
        count
    }

    /// Start background retention task
    pub fn start_cleanup_task(self, retention_hours: i64) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(std::time::Duration::from_secs(300)); // 5 minutes

            loop {
                interval.tick().await;
                self.purge_finished(chrono::Duration::hours(retention_hours));
            }
        })
    }
}
