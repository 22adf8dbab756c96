//! Job types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::storage::{ImageRef, StorageError};

/// Opaque job identifier
pub type JobId = Uuid;

/// Lifecycle state of an OCR job
///
/// `Queued` and `Running` are transient; the rest are terminal. `Unknown` is
/// reported for ids the registry cannot account for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    Queued,
    Running,
    Done,
    Error,
    Unknown,
}

impl JobState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Error | Self::Unknown)
    }
}

/// One OCR execution request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub image_ref: ImageRef,
    pub state: JobState,
    /// Advisory percentage, never used to gate anything
    pub progress: u8,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Job {
    pub fn new(image_ref: ImageRef) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            image_ref,
            state: JobState::Queued,
            progress: 0,
            error: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Externally visible job status
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobStatus {
    pub job_id: String,
    pub state: JobState,
    /// Image the job runs on; absent for unknown jobs
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_ref: Option<ImageRef>,
    pub progress: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl JobStatus {
    pub fn unknown(job_id: impl Into<String>) -> Self {
        Self {
            job_id: job_id.into(),
            state: JobState::Unknown,
            image_ref: None,
            progress: 0,
            error: None,
        }
    }
}

impl From<&Job> for JobStatus {
    fn from(job: &Job) -> Self {
        Self {
            job_id: job.id.to_string(),
            state: job.state,
            image_ref: Some(job.image_ref.clone()),
            progress: job.progress,
            error: job.error.clone(),
        }
    }
}

/// Job errors
#[derive(Debug, thiserror::Error)]
pub enum JobError {
    #[error("Image not found: {0}")]
    ImageNotFound(ImageRef),

    #[error("Job queue is closed")]
    QueueClosed,

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}
