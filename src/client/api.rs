//! Transport seam between the review client and the server

use async_trait::async_trait;

use crate::jobs::{JobId, JobStatus};
use crate::results::{DetectedRegion, RegionStatus};
use crate::storage::ImageRef;

/// Client-side errors
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ClientError {
    /// The addressed region or image does not exist (anymore)
    #[error("Not found: {0}")]
    NotFound(String),

    /// The server or the network failed; nothing is assumed committed
    #[error("Transport failure: {0}")]
    Transport(String),

    #[error("Polling cancelled")]
    Cancelled,

    #[error("No image is open")]
    NoActiveImage,
}

impl From<reqwest::Error> for ClientError {
    fn from(e: reqwest::Error) -> Self {
        ClientError::Transport(e.to_string())
    }
}

/// Operations the review client needs from the server
#[async_trait]
pub trait ReviewApi: Send + Sync {
    async fn submit(&self, image_ref: &ImageRef) -> Result<JobId, ClientError>;

    async fn submit_batch(&self, image_refs: &[ImageRef]) -> Result<Vec<JobId>, ClientError>;

    /// Never `NotFound`: foreign ids come back as `unknown`
    async fn status(&self, job_id: JobId) -> Result<JobStatus, ClientError>;

    async fn cancel(&self, job_id: JobId) -> Result<bool, ClientError>;

    async fn list_results(&self, image_ref: &ImageRef) -> Result<Vec<DetectedRegion>, ClientError>;

    async fn rename(
        &self,
        image_ref: &ImageRef,
        index: usize,
        text: &str,
    ) -> Result<DetectedRegion, ClientError>;

    async fn set_status(
        &self,
        image_ref: &ImageRef,
        index: usize,
        status: RegionStatus,
    ) -> Result<DetectedRegion, ClientError>;

    async fn clean(&self, image_ref: &ImageRef) -> Result<Vec<DetectedRegion>, ClientError>;
}
