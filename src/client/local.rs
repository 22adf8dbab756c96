//! In-process transport
//!
//! Drives the server components directly, without HTTP. Used by embedders
//! and by the integration tests.

use async_trait::async_trait;

use super::api::{ClientError, ReviewApi};
use crate::jobs::{JobError, JobId, JobStatus};
use crate::results::{DetectedRegion, RegionStatus, StoreError};
use crate::state::AppState;
use crate::storage::ImageRef;

#[derive(Clone)]
pub struct LocalApi {
    state: AppState,
}

impl LocalApi {
    pub fn new(state: AppState) -> Self {
        Self { state }
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }
}

impl From<StoreError> for ClientError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::IndexOutOfRange { .. } => ClientError::NotFound(e.to_string()),
            other => ClientError::Transport(other.to_string()),
        }
    }
}

impl From<JobError> for ClientError {
    fn from(e: JobError) -> Self {
        match e {
            JobError::ImageNotFound(_) => ClientError::NotFound(e.to_string()),
            other => ClientError::Transport(other.to_string()),
        }
    }
}

#[async_trait]
impl ReviewApi for LocalApi {
    async fn submit(&self, image_ref: &ImageRef) -> Result<JobId, ClientError> {
        Ok(self.state.jobs().submit(image_ref).await?)
    }

    async fn submit_batch(&self, image_refs: &[ImageRef]) -> Result<Vec<JobId>, ClientError> {
        Ok(self.state.jobs().submit_batch(image_refs).await?)
    }

    async fn status(&self, job_id: JobId) -> Result<JobStatus, ClientError> {
        Ok(self.state.jobs().status_of(job_id))
    }

    async fn cancel(&self, job_id: JobId) -> Result<bool, ClientError> {
        Ok(self.state.jobs().cancel(job_id))
    }

    async fn list_results(&self, image_ref: &ImageRef) -> Result<Vec<DetectedRegion>, ClientError> {
        Ok(self.state.results().list(image_ref))
    }

    async fn rename(
        &self,
        image_ref: &ImageRef,
        index: usize,
        text: &str,
    ) -> Result<DetectedRegion, ClientError> {
        Ok(self.state.results().rename(image_ref, index, text).await?)
    }

    async fn set_status(
        &self,
        image_ref: &ImageRef,
        index: usize,
        status: RegionStatus,
    ) -> Result<DetectedRegion, ClientError> {
        Ok(self.state.results().set_status(image_ref, index, status).await?)
    }

    async fn clean(&self, image_ref: &ImageRef) -> Result<Vec<DetectedRegion>, ClientError> {
        Ok(self.state.results().clean(image_ref).await?)
    }
}
