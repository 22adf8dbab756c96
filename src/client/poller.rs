//! Job polling
//!
//! Every job is tracked by a small state machine (`JobPoll`). The loop sleeps
//! for a fixed interval between rounds and stops early when its
//! cancellation token fires. Jobs may finish in any order.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use super::api::{ClientError, ReviewApi};
use crate::config::ClientConfig;
use crate::jobs::{JobId, JobState, JobStatus};
use crate::results::DetectedRegion;
use crate::storage::ImageRef;

/// Polling state of one job
#[derive(Debug, Clone, PartialEq)]
pub enum JobPoll {
    /// Not terminal yet; `last` is the most recent status seen
    Waiting {
        job_id: JobId,
        polls: u32,
        last: Option<JobStatus>,
    },
    Finished(JobStatus),
}

impl JobPoll {
    pub fn new(job_id: JobId) -> Self {
        JobPoll::Waiting {
            job_id,
            polls: 0,
            last: None,
        }
    }

    /// Advance with a freshly observed status
    pub fn observe(self, status: JobStatus) -> Self {
        match self {
            JobPoll::Waiting { job_id, polls, .. } => {
                if status.state.is_terminal() {
                    JobPoll::Finished(status)
                } else {
                    JobPoll::Waiting {
                        job_id,
                        polls: polls.saturating_add(1),
                        last: Some(status),
                    }
                }
            }
            finished @ JobPoll::Finished(_) => finished,
        }
    }

    pub fn is_finished(&self) -> bool {
        matches!(self, JobPoll::Finished(_))
    }
}

/// Final result of one polled job
#[derive(Debug, Clone, PartialEq)]
pub struct JobOutcome {
    pub job_id: JobId,
    pub status: JobStatus,
    /// Results re-fetched after `done`
    pub results: Option<Vec<DetectedRegion>>,
}

impl JobOutcome {
    pub fn state(&self) -> JobState {
        self.status.state
    }

    pub fn image_ref(&self) -> Option<&ImageRef> {
        self.status.image_ref.as_ref()
    }
}

/// Submits OCR jobs and waits for them to settle
pub struct PollingClient {
    api: Arc<dyn ReviewApi>,
    interval: Duration,
    cancel: CancellationToken,
}

impl PollingClient {
    pub fn new(api: Arc<dyn ReviewApi>, interval: Duration) -> Self {
        Self {
            api,
            interval,
            cancel: CancellationToken::new(),
        }
    }

    /// Poll at the configured `CLIENT_POLL_INTERVAL_MS`
    pub fn from_config(api: Arc<dyn ReviewApi>, config: &ClientConfig) -> Self {
        Self::new(api, config.poll_interval())
    }

    /// Use an externally owned cancellation token
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Submit one image and wait until its job is terminal
    pub async fn run(&self, image_ref: &ImageRef) -> Result<JobOutcome, ClientError> {
        let job_id = self.api.submit(image_ref).await?;
        let mut outcomes = self.wait_all(&[job_id]).await?;
        outcomes
            .pop()
            .ok_or_else(|| ClientError::Transport(format!("job {} produced no outcome", job_id)))
    }

    /// Submit a batch and wait for every created job
    pub async fn run_batch(&self, image_refs: &[ImageRef]) -> Result<Vec<JobOutcome>, ClientError> {
        let job_ids = self.api.submit_batch(image_refs).await?;
        tracing::debug!(submitted = image_refs.len(), created = job_ids.len(), "Polling batch");
        self.wait_all(&job_ids).await
    }

    /// Poll until every job is terminal; outcomes are in completion order
    pub async fn wait_all(&self, job_ids: &[JobId]) -> Result<Vec<JobOutcome>, ClientError> {
        let mut pending: BTreeMap<JobId, JobPoll> =
            job_ids.iter().map(|&id| (id, JobPoll::new(id))).collect();
        let mut outcomes = Vec::with_capacity(pending.len());

        while !pending.is_empty() {
            tokio::select! {
                _ = self.cancel.cancelled() => return Err(ClientError::Cancelled),
                _ = tokio::time::sleep(self.interval) => {}
            }

            let ids: Vec<JobId> = pending.keys().copied().collect();
            for job_id in ids {
                let status = self.api.status(job_id).await?;
                let Some(poll) = pending.remove(&job_id) else {
                    continue;
                };

                match poll.observe(status) {
                    JobPoll::Finished(status) => {
                        tracing::debug!(job_id = %job_id, state = ?status.state, "Job settled");
                        outcomes.push(self.settle(job_id, status).await?);
                    }
                    waiting => {
                        pending.insert(job_id, waiting);
                    }
                }
            }
        }

        Ok(outcomes)
    }

    async fn settle(&self, job_id: JobId, status: JobStatus) -> Result<JobOutcome, ClientError> {
        let results = match (&status.state, &status.image_ref) {
            (JobState::Done, Some(image_ref)) => Some(self.api.list_results(image_ref).await?),
            _ => None,
        };
        Ok(JobOutcome {
            job_id,
            status,
            results,
        })
    }
}
