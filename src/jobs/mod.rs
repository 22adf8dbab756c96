//! OCR jobs
//!
//! `JobRegistry` owns job state and the queue; `OcrWorker` drains the queue
//! in the background. Results are written into the `ResultRepository`
//! before a job reports `done`.

mod registry;
mod types;
mod worker;

pub use registry::{JobQueue, JobRegistry, QueuedJob};
pub use types::{Job, JobError, JobId, JobState, JobStatus};
pub use worker::{OcrWorker, WorkerHandle};
