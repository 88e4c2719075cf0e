//! Worker error types.

use thiserror::Error;

pub type WorkerResult<T> = Result<T, WorkerError>;

/// Errors that fail a job.
///
/// The `Display` text of these ends up verbatim in the job record's
/// `error` column, so every variant reads as a sentence a user could be
/// shown.
#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("Job failed: {0}")]
    JobFailed(String),

    #[error("Storage error: {0}")]
    Storage(#[from] mailfit_storage::StorageError),

    #[error("Job store error: {0}")]
    JobStore(#[from] mailfit_jobstore::JobStoreError),

    #[error("Encode error: {0}")]
    Media(#[from] mailfit_media::MediaError),

    #[error("Queue error: {0}")]
    Queue(#[from] mailfit_queue::QueueError),

    #[error("Notification error: {0}")]
    Notify(#[from] mailfit_notify::NotifyError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl WorkerError {
    pub fn job_failed(msg: impl Into<String>) -> Self {
        Self::JobFailed(msg.into())
    }
}
