//! Job store error types.

use thiserror::Error;

/// Result type for job store operations.
pub type JobStoreResult<T> = Result<T, JobStoreError>;

/// Errors that can occur talking to the job record store.
#[derive(Debug, Error)]
pub enum JobStoreError {
    #[error("Failed to configure job store: {0}")]
    ConfigError(String),

    #[error("Invalid job record: {0}")]
    InvalidRecord(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

impl JobStoreError {
    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    pub fn invalid_record(msg: impl Into<String>) -> Self {
        Self::InvalidRecord(msg.into())
    }
}
