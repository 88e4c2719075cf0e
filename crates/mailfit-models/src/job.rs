//! Job records and the job status lifecycle.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

use crate::Provider;

/// Identifier shared by an upload, its queue message and its job record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UploadId(pub String);

impl UploadId {
    /// Generate a new random upload ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Create from an existing string.
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for UploadId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for UploadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Job lifecycle state.
///
/// `queued -> processing -> {done, error}`. The two terminal states are
/// never left; `processing` repeats on every persisted progress tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    /// Waiting in the queue
    #[default]
    Queued,
    /// Picked up by a worker
    Processing,
    /// Compressed artifact stored and retrievable
    Done,
    /// Failed; `error` on the record says why
    Error,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Queued => "queued",
            JobStatus::Processing => "processing",
            JobStatus::Done => "done",
            JobStatus::Error => "error",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Done | JobStatus::Error)
    }
}

impl FromStr for JobStatus {
    type Err = ParseStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "queued" => Ok(JobStatus::Queued),
            "processing" => Ok(JobStatus::Processing),
            "done" => Ok(JobStatus::Done),
            "error" => Ok(JobStatus::Error),
            other => Err(ParseStatusError(other.to_string())),
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A stored status string that is not part of the lifecycle.
#[derive(Debug, Error)]
#[error("unknown job status: {0}")]
pub struct ParseStatusError(pub String);

/// One row of the `jobs` table, as the worker sees it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobRecord {
    /// Primary key
    pub id: String,

    /// Upload identifier (unique; ties the record to object keys and queue messages)
    pub upload_id: UploadId,

    /// Owner email for the completion notification
    pub email: String,

    /// Destination provider class
    pub provider: Provider,

    /// Paid priority flag
    #[serde(default)]
    pub priority: bool,

    /// Transcript add-on flag
    #[serde(default)]
    pub transcript: bool,

    /// Source object size in bytes
    pub size_bytes: i64,

    /// Source duration in seconds
    pub duration_sec: f64,

    /// Amount charged, in cents
    #[serde(default)]
    pub price_cents: i32,

    /// Lifecycle state
    #[serde(default)]
    pub status: JobStatus,

    /// Completion percentage, 0-100
    #[serde(default)]
    pub progress: f64,

    /// Failure reason (set when `status` is `error`)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Source object key
    pub input_path: String,

    /// Result object key (set when `status` is `done`)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_path: Option<String>,

    /// Presigned retrieval URL (set when `status` is `done`)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_url: Option<String>,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Last update timestamp
    pub updated_at: DateTime<Utc>,

    /// Completion timestamp
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,

    /// Original filename, used for the download disposition
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,

    /// Discount token applied at checkout, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_used: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_round_trip() {
        for status in [
            JobStatus::Queued,
            JobStatus::Processing,
            JobStatus::Done,
            JobStatus::Error,
        ] {
            let parsed: JobStatus = status.as_str().parse().unwrap();
            assert_eq!(parsed, status);
        }
    }

    #[test]
    fn test_unknown_status_is_rejected() {
        let err = "cancelled".parse::<JobStatus>().unwrap_err();
        assert!(err.to_string().contains("cancelled"));
    }

    #[test]
    fn test_terminal_states() {
        assert!(!JobStatus::Queued.is_terminal());
        assert!(!JobStatus::Processing.is_terminal());
        assert!(JobStatus::Done.is_terminal());
        assert!(JobStatus::Error.is_terminal());
    }

    #[test]
    fn test_status_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&JobStatus::Processing).unwrap(),
            "\"processing\""
        );
    }

    #[test]
    fn test_upload_id_display_matches_inner() {
        let id = UploadId::from_string("abc-123");
        assert_eq!(id.to_string(), "abc-123");
        assert_eq!(id.as_str(), "abc-123");
    }
}
