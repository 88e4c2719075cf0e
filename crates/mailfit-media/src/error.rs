//! Error types for media operations.

use std::path::PathBuf;
use thiserror::Error;

/// Result type for media operations.
pub type MediaResult<T> = Result<T, MediaError>;

/// Errors that can occur while driving the external encoder.
#[derive(Debug, Error)]
pub enum MediaError {
    #[error("ffmpeg not found in PATH")]
    FfmpegNotFound,

    #[error("ffmpeg failed: {message}")]
    FfmpegFailed {
        message: String,
        stderr: Option<String>,
        exit_code: Option<i32>,
    },

    #[error("input file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("encode timed out after {0} seconds")]
    Timeout(u64),

    #[error("Resource limit exceeded: {0}")]
    ResourceLimit(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl MediaError {
    pub fn ffmpeg_failed(
        message: impl Into<String>,
        stderr: Option<String>,
        exit_code: Option<i32>,
    ) -> Self {
        Self::FfmpegFailed {
            message: message.into(),
            stderr,
            exit_code,
        }
    }
}
