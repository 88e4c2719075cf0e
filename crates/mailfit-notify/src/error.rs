//! Notification error types.

use thiserror::Error;

pub type NotifyResult<T> = Result<T, NotifyError>;

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("Failed to configure notifier: {0}")]
    ConfigError(String),

    #[error("Send failed: {0}")]
    SendFailed(String),
}

impl NotifyError {
    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    pub fn send_failed(msg: impl Into<String>) -> Self {
        Self::SendFailed(msg.into())
    }
}
