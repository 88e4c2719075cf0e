//! Completion notification dispatch.
//!
//! This crate provides:
//! - The [`Notifier`] trait invoked once a job's retrieval URL exists
//! - [`MailgunNotifier`], the Mailgun HTTP API implementation
//! - [`NoopNotifier`] for deployments without a configured mail provider

pub mod email;
pub mod error;

// Re-export common types
pub use email::{MailgunConfig, MailgunNotifier, NoopNotifier, Notifier};
pub use error::{NotifyError, NotifyResult};
