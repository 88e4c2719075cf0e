//! S3 object store client for upload and output artifacts.
//!
//! This crate provides:
//! - Streaming download of source uploads into worker scratch space
//! - Result upload and presigned forced-download URLs
//! - The deterministic key conventions shared with the upload API

pub mod client;
pub mod error;
pub mod keys;

// Re-export common types
pub use client::{ObjectStore, S3Config, S3Store};
pub use error::{StorageError, StorageResult};
pub use keys::{attachment_disposition, output_key, source_key};
