#![deny(unreachable_patterns)]
//! FFmpeg invocation and supervision for size-constrained compression.
//!
//! This crate provides:
//! - Parsing of ffmpeg's machine-readable progress stream
//! - The fixed H.264/AAC compression profile
//! - Child process supervision with kernel resource limits
//! - The [`Transcoder`] seam the worker pipeline is written against

pub mod encode;
pub mod error;
pub mod progress;

// Re-export common types
pub use encode::{check_ffmpeg, EncodeLimits, Encoder, ProgressFn, Transcoder};
pub use error::{MediaError, MediaResult};
pub use progress::progress_percent;
