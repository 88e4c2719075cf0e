//! Redis list queue for compression jobs.
//!
//! This crate provides:
//! - The [`CompressMessage`] payload producers push and workers pop
//! - The [`JobSource`] trait the worker loop consumes from
//! - [`RedisJobQueue`], its blocking-pop Redis implementation

pub mod error;
pub mod message;
pub mod queue;

// Re-export common types
pub use error::{QueueError, QueueResult};
pub use message::CompressMessage;
pub use queue::{JobSource, QueueConfig, RedisJobQueue};
