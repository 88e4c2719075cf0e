//! Video compression worker.
//!
//! This crate provides:
//! - The consume-process-cleanup executor loop
//! - The per-job compression pipeline
//! - Job record synchronization policy (throttled progress, retried
//!   terminal writes)
//! - Scratch space management and artifact transfer
//! - Graceful shutdown

pub mod config;
pub mod error;
pub mod executor;
pub mod metrics;
pub mod pipeline;
pub mod scratch;
pub mod sync;
pub mod transfer;

pub use config::WorkerConfig;
pub use error::{WorkerError, WorkerResult};
pub use executor::{JobExecutor, WorkerDeps};
pub use pipeline::JobPipeline;
pub use scratch::ScratchSpace;
pub use sync::{JobRecordSync, ProgressGate, RetryConfig};
pub use transfer::ArtifactTransfer;
