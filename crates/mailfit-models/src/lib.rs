//! Shared data models for the Mailfit backend.
//!
//! This crate provides Serde-serializable types for:
//! - Job records and the job status lifecycle
//! - Destination providers and their attachment limits
//! - Encode budget planning

pub mod job;
pub mod plan;
pub mod provider;

// Re-export common types
pub use job::{JobRecord, JobStatus, ParseStatusError, UploadId};
pub use plan::{BudgetPlan, PlannerConfig};
pub use provider::Provider;
