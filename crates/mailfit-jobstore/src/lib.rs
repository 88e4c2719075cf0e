//! Postgres-backed job record store.
//!
//! This crate provides:
//! - The [`JobStore`] trait the worker writes job lifecycle state through
//! - [`PgJobStore`], its `sqlx` implementation
//! - Producer-side record creation and embedded migrations

pub mod error;
pub mod store;

// Re-export common types
pub use error::{JobStoreError, JobStoreResult};
pub use store::{JobStore, NewJob, PgJobStore};
