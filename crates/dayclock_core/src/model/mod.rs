//! Schedule domain model.
//!
//! # Responsibility
//! - Define the task record and its write-side validation.
//! - Provide pure, read-only views over a full day of tasks.
//!
//! # Invariants
//! - Every task is identified by a stable store-assigned `TaskId`.
//! - All durations live on the half-hour grid of a 24-hour cycle.

pub mod schedule;
pub mod task;
