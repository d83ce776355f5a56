//! Repository layer for task persistence.
//!
//! # Responsibility
//! - Define the task store contract used by the schedule workflow.
//! - Isolate SQLite query details from allocation and orchestration.
//!
//! # Invariants
//! - Repository writes validate input before persistence.
//! - Missing rows surface as `RepoError::NotFound`, not as empty results.

pub mod task_repo;
