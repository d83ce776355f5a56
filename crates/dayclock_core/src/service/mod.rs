//! Schedule use-case services.
//!
//! # Responsibility
//! - `allocator`: pure overflow resolution over a task snapshot.
//! - `schedule_service`: the create/edit workflow that drives it against a
//!   task repository.

pub mod allocator;
pub mod schedule_service;
