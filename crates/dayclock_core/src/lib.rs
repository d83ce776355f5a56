//! Core domain logic for dayclock, a single-user 24-hour schedule.
//! This crate owns the schedule invariants: the day never holds more than
//! 24 hours of tasks once an edit is applied, and no task drops below half
//! an hour.

pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;

pub use config::{Config, ConfigError};
pub use logging::{default_log_level, init_logging, logging_status};
pub use model::schedule::{
    allocation_breakdown, current_task, default_schedule, format_clock, is_balanced,
    remaining_hours, sort_tasks, tasks_overlap, time_display, total_duration, AllocationSlice,
    TaskSort,
};
pub use model::task::{
    Task, TaskDraft, TaskId, TaskPatch, TaskValidationError, DAY_HOURS, MIN_DURATION,
    TASK_COLORS,
};
pub use repo::task_repo::{RepoError, RepoResult, SqliteTaskRepository, TaskRepository};
pub use service::allocator::{
    propose_adjustments, reducible_slack, AdjustmentProposal, FlexibleKind, PriorityTier,
};
pub use service::schedule_service::{
    AdjustmentFailure, AdjustmentFailureReason, AdjustmentReview, ApplyReport, PendingEdit,
    ScheduleError, ScheduleService, SubmitOutcome,
};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
