//! Task domain model.
//!
//! # Responsibility
//! - Define the canonical schedule record owned by the task store.
//! - Validate the 24-hour cycle and half-hour grid rules for writes.
//!
//! # Invariants
//! - `duration` is within `[MIN_DURATION, DAY_HOURS]` and a multiple of
//!   `SLOT_HOURS`.
//! - `start_time` is within `[0, DAY_HOURS)`.
//! - `timer_started_at` is `Some` exactly when `is_timer_active` is `true`.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Store-assigned numeric identifier, stable for the task lifetime.
pub type TaskId = i64;

/// Length of the schedule cycle in hours.
pub const DAY_HOURS: f64 = 24.0;
/// Smallest schedulable unit in hours.
pub const SLOT_HOURS: f64 = 0.5;
/// Floor below which no duration may drop.
pub const MIN_DURATION: f64 = 0.5;

/// Built-in color palette offered for new tasks.
pub const TASK_COLORS: [&str; 7] = [
    "#8B5CF6", // purple
    "#EC4899", // pink
    "#6366F1", // indigo
    "#F59E0B", // amber
    "#10B981", // green
    "#EF4444", // red
    "#9CA3AF", // gray
];

static HEX_COLOR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^#[0-9A-Fa-f]{6}$").expect("hex color pattern compiles"));

/// Validation errors for task writes.
#[derive(Debug, Clone, PartialEq)]
pub enum TaskValidationError {
    NonPositiveId(TaskId),
    BlankName,
    StartTimeOutOfRange(f64),
    DurationOutOfRange(f64),
    DurationOffGrid(f64),
    InvalidColor(String),
    ColorNotInPalette(String),
    TimerStateMismatch,
}

impl Display for TaskValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NonPositiveId(id) => write!(f, "task id must be positive, got {id}"),
            Self::BlankName => write!(f, "task name must not be blank"),
            Self::StartTimeOutOfRange(value) => {
                write!(f, "start time must be between 0 and 24 hours, got {value}")
            }
            Self::DurationOutOfRange(value) => write!(
                f,
                "duration must be between 30 minutes and 24 hours, got {value}"
            ),
            Self::DurationOffGrid(value) => write!(
                f,
                "duration must be in increments of 30 minutes, got {value}"
            ),
            Self::InvalidColor(value) => write!(f, "color must be #RRGGBB, got `{value}`"),
            Self::ColorNotInPalette(value) => write!(f, "invalid color selection `{value}`"),
            Self::TimerStateMismatch => write!(
                f,
                "timer_started_at must be set exactly when the timer is active"
            ),
        }
    }
}

impl Error for TaskValidationError {}

/// One named block of the daily schedule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: TaskId,
    pub name: String,
    /// Hours from midnight.
    pub start_time: f64,
    /// Hours; the only field the allocator rewrites.
    pub duration: f64,
    pub color: String,
    pub is_timer_active: bool,
    /// Unix epoch milliseconds of the running timer start.
    pub timer_started_at: Option<i64>,
}

impl Task {
    /// Validates every field, including timer consistency.
    pub fn validate(&self) -> Result<(), TaskValidationError> {
        if self.id <= 0 {
            return Err(TaskValidationError::NonPositiveId(self.id));
        }
        validate_name(&self.name)?;
        validate_start_time(self.start_time)?;
        validate_duration(self.duration)?;
        validate_color(&self.color)?;
        if self.is_timer_active != self.timer_started_at.is_some() {
            return Err(TaskValidationError::TimerStateMismatch);
        }
        Ok(())
    }

    /// End of the task window on the 24-hour dial.
    pub fn end_time(&self) -> f64 {
        (self.start_time + self.duration) % DAY_HOURS
    }

    /// Returns whether the task window wraps past midnight.
    pub fn crosses_midnight(&self) -> bool {
        self.start_time + self.duration > DAY_HOURS
    }

    /// Milliseconds tracked by the running timer, `0` when idle.
    pub fn elapsed_ms(&self, now_ms: i64) -> i64 {
        match (self.is_timer_active, self.timer_started_at) {
            (true, Some(started_at)) => (now_ms - started_at).max(0),
            _ => 0,
        }
    }
}

/// Creation input for a new task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskDraft {
    pub name: String,
    pub start_time: f64,
    pub duration: f64,
    pub color: String,
}

impl TaskDraft {
    pub fn new(
        name: impl Into<String>,
        start_time: f64,
        duration: f64,
        color: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            start_time,
            duration,
            color: color.into(),
        }
    }

    pub fn validate(&self) -> Result<(), TaskValidationError> {
        validate_name(&self.name)?;
        validate_start_time(self.start_time)?;
        validate_duration(self.duration)?;
        validate_color(&self.color)
    }
}

/// Partial update; `None` fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskPatch {
    pub name: Option<String>,
    pub start_time: Option<f64>,
    pub duration: Option<f64>,
    pub color: Option<String>,
}

impl TaskPatch {
    /// Patch that only rewrites `duration`.
    pub fn duration(duration: f64) -> Self {
        Self {
            duration: Some(duration),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.start_time.is_none()
            && self.duration.is_none()
            && self.color.is_none()
    }

    pub fn validate(&self) -> Result<(), TaskValidationError> {
        if let Some(name) = &self.name {
            validate_name(name)?;
        }
        if let Some(start_time) = self.start_time {
            validate_start_time(start_time)?;
        }
        if let Some(duration) = self.duration {
            validate_duration(duration)?;
        }
        if let Some(color) = &self.color {
            validate_color(color)?;
        }
        Ok(())
    }

    /// Returns `task` with the present fields overwritten.
    pub fn apply_to(&self, task: &Task) -> Task {
        let mut merged = task.clone();
        if let Some(name) = &self.name {
            merged.name = name.trim().to_string();
        }
        if let Some(start_time) = self.start_time {
            merged.start_time = start_time;
        }
        if let Some(duration) = self.duration {
            merged.duration = duration;
        }
        if let Some(color) = &self.color {
            merged.color = color.clone();
        }
        merged
    }
}

/// Checks `color` against an allowed palette, case-insensitively.
pub fn ensure_in_palette(color: &str, palette: &[String]) -> Result<(), TaskValidationError> {
    if palette.iter().any(|entry| entry.eq_ignore_ascii_case(color)) {
        Ok(())
    } else {
        Err(TaskValidationError::ColorNotInPalette(color.to_string()))
    }
}

/// Returns whether `value` is a `#RRGGBB` color.
pub fn is_hex_color(value: &str) -> bool {
    HEX_COLOR.is_match(value)
}

/// Returns whether `hours` lies on the half-hour grid.
pub fn is_on_grid(hours: f64) -> bool {
    let slots = hours / SLOT_HOURS;
    slots.is_finite() && slots.fract() == 0.0
}

/// Whole half-hour slots contained in `hours`, rounded down.
pub fn floor_slots(hours: f64) -> i64 {
    (hours / SLOT_HOURS).floor() as i64
}

/// Half-hour slots needed to cover `hours`, rounded up.
pub fn ceil_slots(hours: f64) -> i64 {
    (hours / SLOT_HOURS).ceil() as i64
}

pub fn slots_to_hours(slots: i64) -> f64 {
    slots as f64 * SLOT_HOURS
}

fn validate_name(name: &str) -> Result<(), TaskValidationError> {
    if name.trim().is_empty() {
        return Err(TaskValidationError::BlankName);
    }
    Ok(())
}

fn validate_start_time(start_time: f64) -> Result<(), TaskValidationError> {
    if !start_time.is_finite() || !(0.0..DAY_HOURS).contains(&start_time) {
        return Err(TaskValidationError::StartTimeOutOfRange(start_time));
    }
    Ok(())
}

fn validate_duration(duration: f64) -> Result<(), TaskValidationError> {
    if !duration.is_finite() || !(MIN_DURATION..=DAY_HOURS).contains(&duration) {
        return Err(TaskValidationError::DurationOutOfRange(duration));
    }
    if !is_on_grid(duration) {
        return Err(TaskValidationError::DurationOffGrid(duration));
    }
    Ok(())
}

fn validate_color(color: &str) -> Result<(), TaskValidationError> {
    if !is_hex_color(color) {
        return Err(TaskValidationError::InvalidColor(color.to_string()));
    }
    Ok(())
}
