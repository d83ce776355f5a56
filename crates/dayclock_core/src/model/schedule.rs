//! Read-only views over a full day of tasks.
//!
//! # Responsibility
//! - Compute totals, overlaps and the "current task" for list views.
//! - Build the allocation breakdown consumed by summary output.
//!
//! # Invariants
//! - Every function here is pure over the task slice it receives.

use crate::model::task::{Task, TaskDraft, DAY_HOURS, TASK_COLORS};
use serde::Serialize;
use std::cmp::Ordering;

const BALANCE_TOLERANCE: f64 = 0.01;
const MEAL_KEYWORDS: [&str; 4] = ["eating", "breakfast", "lunch", "dinner"];
const MEAL_GROUP_LABEL: &str = "Eating";
const UNALLOCATED_LABEL: &str = "Unallocated";
const UNALLOCATED_COLOR: &str = "#E5E7EB";

/// Sort keys offered by the task list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TaskSort {
    /// Ascending start time.
    #[default]
    Time,
    /// Longest first.
    Duration,
    /// Case-insensitive alphabetical.
    Name,
}

/// One row of the per-activity breakdown.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AllocationSlice {
    pub label: String,
    pub color: String,
    pub duration: f64,
    /// Share of the 24-hour cycle, `0..=100`.
    pub percent: f64,
}

/// Sum of all task durations in hours.
pub fn total_duration(tasks: &[Task]) -> f64 {
    tasks.iter().map(|task| task.duration).sum()
}

/// Unscheduled hours left in the day, never negative.
pub fn remaining_hours(tasks: &[Task]) -> f64 {
    (DAY_HOURS - total_duration(tasks)).max(0.0)
}

/// Hours by which `total` exceeds the day, `0` when it fits.
pub fn overflow_hours(total: f64) -> f64 {
    (total - DAY_HOURS).max(0.0)
}

/// Returns whether the schedule fills exactly 24 hours.
pub fn is_balanced(tasks: &[Task]) -> bool {
    (total_duration(tasks) - DAY_HOURS).abs() < BALANCE_TOLERANCE
}

/// Returns whether `name` reads as a meal.
pub fn is_meal_name(name: &str) -> bool {
    let lowered = name.to_lowercase();
    MEAL_KEYWORDS
        .iter()
        .any(|keyword| lowered.contains(keyword))
}

/// Formats an hour-of-day as `HH:MM`.
pub fn format_clock(hours: f64) -> String {
    let normalized = hours.rem_euclid(DAY_HOURS);
    let mut whole = normalized.floor() as u32;
    let mut minutes = ((normalized - f64::from(whole)) * 60.0).round() as u32;
    if minutes == 60 {
        whole = (whole + 1) % 24;
        minutes = 0;
    }
    format!("{whole:02}:{minutes:02}")
}

/// Start and end labels for one task, e.g. `("22:00", "06:00")`.
pub fn time_display(task: &Task) -> (String, String) {
    (format_clock(task.start_time), format_clock(task.end_time()))
}

/// Every half-hour start slot of the day as `(hours, label)`.
pub fn time_options() -> Vec<(f64, String)> {
    (0..48)
        .map(|slot| {
            let hours = f64::from(slot) * 0.5;
            (hours, format_clock(hours))
        })
        .collect()
}

/// Returns whether two task windows intersect on the 24-hour dial.
pub fn tasks_overlap(a: &Task, b: &Task) -> bool {
    let left = dial_intervals(a);
    let right = dial_intervals(b);
    left.iter().any(|(a_start, a_end)| {
        right
            .iter()
            .any(|(b_start, b_end)| a_start < b_end && b_start < a_end)
    })
}

/// Task whose window covers `hour_of_day`, if any.
pub fn current_task(tasks: &[Task], hour_of_day: f64) -> Option<&Task> {
    tasks.iter().find(|task| {
        dial_intervals(task)
            .iter()
            .any(|(start, end)| *start <= hour_of_day && hour_of_day < *end)
    })
}

/// Sorts tasks in place for list display. Ties keep their relative order.
pub fn sort_tasks(tasks: &mut [Task], sort: TaskSort) {
    match sort {
        TaskSort::Time => tasks.sort_by(|a, b| cmp_f64(a.start_time, b.start_time)),
        TaskSort::Duration => tasks.sort_by(|a, b| cmp_f64(b.duration, a.duration)),
        TaskSort::Name => tasks.sort_by(|a, b| {
            a.name
                .to_lowercase()
                .cmp(&b.name.to_lowercase())
                .then_with(|| a.name.cmp(&b.name))
        }),
    }
}

/// Per-activity share of the day, largest first.
///
/// Meal tasks collapse into one "Eating" row; tasks sharing a name are
/// merged. An "Unallocated" row is appended when the day is under-filled.
pub fn allocation_breakdown(tasks: &[Task]) -> Vec<AllocationSlice> {
    let mut slices: Vec<AllocationSlice> = Vec::new();
    for task in tasks {
        let label = if is_meal_name(&task.name) {
            MEAL_GROUP_LABEL.to_string()
        } else {
            task.name.clone()
        };
        match slices.iter_mut().find(|slice| slice.label == label) {
            Some(slice) => slice.duration += task.duration,
            None => slices.push(AllocationSlice {
                label,
                color: task.color.clone(),
                duration: task.duration,
                percent: 0.0,
            }),
        }
    }

    slices.sort_by(|a, b| cmp_f64(b.duration, a.duration));

    let total = total_duration(tasks);
    if !is_balanced(tasks) && total < DAY_HOURS {
        slices.push(AllocationSlice {
            label: UNALLOCATED_LABEL.to_string(),
            color: UNALLOCATED_COLOR.to_string(),
            duration: DAY_HOURS - total,
            percent: 0.0,
        });
    }

    for slice in &mut slices {
        slice.percent = slice.duration / DAY_HOURS * 100.0;
    }
    slices
}

/// The starter day inserted into an empty store. Totals exactly 24 hours.
pub fn default_schedule() -> Vec<TaskDraft> {
    let [purple, pink, indigo, amber, green, red, gray] = TASK_COLORS;
    vec![
        TaskDraft::new("Sleeping", 22.0, 8.0, purple),
        TaskDraft::new("Breakfast", 6.0, 0.5, amber),
        TaskDraft::new("Job Applications", 6.5, 3.0, pink),
        TaskDraft::new("Leetcode", 9.5, 2.0, indigo),
        TaskDraft::new("Lunch", 11.5, 1.0, amber),
        TaskDraft::new("Project Work", 12.5, 4.0, green),
        TaskDraft::new("Exercise", 16.5, 1.0, red),
        TaskDraft::new("Dinner", 17.5, 1.0, amber),
        TaskDraft::new("Personal Time", 18.5, 3.5, gray),
    ]
}

fn dial_intervals(task: &Task) -> Vec<(f64, f64)> {
    let end = task.start_time + task.duration;
    if end <= DAY_HOURS {
        vec![(task.start_time, end)]
    } else {
        vec![(task.start_time, DAY_HOURS), (0.0, end - DAY_HOURS)]
    }
}

fn cmp_f64(a: f64, b: f64) -> Ordering {
    a.partial_cmp(&b).unwrap_or(Ordering::Equal)
}

#[cfg(test)]
mod tests {
    use super::{dial_intervals, format_clock, time_options};
    use crate::model::task::Task;

    #[test]
    fn format_clock_pads_and_wraps() {
        assert_eq!(format_clock(0.0), "00:00");
        assert_eq!(format_clock(9.5), "09:30");
        assert_eq!(format_clock(30.0), "06:00");
    }

    #[test]
    fn time_options_cover_every_half_hour() {
        let options = time_options();
        assert_eq!(options.len(), 48);
        assert_eq!(options[1].1, "00:30");
        assert_eq!(options[47].1, "23:30");
    }

    #[test]
    fn overnight_task_splits_into_two_intervals() {
        let task = Task {
            id: 1,
            name: "Sleeping".to_string(),
            start_time: 22.0,
            duration: 8.0,
            color: "#8B5CF6".to_string(),
            is_timer_active: false,
            timer_started_at: None,
        };
        assert_eq!(dial_intervals(&task), vec![(22.0, 24.0), (0.0, 6.0)]);
    }
}
