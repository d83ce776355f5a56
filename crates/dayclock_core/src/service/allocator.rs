//! Auto-adjustment allocator.
//!
//! # Responsibility
//! - Decide which tasks give up time when an edit overflows the day.
//! - Rank tasks from most to least reducible by their name.
//!
//! # Invariants
//! - Pure: never mutates its input, never performs I/O, keeps no state.
//! - The excluded task never appears in the output.
//! - Every `new_duration` is on the half-hour grid and `>= MIN_DURATION`.
//! - Total proposed reduction never exceeds the requested overflow rounded
//!   up to the next half hour.

use crate::model::schedule::is_meal_name;
use crate::model::task::{
    ceil_slots, floor_slots, slots_to_hours, Task, TaskId, MIN_DURATION,
};
use serde::Serialize;

/// Discretionary activities, reduced first in this order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FlexibleKind {
    Personal,
    Exercise,
    Project,
    Leetcode,
}

const FLEXIBLE_KEYWORDS: [(&str, FlexibleKind); 4] = [
    ("personal", FlexibleKind::Personal),
    ("exercise", FlexibleKind::Exercise),
    ("project", FlexibleKind::Project),
    ("leetcode", FlexibleKind::Leetcode),
];

const SLEEP_KEYWORD: &str = "sleep";

/// How willingly a task gives up time, derived from its name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PriorityTier {
    /// Absorbs schedule pressure first.
    Flexible(FlexibleKind),
    /// Anything without a recognized keyword.
    Normal,
    /// Meals.
    Protected,
    /// Sleep; reduced only as a last resort.
    Fixed,
}

impl PriorityTier {
    /// Case-insensitive substring match; the first rule that hits wins.
    ///
    /// "Personal Project" is `Flexible(Personal)`, "Sleep after dinner" is
    /// `Fixed`.
    pub fn classify(name: &str) -> Self {
        let lowered = name.to_lowercase();
        if let Some((_, kind)) = FLEXIBLE_KEYWORDS
            .iter()
            .find(|(keyword, _)| lowered.contains(keyword))
        {
            return Self::Flexible(*kind);
        }
        if lowered.contains(SLEEP_KEYWORD) {
            return Self::Fixed;
        }
        if is_meal_name(&lowered) {
            return Self::Protected;
        }
        Self::Normal
    }

    /// Scan position; lower ranks are reduced earlier.
    pub fn rank(self) -> u8 {
        match self {
            Self::Flexible(FlexibleKind::Personal) => 0,
            Self::Flexible(FlexibleKind::Exercise) => 1,
            Self::Flexible(FlexibleKind::Project) => 2,
            Self::Flexible(FlexibleKind::Leetcode) => 3,
            Self::Normal => 4,
            Self::Protected => 5,
            Self::Fixed => 6,
        }
    }
}

/// A suggested reduction of one task's duration.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdjustmentProposal {
    pub task_id: TaskId,
    /// Display snapshot taken when the proposal was generated.
    pub name: String,
    pub color: String,
    pub old_duration: f64,
    pub new_duration: f64,
    /// Whether the user keeps this item; defaults to `true`.
    pub selected: bool,
}

impl AdjustmentProposal {
    /// Hours this proposal takes away from its task.
    pub fn reduction(&self) -> f64 {
        self.old_duration - self.new_duration
    }
}

/// Proposes duration reductions that cover `overflow_hours`.
///
/// Tasks are scanned in [`PriorityTier`] order (stable for ties) and each one
/// gives up as much as it can, down to `MIN_DURATION`, until the overflow is
/// covered. When the combined slack is too small the partial result is
/// returned as-is; the caller detects the residual.
///
/// Returns an empty list when `overflow_hours` is not a positive number.
pub fn propose_adjustments(
    tasks: &[Task],
    excluded: Option<TaskId>,
    overflow_hours: f64,
) -> Vec<AdjustmentProposal> {
    if !overflow_hours.is_finite() || overflow_hours <= 0.0 {
        return Vec::new();
    }

    let mut remaining = ceil_slots(overflow_hours);
    let mut proposals = Vec::new();

    for task in prioritized(tasks, excluded) {
        if remaining <= 0 {
            break;
        }
        if task.duration <= MIN_DURATION {
            continue;
        }

        let reduction = slack_slots(task).min(remaining);
        if reduction <= 0 {
            continue;
        }

        proposals.push(AdjustmentProposal {
            task_id: task.id,
            name: task.name.clone(),
            color: task.color.clone(),
            old_duration: task.duration,
            new_duration: task.duration - slots_to_hours(reduction),
            selected: true,
        });
        remaining -= reduction;
    }

    proposals
}

/// Candidate tasks in reduction order, without `excluded`.
pub fn prioritized(tasks: &[Task], excluded: Option<TaskId>) -> Vec<&Task> {
    let mut candidates: Vec<&Task> = tasks
        .iter()
        .filter(|task| Some(task.id) != excluded)
        .collect();
    candidates.sort_by_key(|task| PriorityTier::classify(&task.name).rank());
    candidates
}

/// Hours the non-excluded tasks could give up in total.
pub fn reducible_slack(tasks: &[Task], excluded: Option<TaskId>) -> f64 {
    let slots: i64 = tasks
        .iter()
        .filter(|task| Some(task.id) != excluded)
        .map(slack_slots)
        .sum();
    slots_to_hours(slots)
}

/// Sum of reductions across `proposals`, selected or not.
pub fn total_reduction(proposals: &[AdjustmentProposal]) -> f64 {
    proposals.iter().map(AdjustmentProposal::reduction).sum()
}

/// Sum of reductions across selected proposals only.
pub fn selected_reduction(proposals: &[AdjustmentProposal]) -> f64 {
    proposals
        .iter()
        .filter(|proposal| proposal.selected)
        .map(AdjustmentProposal::reduction)
        .sum()
}

fn slack_slots(task: &Task) -> i64 {
    (floor_slots(task.duration) - floor_slots(MIN_DURATION)).max(0)
}
