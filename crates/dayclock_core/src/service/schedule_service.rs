//! Create/edit workflow with overflow review.
//!
//! # Responsibility
//! - Route every create/edit through the 24-hour overflow check.
//! - Hold generated proposals while the user reviews them.
//! - Apply the accepted subset item by item, then retry the pending edit.
//!
//! # Invariants
//! - An edit is committed only when the resulting day fits in 24 hours.
//! - A failed adjustment write never aborts the rest of the batch.
//! - Proposals are never persisted.

use crate::model::schedule::total_duration;
use crate::model::task::{
    ensure_in_palette, Task, TaskDraft, TaskId, TaskPatch, TaskValidationError, DAY_HOURS,
    TASK_COLORS,
};
use crate::repo::task_repo::{RepoError, TaskRepository};
use crate::service::allocator::{propose_adjustments, selected_reduction, AdjustmentProposal};
use log::{info, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::{SystemTime, UNIX_EPOCH};

const TOTAL_TOLERANCE: f64 = 1e-9;

/// Errors from schedule workflow operations.
#[derive(Debug)]
pub enum ScheduleError {
    /// The submitted task data is invalid.
    Validation(TaskValidationError),
    /// The edited task does not exist.
    TaskNotFound(TaskId),
    /// Store-level failure.
    Repo(RepoError),
}

impl Display for ScheduleError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::TaskNotFound(id) => write!(f, "task not found: {id}"),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for ScheduleError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Repo(err) => Some(err),
            Self::TaskNotFound(_) => None,
        }
    }
}

impl From<TaskValidationError> for ScheduleError {
    fn from(value: TaskValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<RepoError> for ScheduleError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::NotFound(id) => Self::TaskNotFound(id),
            RepoError::Validation(err) => Self::Validation(err),
            other => Self::Repo(other),
        }
    }
}

/// A create or edit waiting for the overflow check.
#[derive(Debug, Clone, PartialEq)]
pub enum PendingEdit {
    Create(TaskDraft),
    Update { id: TaskId, patch: TaskPatch },
}

impl PendingEdit {
    /// Id of the task being edited; `None` for creations.
    pub fn edited_task_id(&self) -> Option<TaskId> {
        match self {
            Self::Create(_) => None,
            Self::Update { id, .. } => Some(*id),
        }
    }

    fn color(&self) -> Option<&str> {
        match self {
            Self::Create(draft) => Some(draft.color.as_str()),
            Self::Update { patch, .. } => patch.color.as_deref(),
        }
    }

    fn kind_label(&self) -> &'static str {
        match self {
            Self::Create(_) => "create",
            Self::Update { .. } => "update",
        }
    }
}

/// Result of submitting a [`PendingEdit`].
#[derive(Debug)]
pub enum SubmitOutcome {
    /// The edit fit in the day and was written.
    Committed(Task),
    /// The edit would overflow the day; nothing was written.
    NeedsReview(AdjustmentReview),
}

/// Proposal batch under user review.
#[derive(Debug, Clone)]
pub struct AdjustmentReview {
    pending: PendingEdit,
    overflow_hours: f64,
    proposals: Vec<AdjustmentProposal>,
}

impl AdjustmentReview {
    pub fn pending(&self) -> &PendingEdit {
        &self.pending
    }

    /// Hours the pending edit would put the day over 24.
    pub fn overflow_hours(&self) -> f64 {
        self.overflow_hours
    }

    pub fn proposals(&self) -> &[AdjustmentProposal] {
        &self.proposals
    }

    /// Flips `selected` on the proposal for `task_id`. Returns `false` when
    /// no proposal targets that task.
    pub fn toggle(&mut self, task_id: TaskId) -> bool {
        match self.proposal_mut(task_id) {
            Some(proposal) => {
                proposal.selected = !proposal.selected;
                true
            }
            None => false,
        }
    }

    pub fn set_selected(&mut self, task_id: TaskId, selected: bool) -> bool {
        match self.proposal_mut(task_id) {
            Some(proposal) => {
                proposal.selected = selected;
                true
            }
            None => false,
        }
    }

    pub fn select_all(&mut self) {
        self.proposals.iter_mut().for_each(|p| p.selected = true);
    }

    pub fn deselect_all(&mut self) {
        self.proposals.iter_mut().for_each(|p| p.selected = false);
    }

    /// Hours freed if the current selection is applied.
    pub fn selected_reduction(&self) -> f64 {
        selected_reduction(&self.proposals)
    }

    /// Overflow left after applying the current selection.
    pub fn residual_overflow(&self) -> f64 {
        (self.overflow_hours - self.selected_reduction()).max(0.0)
    }

    pub fn is_resolved(&self) -> bool {
        self.residual_overflow() <= TOTAL_TOLERANCE
    }

    /// Drops the proposals and hands the edit back for manual changes.
    pub fn cancel(self) -> PendingEdit {
        self.pending
    }

    fn proposal_mut(&mut self, task_id: TaskId) -> Option<&mut AdjustmentProposal> {
        self.proposals.iter_mut().find(|p| p.task_id == task_id)
    }
}

/// Why one accepted proposal could not be written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdjustmentFailureReason {
    /// The task was deleted after the proposal was generated.
    NotFound,
    /// The store rejected or failed the write.
    Write(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct AdjustmentFailure {
    pub proposal: AdjustmentProposal,
    pub reason: AdjustmentFailureReason,
}

/// What happened when a review was applied.
#[derive(Debug)]
pub struct ApplyReport {
    /// Tasks whose duration was rewritten, in proposal order.
    pub applied: Vec<Task>,
    pub failed: Vec<AdjustmentFailure>,
    /// Re-submission of the pending edit after the adjustments.
    pub outcome: Result<SubmitOutcome, ScheduleError>,
}

/// Schedule workflow facade over a task repository.
pub struct ScheduleService<R: TaskRepository> {
    repo: R,
    palette: Vec<String>,
}

impl<R: TaskRepository> ScheduleService<R> {
    /// Creates a service that accepts the built-in palette.
    pub fn new(repo: R) -> Self {
        let palette = TASK_COLORS.iter().map(|c| (*c).to_string()).collect();
        Self::with_palette(repo, palette)
    }

    pub fn with_palette(repo: R, palette: Vec<String>) -> Self {
        Self { repo, palette }
    }

    pub fn repo(&self) -> &R {
        &self.repo
    }

    pub fn palette(&self) -> &[String] {
        &self.palette
    }

    pub fn list_tasks(&self) -> Result<Vec<Task>, ScheduleError> {
        Ok(self.repo.list_tasks()?)
    }

    pub fn get_task(&self, id: TaskId) -> Result<Option<Task>, ScheduleError> {
        Ok(self.repo.get_task(id)?)
    }

    pub fn delete_task(&self, id: TaskId) -> Result<(), ScheduleError> {
        self.repo.delete_task(id)?;
        info!("event=task_delete module=service status=ok id={id}");
        Ok(())
    }

    pub fn seed_defaults(&self) -> Result<usize, ScheduleError> {
        let inserted = self.repo.seed_defaults()?;
        info!("event=task_seed module=service status=ok inserted={inserted}");
        Ok(inserted)
    }

    /// Starts or stops a task timer using the current wall clock.
    pub fn toggle_timer(&self, id: TaskId, active: bool) -> Result<Task, ScheduleError> {
        self.toggle_timer_at(id, active, now_epoch_ms())
    }

    pub fn toggle_timer_at(
        &self,
        id: TaskId,
        active: bool,
        now_ms: i64,
    ) -> Result<Task, ScheduleError> {
        let task = self.repo.toggle_timer(id, active, now_ms)?;
        info!("event=timer_toggle module=service status=ok id={id} active={active}");
        Ok(task)
    }

    /// Runs the overflow check for `edit`.
    ///
    /// Commits directly when the resulting total stays within 24 hours;
    /// otherwise returns a review holding freshly generated proposals and
    /// writes nothing.
    pub fn submit(&self, edit: PendingEdit) -> Result<SubmitOutcome, ScheduleError> {
        self.validate_edit(&edit)?;

        let tasks = self.repo.list_tasks()?;
        let (old_duration, requested_duration) = match &edit {
            PendingEdit::Create(draft) => (0.0, draft.duration),
            PendingEdit::Update { id, patch } => {
                let existing = tasks
                    .iter()
                    .find(|task| task.id == *id)
                    .ok_or(ScheduleError::TaskNotFound(*id))?;
                (
                    existing.duration,
                    patch.duration.unwrap_or(existing.duration),
                )
            }
        };

        let new_total = total_duration(&tasks) - old_duration + requested_duration;
        if new_total <= DAY_HOURS + TOTAL_TOLERANCE {
            return self.commit(edit).map(SubmitOutcome::Committed);
        }

        let overflow_hours = new_total - DAY_HOURS;
        let proposals = propose_adjustments(&tasks, edit.edited_task_id(), overflow_hours);
        info!(
            "event=overflow_check module=service status=overflow kind={} overflow_hours={} proposals={}",
            edit.kind_label(),
            overflow_hours,
            proposals.len()
        );

        Ok(SubmitOutcome::NeedsReview(AdjustmentReview {
            pending: edit,
            overflow_hours,
            proposals,
        }))
    }

    /// Writes every selected proposal, then re-submits the pending edit.
    ///
    /// Individual write failures are collected in the report and do not stop
    /// the batch. If the selection did not free enough time the re-submission
    /// yields another review.
    pub fn apply(&self, review: AdjustmentReview) -> ApplyReport {
        let mut applied = Vec::new();
        let mut failed = Vec::new();

        for proposal in review.proposals.into_iter().filter(|p| p.selected) {
            match self.repo.set_duration(proposal.task_id, proposal.new_duration) {
                Ok(task) => applied.push(task),
                Err(err) => {
                    warn!(
                        "event=adjustment_apply module=service status=error id={} error={}",
                        proposal.task_id, err
                    );
                    let reason = match err {
                        RepoError::NotFound(_) => AdjustmentFailureReason::NotFound,
                        other => AdjustmentFailureReason::Write(other.to_string()),
                    };
                    failed.push(AdjustmentFailure { proposal, reason });
                }
            }
        }

        info!(
            "event=adjustment_apply module=service status=ok applied={} failed={}",
            applied.len(),
            failed.len()
        );

        ApplyReport {
            applied,
            failed,
            outcome: self.submit(review.pending),
        }
    }

    fn validate_edit(&self, edit: &PendingEdit) -> Result<(), ScheduleError> {
        match edit {
            PendingEdit::Create(draft) => draft.validate()?,
            PendingEdit::Update { patch, .. } => patch.validate()?,
        }
        if let Some(color) = edit.color() {
            ensure_in_palette(color, &self.palette)?;
        }
        Ok(())
    }

    fn commit(&self, edit: PendingEdit) -> Result<Task, ScheduleError> {
        let kind = edit.kind_label();
        let task = match edit {
            PendingEdit::Create(draft) => self.repo.create_task(&draft)?,
            PendingEdit::Update { id, patch } => self.repo.update_task(id, &patch)?,
        };
        info!(
            "event=task_{kind} module=service status=ok id={} duration={}",
            task.id, task.duration
        );
        Ok(task)
    }
}

/// Current wall clock as unix epoch milliseconds.
pub fn now_epoch_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |elapsed| elapsed.as_millis() as i64)
}
