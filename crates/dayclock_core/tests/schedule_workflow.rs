use dayclock_core::db::open_db_in_memory;
use dayclock_core::{
    total_duration, AdjustmentFailureReason, AdjustmentReview, PendingEdit, RepoError, RepoResult,
    ScheduleError, ScheduleService, SqliteTaskRepository, SubmitOutcome, Task, TaskDraft, TaskId,
    TaskPatch, TaskRepository, TaskValidationError, DAY_HOURS,
};
use rusqlite::Connection;

// Ids assigned by `seed_defaults` on an empty store.
const SLEEPING: TaskId = 1;
const LEETCODE: TaskId = 4;
const PROJECT_WORK: TaskId = 6;
const EXERCISE: TaskId = 7;
const PERSONAL_TIME: TaskId = 9;

fn seeded_service(conn: &Connection) -> ScheduleService<SqliteTaskRepository<'_>> {
    let repo = SqliteTaskRepository::try_new(conn).unwrap();
    let service = ScheduleService::new(repo);
    assert_eq!(service.seed_defaults().unwrap(), 9);
    service
}

fn create(name: &str, duration: f64) -> PendingEdit {
    PendingEdit::Create(TaskDraft::new(name, 20.0, duration, "#9CA3AF"))
}

fn expect_review(outcome: SubmitOutcome) -> AdjustmentReview {
    match outcome {
        SubmitOutcome::NeedsReview(review) => review,
        SubmitOutcome::Committed(task) => panic!("expected review, committed {task:?}"),
    }
}

fn expect_committed(outcome: SubmitOutcome) -> Task {
    match outcome {
        SubmitOutcome::Committed(task) => task,
        SubmitOutcome::NeedsReview(review) => panic!("expected commit, got {review:?}"),
    }
}

fn duration_of(service: &ScheduleService<impl TaskRepository>, id: TaskId) -> f64 {
    service.get_task(id).unwrap().unwrap().duration
}

/// Delegates to SQLite but fails `set_duration` for one task.
struct FailingRepo<'conn> {
    inner: SqliteTaskRepository<'conn>,
    fail_id: TaskId,
}

impl TaskRepository for FailingRepo<'_> {
    fn list_tasks(&self) -> RepoResult<Vec<Task>> {
        self.inner.list_tasks()
    }

    fn get_task(&self, id: TaskId) -> RepoResult<Option<Task>> {
        self.inner.get_task(id)
    }

    fn create_task(&self, draft: &TaskDraft) -> RepoResult<Task> {
        self.inner.create_task(draft)
    }

    fn update_task(&self, id: TaskId, patch: &TaskPatch) -> RepoResult<Task> {
        self.inner.update_task(id, patch)
    }

    fn set_duration(&self, id: TaskId, duration: f64) -> RepoResult<Task> {
        if id == self.fail_id {
            return Err(RepoError::InvalidData("disk full".to_string()));
        }
        self.inner.set_duration(id, duration)
    }

    fn delete_task(&self, id: TaskId) -> RepoResult<()> {
        self.inner.delete_task(id)
    }

    fn toggle_timer(&self, id: TaskId, active: bool, now_ms: i64) -> RepoResult<Task> {
        self.inner.toggle_timer(id, active, now_ms)
    }

    fn seed_defaults(&self) -> RepoResult<usize> {
        self.inner.seed_defaults()
    }
}

#[test]
fn overflowing_create_is_resolved_from_personal_time() {
    let conn = open_db_in_memory().unwrap();
    let service = seeded_service(&conn);

    let review = expect_review(service.submit(create("Reading", 1.0)).unwrap());

    assert_eq!(review.overflow_hours(), 1.0);
    assert_eq!(review.proposals().len(), 1);
    let proposal = &review.proposals()[0];
    assert_eq!(proposal.task_id, PERSONAL_TIME);
    assert_eq!(proposal.old_duration, 3.5);
    assert_eq!(proposal.new_duration, 2.5);
    assert!(review.is_resolved());
    assert_eq!(service.list_tasks().unwrap().len(), 9, "review writes nothing");

    let report = service.apply(review);

    assert!(report.failed.is_empty());
    assert_eq!(report.applied.len(), 1);
    assert_eq!(report.applied[0].duration, 2.5);
    let created = expect_committed(report.outcome.unwrap());
    assert_eq!(created.name, "Reading");

    let tasks = service.list_tasks().unwrap();
    assert_eq!(tasks.len(), 10);
    assert_eq!(total_duration(&tasks), DAY_HOURS);
}

#[test]
fn create_within_budget_commits_directly() {
    let conn = open_db_in_memory().unwrap();
    let service = seeded_service(&conn);
    service.delete_task(EXERCISE).unwrap();

    let created = expect_committed(service.submit(create("Reading", 1.0)).unwrap());

    assert_eq!(created.duration, 1.0);
    assert_eq!(total_duration(&service.list_tasks().unwrap()), DAY_HOURS);
}

#[test]
fn growing_a_task_never_proposes_cutting_that_task() {
    let conn = open_db_in_memory().unwrap();
    let service = seeded_service(&conn);

    let edit = PendingEdit::Update {
        id: PERSONAL_TIME,
        patch: TaskPatch::duration(6.5),
    };
    let review = expect_review(service.submit(edit).unwrap());

    assert_eq!(review.overflow_hours(), 3.0);
    let targets: Vec<(TaskId, f64)> = review
        .proposals()
        .iter()
        .map(|p| (p.task_id, p.new_duration))
        .collect();
    assert_eq!(targets, vec![(EXERCISE, 0.5), (PROJECT_WORK, 1.5)]);

    let report = service.apply(review);
    let updated = expect_committed(report.outcome.unwrap());
    assert_eq!(updated.id, PERSONAL_TIME);
    assert_eq!(updated.duration, 6.5);
    assert_eq!(total_duration(&service.list_tasks().unwrap()), DAY_HOURS);
}

#[test]
fn edited_task_is_excluded_even_when_most_flexible_remaining() {
    let conn = open_db_in_memory().unwrap();
    let service = seeded_service(&conn);

    let edit = PendingEdit::Update {
        id: LEETCODE,
        patch: TaskPatch::duration(4.0),
    };
    let review = expect_review(service.submit(edit).unwrap());

    assert!(review.proposals().iter().all(|p| p.task_id != LEETCODE));
    assert_eq!(review.proposals()[0].task_id, PERSONAL_TIME);
    assert_eq!(review.proposals()[0].new_duration, 1.5);
}

#[test]
fn applying_an_empty_selection_asks_again() {
    let conn = open_db_in_memory().unwrap();
    let service = seeded_service(&conn);

    let mut review = expect_review(service.submit(create("Reading", 1.0)).unwrap());
    review.deselect_all();
    assert_eq!(review.residual_overflow(), 1.0);
    assert!(!review.is_resolved());

    let report = service.apply(review);

    assert!(report.applied.is_empty());
    assert!(report.failed.is_empty());
    let again = expect_review(report.outcome.unwrap());
    assert_eq!(again.overflow_hours(), 1.0);
    assert_eq!(duration_of(&service, PERSONAL_TIME), 3.5);
    assert_eq!(service.list_tasks().unwrap().len(), 9);
}

#[test]
fn selection_helpers_track_the_residual() {
    let conn = open_db_in_memory().unwrap();
    let service = seeded_service(&conn);

    let mut review = expect_review(service.submit(create("Reading", 4.0)).unwrap());
    let ids: Vec<TaskId> = review.proposals().iter().map(|p| p.task_id).collect();
    assert_eq!(ids, vec![PERSONAL_TIME, EXERCISE, PROJECT_WORK]);

    assert!(review.toggle(EXERCISE));
    assert_eq!(review.selected_reduction(), 3.5);
    assert_eq!(review.residual_overflow(), 0.5);

    assert!(review.set_selected(EXERCISE, true));
    assert!(review.is_resolved());
    assert!(!review.toggle(SLEEPING));
    assert!(!review.set_selected(99, false));

    review.deselect_all();
    assert_eq!(review.selected_reduction(), 0.0);
    review.select_all();
    assert_eq!(review.selected_reduction(), 4.0);
}

#[test]
fn deleted_target_is_reported_and_the_rest_still_applies() {
    let conn = open_db_in_memory().unwrap();
    let service = seeded_service(&conn);

    let review = expect_review(service.submit(create("Reading", 4.0)).unwrap());
    service.delete_task(EXERCISE).unwrap();

    let report = service.apply(review);

    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].proposal.task_id, EXERCISE);
    assert_eq!(report.failed[0].reason, AdjustmentFailureReason::NotFound);
    let applied: Vec<TaskId> = report.applied.iter().map(|t| t.id).collect();
    assert_eq!(applied, vec![PERSONAL_TIME, PROJECT_WORK]);
    expect_committed(report.outcome.unwrap());
    assert!(total_duration(&service.list_tasks().unwrap()) <= DAY_HOURS);
}

#[test]
fn write_failure_is_collected_without_aborting_the_batch() {
    let conn = open_db_in_memory().unwrap();
    let repo = FailingRepo {
        inner: SqliteTaskRepository::try_new(&conn).unwrap(),
        fail_id: PERSONAL_TIME,
    };
    let service = ScheduleService::new(repo);
    service.seed_defaults().unwrap();

    let review = expect_review(service.submit(create("Reading", 4.0)).unwrap());
    let report = service.apply(review);

    assert_eq!(report.failed.len(), 1);
    match &report.failed[0].reason {
        AdjustmentFailureReason::Write(message) => assert!(message.contains("disk full")),
        other => panic!("unexpected reason: {other:?}"),
    }
    assert_eq!(report.applied.len(), 2);
    assert_eq!(duration_of(&service, EXERCISE), 0.5);
    assert_eq!(duration_of(&service, PROJECT_WORK), 3.5);

    let again = expect_review(report.outcome.unwrap());
    assert_eq!(again.overflow_hours(), 3.0);
    assert_eq!(service.list_tasks().unwrap().len(), 9);
}

#[test]
fn cancel_hands_back_the_pending_edit() {
    let conn = open_db_in_memory().unwrap();
    let service = seeded_service(&conn);
    let edit = create("Reading", 2.0);

    let review = expect_review(service.submit(edit.clone()).unwrap());
    assert_eq!(review.pending(), &edit);

    assert_eq!(review.cancel(), edit);
    assert_eq!(duration_of(&service, PERSONAL_TIME), 3.5);
}

#[test]
fn insufficient_slack_leaves_a_residual_and_a_new_review() {
    let conn = open_db_in_memory().unwrap();
    let service = seeded_service(&conn);

    let review = expect_review(service.submit(create("Marathon", 24.0)).unwrap());
    assert_eq!(review.selected_reduction(), 19.5);
    assert_eq!(review.residual_overflow(), 4.5);
    assert!(!review.is_resolved());

    let report = service.apply(review);

    assert!(report.failed.is_empty());
    let again = expect_review(report.outcome.unwrap());
    assert_eq!(again.overflow_hours(), 4.5);
    assert!(again.proposals().is_empty());
    assert!(service
        .list_tasks()
        .unwrap()
        .iter()
        .all(|task| task.duration == 0.5));
}

#[test]
fn rename_on_a_full_day_commits() {
    let conn = open_db_in_memory().unwrap();
    let service = seeded_service(&conn);

    let edit = PendingEdit::Update {
        id: SLEEPING,
        patch: TaskPatch {
            name: Some("Sleep".to_string()),
            ..TaskPatch::default()
        },
    };
    let renamed = expect_committed(service.submit(edit).unwrap());

    assert_eq!(renamed.name, "Sleep");
    assert_eq!(renamed.duration, 8.0);
}

#[test]
fn shrinking_a_task_commits_directly() {
    let conn = open_db_in_memory().unwrap();
    let service = seeded_service(&conn);

    let edit = PendingEdit::Update {
        id: PROJECT_WORK,
        patch: TaskPatch::duration(2.0),
    };
    expect_committed(service.submit(edit).unwrap());

    assert_eq!(total_duration(&service.list_tasks().unwrap()), 22.0);
}

#[test]
fn invalid_edits_are_rejected_before_any_write() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteTaskRepository::try_new(&conn).unwrap();
    let service = ScheduleService::with_palette(repo, vec!["#9CA3AF".to_string()]);

    let off_palette = PendingEdit::Create(TaskDraft::new("Reading", 8.0, 1.0, "#8B5CF6"));
    assert!(matches!(
        service.submit(off_palette),
        Err(ScheduleError::Validation(
            TaskValidationError::ColorNotInPalette(_)
        ))
    ));

    assert!(matches!(
        service.submit(create("Reading", 0.25)),
        Err(ScheduleError::Validation(
            TaskValidationError::DurationOutOfRange(_)
        ))
    ));
    assert!(matches!(
        service.submit(create("Reading", 1.25)),
        Err(ScheduleError::Validation(
            TaskValidationError::DurationOffGrid(_)
        ))
    ));
    assert!(matches!(
        service.submit(create("  ", 1.0)),
        Err(ScheduleError::Validation(TaskValidationError::BlankName))
    ));

    assert!(service.list_tasks().unwrap().is_empty());
}

#[test]
fn editing_a_missing_task_reports_not_found() {
    let conn = open_db_in_memory().unwrap();
    let service = seeded_service(&conn);

    let edit = PendingEdit::Update {
        id: 99,
        patch: TaskPatch::duration(1.0),
    };
    assert!(matches!(
        service.submit(edit),
        Err(ScheduleError::TaskNotFound(99))
    ));
    assert!(matches!(
        service.delete_task(99),
        Err(ScheduleError::TaskNotFound(99))
    ));
}

#[test]
fn committed_edits_conserve_the_day_for_every_overflow() {
    for half_hours in 1..=12 {
        let conn = open_db_in_memory().unwrap();
        let service = seeded_service(&conn);
        let duration = f64::from(half_hours) * 0.5;

        let review = expect_review(service.submit(create("Extra", duration)).unwrap());
        assert!(review.is_resolved(), "duration {duration}");

        let report = service.apply(review);
        expect_committed(report.outcome.unwrap());
        assert_eq!(total_duration(&service.list_tasks().unwrap()), DAY_HOURS);
    }
}

#[test]
fn timers_toggle_through_the_service() {
    let conn = open_db_in_memory().unwrap();
    let service = seeded_service(&conn);

    service.toggle_timer_at(LEETCODE, true, 1_000).unwrap();
    let switched = service.toggle_timer_at(EXERCISE, true, 2_000).unwrap();
    assert_eq!(switched.elapsed_ms(5_000), 3_000);
    assert!(!service.get_task(LEETCODE).unwrap().unwrap().is_timer_active);

    let stopped = service.toggle_timer(EXERCISE, false).unwrap();
    assert!(!stopped.is_timer_active);
    assert!(matches!(
        service.toggle_timer(99, true),
        Err(ScheduleError::TaskNotFound(99))
    ));
}
