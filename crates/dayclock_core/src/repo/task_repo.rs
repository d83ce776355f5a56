//! Task repository contract and SQLite implementation.
//!
//! # Responsibility
//! - Provide create/read/update/delete and timer toggling by numeric id.
//! - Keep SQL details inside the persistence boundary.
//!
//! # Invariants
//! - Write paths validate input before SQL mutations.
//! - Read paths reject invalid persisted rows instead of masking them.
//! - At most one row has `is_timer_active = 1` after any call returns.

use crate::db::migrations::{latest_version, schema_version};
use crate::db::DbError;
use crate::model::schedule::default_schedule;
use crate::model::task::{Task, TaskDraft, TaskId, TaskPatch, TaskValidationError};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::error::Error;
use std::fmt::{Display, Formatter};

const TASK_SELECT_SQL: &str = "SELECT
    id,
    name,
    start_time,
    duration,
    color,
    is_timer_active,
    timer_started_at
FROM tasks";

const NOW_MS_SQL: &str = "(strftime('%s', 'now') * 1000)";

pub type RepoResult<T> = Result<T, RepoError>;

/// Error for task persistence and query operations.
#[derive(Debug)]
pub enum RepoError {
    Validation(TaskValidationError),
    Db(DbError),
    NotFound(TaskId),
    InvalidData(String),
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
    MissingRequiredTable(&'static str),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::Db(err) => write!(f, "{err}"),
            Self::NotFound(id) => write!(f, "task not found: {id}"),
            Self::InvalidData(message) => write!(f, "invalid persisted task data: {message}"),
            Self::UninitializedConnection {
                expected_version,
                actual_version,
            } => write!(
                f,
                "connection schema version {actual_version} does not match expected {expected_version}; open it with open_db"
            ),
            Self::MissingRequiredTable(table) => write!(f, "required table `{table}` is missing"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<TaskValidationError> for RepoError {
    fn from(value: TaskValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Store interface consumed by the schedule workflow.
pub trait TaskRepository {
    /// All tasks, ordered by id.
    fn list_tasks(&self) -> RepoResult<Vec<Task>>;
    fn get_task(&self, id: TaskId) -> RepoResult<Option<Task>>;
    fn create_task(&self, draft: &TaskDraft) -> RepoResult<Task>;
    /// Applies the present fields of `patch`. `NotFound` when `id` is absent.
    fn update_task(&self, id: TaskId, patch: &TaskPatch) -> RepoResult<Task>;
    /// Persists a new duration for one task. `NotFound` when `id` is absent.
    fn set_duration(&self, id: TaskId, duration: f64) -> RepoResult<Task> {
        self.update_task(id, &TaskPatch::duration(duration))
    }
    fn delete_task(&self, id: TaskId) -> RepoResult<()>;
    /// Starts or stops the timer of `id`. Starting stops every other timer.
    fn toggle_timer(&self, id: TaskId, active: bool, now_ms: i64) -> RepoResult<Task>;
    /// Inserts the starter day when the store is empty; returns inserted rows.
    fn seed_defaults(&self) -> RepoResult<usize>;
}

/// SQLite-backed task repository.
pub struct SqliteTaskRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteTaskRepository<'conn> {
    /// Wraps a connection returned by `open_db`/`open_db_in_memory`.
    ///
    /// Rejects connections whose schema was not migrated by this binary.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        let actual_version = schema_version(conn)?;
        let expected_version = latest_version();
        if actual_version != expected_version {
            return Err(RepoError::UninitializedConnection {
                expected_version,
                actual_version,
            });
        }

        let has_tasks: bool = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = 'tasks');",
            [],
            |row| row.get(0),
        )?;
        if !has_tasks {
            return Err(RepoError::MissingRequiredTable("tasks"));
        }

        Ok(Self { conn })
    }
}

impl TaskRepository for SqliteTaskRepository<'_> {
    fn list_tasks(&self) -> RepoResult<Vec<Task>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{TASK_SELECT_SQL} ORDER BY id ASC;"))?;
        let mut rows = stmt.query([])?;
        let mut tasks = Vec::new();
        while let Some(row) = rows.next()? {
            tasks.push(parse_task_row(row)?);
        }
        Ok(tasks)
    }

    fn get_task(&self, id: TaskId) -> RepoResult<Option<Task>> {
        fetch_task(self.conn, id)
    }

    fn create_task(&self, draft: &TaskDraft) -> RepoResult<Task> {
        draft.validate()?;
        let id = insert_task(self.conn, draft)?;
        fetch_task(self.conn, id)?.ok_or(RepoError::NotFound(id))
    }

    fn update_task(&self, id: TaskId, patch: &TaskPatch) -> RepoResult<Task> {
        patch.validate()?;

        if !patch.is_empty() {
            let changed = self.conn.execute(
                &format!(
                    "UPDATE tasks
                     SET
                        name = COALESCE(?1, name),
                        start_time = COALESCE(?2, start_time),
                        duration = COALESCE(?3, duration),
                        color = COALESCE(?4, color),
                        updated_at = {NOW_MS_SQL}
                     WHERE id = ?5;"
                ),
                params![
                    patch.name.as_deref().map(str::trim),
                    patch.start_time,
                    patch.duration,
                    patch.color.as_deref(),
                    id,
                ],
            )?;
            if changed == 0 {
                return Err(RepoError::NotFound(id));
            }
        }

        fetch_task(self.conn, id)?.ok_or(RepoError::NotFound(id))
    }

    fn delete_task(&self, id: TaskId) -> RepoResult<()> {
        let changed = self
            .conn
            .execute("DELETE FROM tasks WHERE id = ?1;", [id])?;
        if changed == 0 {
            return Err(RepoError::NotFound(id));
        }
        Ok(())
    }

    fn toggle_timer(&self, id: TaskId, active: bool, now_ms: i64) -> RepoResult<Task> {
        let tx = self.conn.unchecked_transaction()?;

        if fetch_task(&tx, id)?.is_none() {
            return Err(RepoError::NotFound(id));
        }

        if active {
            tx.execute(
                "UPDATE tasks
                 SET is_timer_active = 0, timer_started_at = NULL
                 WHERE is_timer_active = 1;",
                [],
            )?;
        }

        tx.execute(
            &format!(
                "UPDATE tasks
                 SET
                    is_timer_active = ?1,
                    timer_started_at = ?2,
                    updated_at = {NOW_MS_SQL}
                 WHERE id = ?3;"
            ),
            params![bool_to_int(active), active.then_some(now_ms), id],
        )?;

        let task = fetch_task(&tx, id)?.ok_or(RepoError::NotFound(id))?;
        tx.commit()?;
        Ok(task)
    }

    fn seed_defaults(&self) -> RepoResult<usize> {
        let tx = self.conn.unchecked_transaction()?;

        let existing: i64 = tx.query_row("SELECT COUNT(*) FROM tasks;", [], |row| row.get(0))?;
        if existing > 0 {
            return Ok(0);
        }

        let drafts = default_schedule();
        for draft in &drafts {
            draft.validate()?;
            insert_task(&tx, draft)?;
        }
        tx.commit()?;
        Ok(drafts.len())
    }
}

fn insert_task(conn: &Connection, draft: &TaskDraft) -> RepoResult<TaskId> {
    conn.execute(
        "INSERT INTO tasks (name, start_time, duration, color, is_timer_active, timer_started_at)
         VALUES (?1, ?2, ?3, ?4, 0, NULL);",
        params![
            draft.name.trim(),
            draft.start_time,
            draft.duration,
            draft.color.as_str(),
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

fn fetch_task(conn: &Connection, id: TaskId) -> RepoResult<Option<Task>> {
    let mut stmt = conn.prepare(&format!("{TASK_SELECT_SQL} WHERE id = ?1;"))?;
    let row = stmt
        .query_row([id], |row| Ok(parse_task_row(row)))
        .optional()?;
    row.transpose()
}

fn parse_task_row(row: &Row<'_>) -> RepoResult<Task> {
    let id: TaskId = row.get("id")?;

    let is_timer_active = match row.get::<_, i64>("is_timer_active")? {
        0 => false,
        1 => true,
        other => {
            return Err(RepoError::InvalidData(format!(
                "invalid is_timer_active value `{other}` in tasks.is_timer_active for id {id}"
            )));
        }
    };

    let task = Task {
        id,
        name: row.get("name")?,
        start_time: row.get("start_time")?,
        duration: row.get("duration")?,
        color: row.get("color")?,
        is_timer_active,
        timer_started_at: row.get("timer_started_at")?,
    };
    task.validate()
        .map_err(|err| RepoError::InvalidData(format!("task {id}: {err}")))?;
    Ok(task)
}

fn bool_to_int(value: bool) -> i64 {
    if value {
        1
    } else {
        0
    }
}
