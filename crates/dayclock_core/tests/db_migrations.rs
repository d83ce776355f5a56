use dayclock_core::db::migrations::{latest_version, schema_version};
use dayclock_core::db::{open_db, open_db_in_memory, DbError};
use rusqlite::Connection;

#[test]
fn open_db_in_memory_applies_all_migrations() {
    let conn = open_db_in_memory().unwrap();

    assert_eq!(latest_version(), 2);
    assert_eq!(schema_version(&conn).unwrap(), latest_version());
    assert_table_exists(&conn, "tasks");
    assert_index_exists(&conn, "idx_tasks_single_active_timer");
}

#[test]
fn opening_same_database_twice_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("dayclock.sqlite3");

    let conn_first = open_db(&path).unwrap();
    assert_eq!(schema_version(&conn_first).unwrap(), latest_version());
    conn_first
        .execute(
            "INSERT INTO tasks (name, start_time, duration, color) VALUES ('Reading', 8, 1, '#9CA3AF');",
            [],
        )
        .unwrap();
    drop(conn_first);

    let conn_second = open_db(&path).unwrap();
    assert_eq!(schema_version(&conn_second).unwrap(), latest_version());
    let count: i64 = conn_second
        .query_row("SELECT COUNT(*) FROM tasks;", [], |row| row.get(0))
        .unwrap();
    assert_eq!(count, 1);
}

#[test]
fn open_db_creates_missing_parent_directories() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("deeper").join("day.sqlite3");

    open_db(&path).unwrap();

    assert!(path.exists());
}

#[test]
fn opening_database_with_newer_schema_version_returns_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("future.sqlite3");

    let conn = Connection::open(&path).unwrap();
    conn.execute_batch("PRAGMA user_version = 999;").unwrap();
    drop(conn);

    let err = open_db(&path).unwrap_err();
    match err {
        DbError::UnsupportedSchemaVersion {
            db_version,
            latest_supported,
        } => {
            assert_eq!(db_version, 999);
            assert_eq!(latest_supported, latest_version());
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn schema_rejects_out_of_range_rows() {
    let conn = open_db_in_memory().unwrap();

    let short = conn.execute(
        "INSERT INTO tasks (name, start_time, duration, color) VALUES ('Nap', 1, 0.25, '#9CA3AF');",
        [],
    );
    assert!(short.is_err());

    let late = conn.execute(
        "INSERT INTO tasks (name, start_time, duration, color) VALUES ('Nap', 24, 1, '#9CA3AF');",
        [],
    );
    assert!(late.is_err());
}

#[test]
fn schema_allows_only_one_active_timer() {
    let conn = open_db_in_memory().unwrap();
    conn.execute_batch(
        "INSERT INTO tasks (name, start_time, duration, color, is_timer_active, timer_started_at)
         VALUES ('A', 0, 1, '#9CA3AF', 1, 1000);
         INSERT INTO tasks (name, start_time, duration, color) VALUES ('B', 1, 1, '#9CA3AF');",
    )
    .unwrap();

    let second_active = conn.execute(
        "UPDATE tasks SET is_timer_active = 1, timer_started_at = 2000 WHERE name = 'B';",
        [],
    );
    assert!(second_active.is_err());
}

fn assert_table_exists(conn: &Connection, table_name: &str) {
    assert_schema_object(conn, "table", table_name);
}

fn assert_index_exists(conn: &Connection, index_name: &str) {
    assert_schema_object(conn, "index", index_name);
}

fn assert_schema_object(conn: &Connection, kind: &str, name: &str) {
    let exists: i64 = conn
        .query_row(
            "SELECT EXISTS(
                SELECT 1
                FROM sqlite_master
                WHERE type = ?1 AND name = ?2
            );",
            [kind, name],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(exists, 1, "{kind} {name} does not exist");
}
