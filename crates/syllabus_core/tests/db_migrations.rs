use rusqlite::Connection;
use syllabus_core::db::migrations::latest_version;
use syllabus_core::db::{open_db, open_db_in_memory, DbError};
use syllabus_core::HierarchyLevel;

#[test]
fn open_db_in_memory_applies_all_migrations() {
    let conn = open_db_in_memory().unwrap();

    assert_eq!(schema_version(&conn), latest_version());
    for level in HierarchyLevel::ALL {
        assert_table_exists(&conn, level.table());
    }
    assert_table_exists(&conn, "profiles");
    assert_table_exists(&conn, "sessions");
}

#[test]
fn opening_same_database_twice_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("syllabus.sqlite3");

    let conn_first = open_db(&path).unwrap();
    assert_eq!(schema_version(&conn_first), latest_version());
    drop(conn_first);

    let conn_second = open_db(&path).unwrap();
    assert_eq!(schema_version(&conn_second), latest_version());
    assert_table_exists(&conn_second, "formula_cards");
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
fn foreign_keys_are_enforced_on_open() {
    let conn = open_db_in_memory().unwrap();
    let enabled: i64 = conn
        .query_row("PRAGMA foreign_keys;", [], |row| row.get(0))
        .unwrap();
    assert_eq!(enabled, 1);

    let orphan = conn.execute(
        "INSERT INTO subjects (id, parent_id, name, slug, position)
         VALUES ('7b0c7a52-5c2e-4d8e-9d9a-3f1f1f1f1f1f', 'missing', 'Physics', 'physics', 0);",
        [],
    );
    assert!(orphan.is_err());
}

#[test]
fn slug_is_unique_per_table_only() {
    let conn = open_db_in_memory().unwrap();
    conn.execute(
        "INSERT INTO exams (id, parent_id, name, slug, position)
         VALUES ('00000000-0000-4000-8000-000000000001', NULL, 'JEE', 'jee', 0);",
        [],
    )
    .unwrap();

    let duplicate = conn.execute(
        "INSERT INTO exams (id, parent_id, name, slug, position)
         VALUES ('00000000-0000-4000-8000-000000000002', NULL, 'JEE Main', 'jee', 1);",
        [],
    );
    assert!(duplicate.is_err());

    conn.execute(
        "INSERT INTO subjects (id, parent_id, name, slug, position)
         VALUES ('00000000-0000-4000-8000-000000000003',
                 '00000000-0000-4000-8000-000000000001', 'JEE', 'jee', 0);",
        [],
    )
    .unwrap();
}

#[test]
fn failed_migration_names_the_step_and_keeps_previous_version() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("half-migrated.sqlite3");

    let conn = Connection::open(&path).unwrap();
    conn.execute_batch(
        "CREATE TABLE profiles (id TEXT PRIMARY KEY);
         PRAGMA user_version = 1;",
    )
    .unwrap();
    drop(conn);

    let err = open_db(&path).unwrap_err();
    match &err {
        DbError::MigrationFailed { version, name, .. } => {
            assert_eq!(*version, 2);
            assert_eq!(*name, "identity");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(err.to_string().starts_with("migration 0002_identity failed"));
    assert!(std::error::Error::source(&err).is_some());

    let conn = Connection::open(&path).unwrap();
    assert_eq!(schema_version(&conn), 1);
}

#[test]
fn current_version_without_level_tables_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("hollow.sqlite3");

    let conn = Connection::open(&path).unwrap();
    conn.execute_batch(&format!("PRAGMA user_version = {};", latest_version()))
        .unwrap();
    drop(conn);

    let err = open_db(&path).unwrap_err();
    assert!(matches!(err, DbError::MissingTable("exams")));
}

fn schema_version(conn: &Connection) -> u32 {
    conn.query_row("PRAGMA user_version;", [], |row| row.get(0))
        .unwrap()
}

fn assert_table_exists(conn: &Connection, table_name: &str) {
    let exists: i64 = conn
        .query_row(
            "SELECT EXISTS(
                SELECT 1
                FROM sqlite_master
                WHERE type = 'table' AND name = ?1
            );",
            [table_name],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(exists, 1, "table {table_name} does not exist");
}
