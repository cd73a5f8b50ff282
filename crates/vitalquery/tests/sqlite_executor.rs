use std::path::PathBuf;

use rusqlite::Connection;
use vitalquery::models::rows::Cell;
use vitalquery::sqlite::{QueryOutcome, SqlDatabase, SqliteDatabase, list_known_names};

fn temp_db_path(label: &str) -> PathBuf {
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .expect("clock should be after epoch")
        .as_nanos();
    std::env::temp_dir().join(format!("vitalquery-{label}-{nanos}.sqlite"))
}

fn write_fixture(path: &PathBuf) {
    let connection = Connection::open(path).expect("fixture db should open");
    connection
        .execute_batch(
            "CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT NOT NULL);
             CREATE TABLE event (id INTEGER PRIMARY KEY, protectee_id INTEGER, timestamp TEXT, stress INTEGER, hrv REAL);
             CREATE INDEX idx_event_protectee ON event(protectee_id);
             INSERT INTO users (id, name) VALUES (1, '박주연'), (2, '박해름');
             INSERT INTO event (protectee_id, timestamp, stress, hrv) VALUES
                 (1, '2025-08-17 16:35:12', 99, 41.5),
                 (1, '2025-08-18 09:00:00', 40, NULL),
                 (2, '2025-08-18 10:00:00', 99, 55.0),
                 (2, '2025-08-18 11:00:00', 12, 60.25);",
        )
        .expect("fixture should apply");
}

fn open_fixture(label: &str, row_cap: usize) -> (PathBuf, SqliteDatabase) {
    let path = temp_db_path(label);
    write_fixture(&path);
    let database = SqliteDatabase::open_read_only(&path, row_cap).expect("fixture should open");
    (path, database)
}

#[test]
fn tables_are_listed_by_name_without_internal_tables() {
    let (path, database) = open_fixture("list", 100);
    assert_eq!(
        database.list_tables().expect("tables should list"),
        vec!["event".to_string(), "users".to_string()]
    );
    let _ = std::fs::remove_file(path);
}

#[test]
fn table_info_has_ddl_and_sample_block() {
    let (path, database) = open_fixture("info", 100);
    let info = database
        .table_info(&["users".to_string()])
        .expect("users should be described");
    assert_eq!(
        info,
        "CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT NOT NULL)\n\n/*\n3 rows from users table:\nid\tname\n1\t박주연\n2\t박해름\n*/"
    );

    let error = database
        .table_info(&["vitals".to_string()])
        .expect_err("unknown table should fail");
    assert!(error.to_string().contains("vitals"));
    let _ = std::fs::remove_file(path);
}

#[test]
fn query_rows_keep_sqlite_types() {
    let (path, database) = open_fixture("types", 100);
    let outcome = database.run_no_throw(
        "SELECT e.timestamp, e.hrv FROM event e WHERE e.protectee_id = 1 ORDER BY e.timestamp",
    );
    assert_eq!(
        outcome,
        QueryOutcome::Rows(vec![
            vec![Cell::Text("2025-08-17 16:35:12".to_string()), Cell::Real(41.5)],
            vec![Cell::Text("2025-08-18 09:00:00".to_string()), Cell::Null],
        ])
    );
    let _ = std::fs::remove_file(path);
}

#[test]
fn row_cap_limits_returned_rows() {
    let (path, database) = open_fixture("cap", 2);
    match database.run_no_throw("SELECT e.stress FROM event e ORDER BY e.id") {
        QueryOutcome::Rows(rows) => assert_eq!(rows.len(), 2),
        QueryOutcome::Failed(message) => panic!("query should succeed: {message}"),
    }
    let _ = std::fs::remove_file(path);
}

#[test]
fn failures_are_reported_as_error_text() {
    let (path, database) = open_fixture("errors", 100);

    let refused = database.run_no_throw("DELETE FROM event");
    assert_eq!(
        refused.into_tool_content(),
        "Error: Mutating SQL keyword `delete` is not allowed"
    );

    let QueryOutcome::Failed(message) = database.run_no_throw("SELECT e.heart_rate FROM event e")
    else {
        panic!("unknown column should fail");
    };
    assert!(message.starts_with("Error: "));
    assert!(message.contains("heart_rate"));
    let _ = std::fs::remove_file(path);
}

#[test]
fn empty_results_encode_as_empty_array() {
    let (path, database) = open_fixture("empty", 100);
    let outcome = database.run_no_throw("SELECT e.stress FROM event e WHERE e.stress > 500");
    assert_eq!(outcome.into_tool_content(), "[]");
    let _ = std::fs::remove_file(path);
}

#[test]
fn known_names_respect_the_limit() {
    let (path, database) = open_fixture("names", 100);
    assert_eq!(list_known_names(&database, 1), vec!["박주연".to_string()]);
    let _ = std::fs::remove_file(path);
}

#[test]
fn missing_database_file_is_an_error() {
    let error = SqliteDatabase::open_read_only(&temp_db_path("missing"), 10)
        .expect_err("missing file should fail");
    assert!(error.to_string().contains("sqlite database not found"));
}
