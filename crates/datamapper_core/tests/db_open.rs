mod common;

use datamapper_core::db::ensure_tables;
use datamapper_core::{open_db, DbError};

#[test]
fn open_db_creates_file_and_bootstraps_connection() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("app.sqlite3");

    let conn = open_db(&path).unwrap();
    assert!(path.exists());

    let foreign_keys: i64 = conn
        .query_row("PRAGMA foreign_keys", [], |row| row.get(0))
        .unwrap();
    assert_eq!(foreign_keys, 1);

    let matched: bool = conn
        .query_row("SELECT regexp('^Part', 'Part One')", [], |row| row.get(0))
        .unwrap();
    assert!(matched);
}

#[test]
fn ensure_tables_creates_every_registered_table() {
    let dir = tempfile::tempdir().unwrap();
    let mut conn = open_db(dir.path().join("app.sqlite3")).unwrap();
    let builder = common::builder();

    ensure_tables(&mut conn, builder.registry()).unwrap();
    ensure_tables(&mut conn, builder.registry()).unwrap();

    let mut statement = conn
        .prepare("SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name")
        .unwrap();
    let tables = statement
        .query_map([], |row| row.get::<_, String>(0))
        .unwrap()
        .collect::<Result<Vec<_>, _>>()
        .unwrap();
    assert_eq!(tables, vec!["articles", "comments"]);
}

#[test]
fn open_db_in_missing_directory_fails() {
    let dir = tempfile::tempdir().unwrap();
    let err = open_db(dir.path().join("missing").join("app.sqlite3")).unwrap_err();
    assert!(matches!(err, DbError::Sqlite(_)));
}
