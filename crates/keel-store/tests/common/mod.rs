use std::path::{Path, PathBuf};
use std::sync::Arc;

use keel_core::{ManagedObjectContext, ManagedObjectModel, PersistentStoreCoordinator};
use keel_store::SqlitePersistentStore;
use rusqlite::Connection;
use tempfile::TempDir;

/// Path of a file under tests/fixtures
#[allow(dead_code)]
pub fn fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

/// The library schema at `version`, or its current version
#[allow(dead_code)]
pub fn library_model(version: Option<&str>) -> Arc<ManagedObjectModel> {
    Arc::new(ManagedObjectModel::from_file(fixture("library.xml"), version).unwrap())
}

/// Temporary directory and a database path inside it
#[allow(dead_code)]
pub fn temp_db() -> (TempDir, PathBuf) {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let path = dir.path().join("library.db");
    (dir, path)
}

/// Context over `model` with one SQLite store at `path`
#[allow(dead_code)]
pub fn context_for(model: Arc<ManagedObjectModel>, path: &Path) -> ManagedObjectContext {
    let mut coordinator = PersistentStoreCoordinator::new(model);
    let store = SqlitePersistentStore::new(path.to_string_lossy());
    assert!(coordinator.add_persistent_store(Box::new(store)).unwrap());
    ManagedObjectContext::new(coordinator)
}

/// Context over the current library model with one SQLite store at `path`
#[allow(dead_code)]
pub fn library_context(path: &Path) -> ManagedObjectContext {
    context_for(library_model(None), path)
}

/// Separate connection for checking what a store wrote
#[allow(dead_code)]
pub fn inspect(path: &Path) -> Connection {
    Connection::open(path).expect("Failed to open database")
}

/// Helper to get all user table names
#[allow(dead_code)]
pub fn get_table_names(conn: &Connection) -> Vec<String> {
    let mut stmt = conn
        .prepare(
            "SELECT name FROM sqlite_master WHERE type='table' \
             AND name NOT LIKE 'sqlite_%' ORDER BY name",
        )
        .unwrap();
    stmt.query_map([], |row| row.get(0))
        .unwrap()
        .collect::<Result<Vec<String>, _>>()
        .unwrap()
}

#[allow(dead_code)]
pub fn count_rows(conn: &Connection, table: &str) -> i64 {
    conn.query_row(&format!("SELECT COUNT(*) FROM \"{}\"", table), [], |row| {
        row.get(0)
    })
    .unwrap()
}

/// Join table and column names of `Entity.relationship`
#[allow(dead_code)]
pub fn join_names(model: &ManagedObjectModel, path: &str) -> (String, String, String) {
    let relationship = model
        .attribute_with_path(path)
        .and_then(|a| a.as_relationship())
        .unwrap_or_else(|| panic!("no relationship at {path}"));
    (
        relationship.table_name().unwrap(),
        relationship.column_name().unwrap(),
        relationship.inverse_column_name().unwrap(),
    )
}

/// (column, inverse column) pairs of every link row of `Entity.relationship`
#[allow(dead_code)]
pub fn link_rows(conn: &Connection, model: &ManagedObjectModel, path: &str) -> Vec<(i64, i64)> {
    let (table, column, inverse) = join_names(model, path);
    let mut stmt = conn
        .prepare(&format!(
            "SELECT \"{column}\", \"{inverse}\" FROM \"{table}\" ORDER BY \"objectID\""
        ))
        .unwrap();
    stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?)))
        .unwrap()
        .collect::<Result<Vec<_>, _>>()
        .unwrap()
}
