//! CLI integration tests
//!
//! These run the `keel` binary against a temporary database configured
//! through a keel.toml file in the working directory.

use rusqlite::Connection;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tempfile::TempDir;

fn fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

/// Temp dir holding a keel.toml pointing at the library model and library.db
fn setup_project() -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("library.db");
    let config = format!(
        "model = {:?}\n\n[[stores]]\nurl = {:?}\n",
        fixture("library.xml").to_string_lossy(),
        db_path.to_string_lossy()
    );
    fs::write(temp_dir.path().join("keel.toml"), config).unwrap();
    (temp_dir, db_path)
}

fn keel(dir: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_keel"))
        .current_dir(dir)
        .args(args)
        .output()
        .expect("Failed to execute CLI")
}

fn assert_success(output: &Output) {
    assert!(
        output.status.success(),
        "CLI command should succeed. Stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
}

#[test]
fn test_schema_prints_tables() {
    let (temp_dir, _) = setup_project();

    let output = keel(temp_dir.path(), &["schema"]);

    assert_success(&output);
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Model version 2"));
    assert!(stdout.contains("Shelf (table Shelves)"));
    assert!(stdout.contains("join Z_"));
}

#[test]
fn test_init_creates_structure_once() {
    // Given: a project with an empty database
    let (temp_dir, db_path) = setup_project();

    // When: init runs twice
    let first = keel(temp_dir.path(), &["init"]);
    let second = keel(temp_dir.path(), &["init"]);

    // Then: the first creates the structure, the second finds it
    assert_success(&first);
    assert_success(&second);
    assert!(String::from_utf8_lossy(&first.stdout).contains("Created"));
    assert!(String::from_utf8_lossy(&second.stdout).contains("already at model version 2"));

    let conn = Connection::open(&db_path).unwrap();
    let version: String = conn
        .query_row(
            "SELECT value FROM Z_METADATA WHERE key = 'version'",
            [],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(version, "2");
}

#[test]
fn test_import_then_fetch() {
    // Given: objects imported from an XML document
    let (temp_dir, db_path) = setup_project();
    let books = fixture("books.xml");
    let import = keel(temp_dir.path(), &["import", books.to_str().unwrap()]);
    assert_success(&import);

    let conn = Connection::open(&db_path).unwrap();
    let count: i64 = conn
        .query_row("SELECT COUNT(*) FROM Books", [], |row| row.get(0))
        .unwrap();
    assert_eq!(count, 2);

    // When: long books are fetched
    let fetch = keel(
        temp_dir.path(),
        &["fetch", "Book", "--where", "\"pages\" > 200"],
    );

    // Then: the JSON lists one loaded book with its links
    assert_success(&fetch);
    let json: serde_json::Value = serde_json::from_slice(&fetch.stdout).unwrap();
    let objects = json.as_array().unwrap();
    assert_eq!(objects.len(), 1);
    let book = &objects[0];
    assert_eq!(book["entity"], "Book");
    assert_eq!(book["properties"]["title"], "The Dispossessed");
    assert_eq!(book["properties"]["inPrint"], true);
    assert_eq!(book["relationships"]["author"].as_array().unwrap().len(), 1);
    assert_eq!(book["relationships"]["tags"].as_array().unwrap().len(), 1);
}

#[test]
fn test_db_flag_overrides_config() {
    let (temp_dir, db_path) = setup_project();
    let other = temp_dir.path().join("other.db");

    let output = keel(temp_dir.path(), &["init", "--db", other.to_str().unwrap()]);

    assert_success(&output);
    assert!(other.exists());
    assert!(!db_path.exists());
}

#[test]
fn test_unknown_entity_fails() {
    let (temp_dir, _) = setup_project();

    let output = keel(temp_dir.path(), &["fetch", "Dragon"]);

    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("Error:"));
}
