//! Database structure management
//!
//! A database is stamped with the version of the model that created it.
//! An empty database gets the full structure; a database stamped with a
//! different version is rejected.

#![allow(clippy::result_large_err)]

pub mod ddl;

use std::collections::HashSet;

use keel_core::model::ManagedObjectModel;
use rusqlite::{params, Connection, OptionalExtension};

use crate::errors::{from_rusqlite, migration_error, store_error, Result};

pub use ddl::{column_type, quote_ident};

/// Key/value table holding the model version
pub const METADATA_TABLE: &str = "Z_METADATA";

/// Metadata key of the model version
pub const VERSION_KEY: &str = "version";

/// Model version stamped in the database, or None for a fresh database
pub fn database_version(conn: &Connection) -> Result<Option<String>> {
    let exists: bool = conn
        .query_row(
            "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1)",
            [METADATA_TABLE],
            |row| row.get(0),
        )
        .map_err(from_rusqlite)?;
    if !exists {
        return Ok(None);
    }

    let sql = format!(
        "SELECT \"value\" FROM {} WHERE \"key\" = ?1",
        quote_ident(METADATA_TABLE)
    );
    conn.query_row(&sql, [VERSION_KEY], |row| row.get::<_, Option<String>>(0))
        .optional()
        .map_err(from_rusqlite)
        .map(Option::flatten)
}

/// Create every entity, join and metadata table in one transaction
///
/// Join tables shared by both ends of a relationship are created once.
pub fn create_database_structure(conn: &mut Connection, model: &ManagedObjectModel) -> Result<()> {
    let tx = conn.transaction().map_err(from_rusqlite)?;

    let mut tables: HashSet<String> = HashSet::new();
    for entity in model.entities() {
        if !tables.insert(entity.plural().to_string()) {
            return Err(store_error(
                "create_database_structure",
                format!("Table '{}' is defined by more than one entity", entity.plural()),
            ));
        }
        tx.execute(&ddl::entity_table_sql(entity), [])
            .map_err(from_rusqlite)?;
    }

    let mut join_tables: HashSet<String> = HashSet::new();
    for relationship in model.entities().iter().flat_map(|e| e.relationships()) {
        let table = relationship.table_name()?;
        if tables.contains(&table) {
            return Err(store_error(
                "create_database_structure",
                format!("Join table '{}' collides with an entity table", table),
            ));
        }
        if join_tables.insert(table) {
            tx.execute(&ddl::join_table_sql(relationship)?, [])
                .map_err(from_rusqlite)?;
        }
    }

    tx.execute(&ddl::metadata_table_sql(), [])
        .map_err(from_rusqlite)?;
    tx.execute(
        &format!(
            "INSERT INTO {} (\"key\", \"value\") VALUES (?1, ?2)",
            quote_ident(METADATA_TABLE)
        ),
        params![VERSION_KEY, model.version()],
    )
    .map_err(from_rusqlite)?;

    tx.commit().map_err(from_rusqlite)?;

    tracing::info!(
        version = model.version(),
        entities = model.entities().len(),
        join_tables = join_tables.len(),
        "Database structure created"
    );
    Ok(())
}

/// Bring the database in line with the model
///
/// Creates the structure on a fresh database and accepts a database stamped
/// with the model's version. Anything else goes through `perform_migration`.
pub fn ensure_database_consistency(conn: &mut Connection, model: &ManagedObjectModel) -> Result<()> {
    match database_version(conn)? {
        None => create_database_structure(conn, model),
        Some(stored) if stored == model.version() => Ok(()),
        Some(stored) => perform_migration(&stored, model),
    }
}

/// Migrations between model versions are not supported; the database is
/// left untouched.
pub fn perform_migration(stored: &str, model: &ManagedObjectModel) -> Result<()> {
    tracing::warn!(
        stored = stored,
        model = model.version(),
        "Database model version mismatch"
    );
    Err(migration_error(stored, model.version()))
}
