//! Database connection management
//!
//! Provides utilities for opening and configuring SQLite connections

#![allow(clippy::result_large_err)]

use crate::config::StoreConfig;
use crate::errors::{from_rusqlite, Result};
use rusqlite::Connection;
use std::path::Path;

/// Open a SQLite database at the given path
pub fn open<P: AsRef<Path>>(path: P) -> Result<Connection> {
    Connection::open(path).map_err(from_rusqlite)
}

/// Open an in-memory SQLite database
pub fn open_in_memory() -> Result<Connection> {
    Connection::open_in_memory().map_err(from_rusqlite)
}

/// Open and configure the database a store config points at
pub fn open_config(config: &StoreConfig) -> Result<Connection> {
    let conn = if config.is_in_memory() {
        open_in_memory()?
    } else {
        open(&config.url)?
    };
    configure(&conn, config)?;
    Ok(conn)
}

/// Apply the connection pragmas of a store config
pub fn configure(conn: &Connection, config: &StoreConfig) -> Result<()> {
    conn.pragma_update(None, "foreign_keys", config.foreign_keys)
        .map_err(from_rusqlite)?;

    // journal_mode answers with the resulting mode, so it must be read back
    if let Some(mode) = &config.journal_mode {
        if !config.is_in_memory() {
            let applied: String = conn
                .pragma_update_and_check(None, "journal_mode", mode, |row| row.get(0))
                .map_err(from_rusqlite)?;
            tracing::debug!(requested = %mode, applied = %applied, "Journal mode set");
        }
    }

    Ok(())
}
