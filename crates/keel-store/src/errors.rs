//! Error handling for keel-store
//!
//! Store failures surface as `KeelError::PersistentStore`; these helpers
//! build them with a consistent operation name.

use keel_core::errors::KeelError;

/// Result type alias shared with keel-core
pub type Result<T> = std::result::Result<T, KeelError>;

/// Create a database error from rusqlite::Error
pub fn from_rusqlite(err: rusqlite::Error) -> KeelError {
    KeelError::persistent_store("sqlite", err.to_string())
}

/// Create a store error for the given operation
pub fn store_error(op: &str, message: impl Into<String>) -> KeelError {
    KeelError::persistent_store(op, message)
}

/// Create the error raised when the stored model version differs
pub fn migration_error(stored: &str, model: &str) -> KeelError {
    KeelError::persistent_store(
        "migration",
        format!(
            "Database holds model version '{}' but the model is version '{}': migration not supported",
            stored, model
        ),
    )
}

/// Create the error raised when a row does not match the model
pub fn incompatible_structure(entity: &str, column: &str) -> KeelError {
    KeelError::persistent_store(
        "fault",
        format!(
            "Database structure incompatible with this model version (entity {}, column {})",
            entity, column
        ),
    )
}

/// Create the error raised when a store is used before joining a coordinator
pub fn not_attached(identifier: &str) -> KeelError {
    KeelError::persistent_store(
        "execute_request",
        format!(
            "Persistent store '{}' is not attached to a coordinator",
            identifier
        ),
    )
}
