//! CREATE TABLE statements derived from a model

use keel_core::model::{EntityDescription, RelationshipDescription, ScalarType};
use keel_core::OBJECT_ID_COLUMN;

use super::METADATA_TABLE;
use crate::errors::Result;

/// Double-quote an identifier for SQLite
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Column affinity used for a scalar type
///
/// Dates are stored as Unix seconds.
pub fn column_type(scalar_type: ScalarType) -> &'static str {
    match scalar_type {
        ScalarType::String => "TEXT",
        ScalarType::Integer => "INTEGER",
        ScalarType::Float => "REAL",
        ScalarType::Boolean => "TINYINT",
        ScalarType::Date => "INTEGER",
        ScalarType::Binary => "BLOB",
    }
}

fn primary_key() -> String {
    format!(
        "{} INTEGER PRIMARY KEY AUTOINCREMENT",
        quote_ident(OBJECT_ID_COLUMN)
    )
}

/// Table named by the entity's plural with one column per property
pub fn entity_table_sql(entity: &EntityDescription) -> String {
    let mut columns = vec![primary_key()];
    columns.extend(entity.properties().map(|p| {
        format!("{} {}", quote_ident(p.name()), column_type(p.scalar_type()))
    }));
    format!(
        "CREATE TABLE {} ({})",
        quote_ident(entity.plural()),
        columns.join(", ")
    )
}

/// Join table holding one row per link of a relationship pair
pub fn join_table_sql(relationship: &RelationshipDescription) -> Result<String> {
    Ok(format!(
        "CREATE TABLE {} ({}, {} INTEGER NOT NULL, {} INTEGER NOT NULL)",
        quote_ident(&relationship.table_name()?),
        primary_key(),
        quote_ident(&relationship.column_name()?),
        quote_ident(&relationship.inverse_column_name()?)
    ))
}

pub fn metadata_table_sql() -> String {
    format!(
        "CREATE TABLE {} ({}, \"key\" TEXT NOT NULL UNIQUE, \"value\" TEXT)",
        quote_ident(METADATA_TABLE),
        primary_key()
    )
}
