//! Reading rows into the object graph
//!
//! Fetches materialize faults from row ids; fault loading fills an
//! object's persisted layers from its row and join tables.

#![allow(clippy::result_large_err)]

use std::collections::BTreeMap;
use std::sync::Arc;

use keel_core::model::{EntityDescription, ManagedObjectModel};
use keel_core::{FetchRequest, ObjectGraph, ObjectHandle, ObjectId, OBJECT_ID_COLUMN};
use rusqlite::{params, Connection, OptionalExtension};

use crate::codec;
use crate::errors::{from_rusqlite, incompatible_structure, store_error, Result};
use crate::schema::quote_ident;

/// Faults for every row of the request's entity matching its predicate
pub fn fetch_objects(
    conn: &Connection,
    graph: &mut ObjectGraph,
    request: &FetchRequest,
) -> Result<Vec<ObjectHandle>> {
    let entity = request.entity();
    let mut sql = format!(
        "SELECT {} FROM {}",
        quote_ident(OBJECT_ID_COLUMN),
        quote_ident(entity.plural())
    );
    if let Some(predicate) = request.predicate() {
        sql.push_str(" WHERE ");
        sql.push_str(predicate);
    }

    let mut stmt = conn.prepare(&sql).map_err(from_rusqlite)?;
    let ids = stmt
        .query_map([], |row| row.get::<_, i64>(0))
        .map_err(from_rusqlite)?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(from_rusqlite)?;

    tracing::debug!(entity = entity.name(), rows = ids.len(), "Fetched row ids");

    Ok(ids
        .into_iter()
        .map(|id| graph.new_object_for_entity(entity, ObjectId::Row(id)))
        .collect())
}

/// Fault for a row of `entity`, or None if the row does not exist
pub fn fetch_object_with_object_id(
    conn: &Connection,
    graph: &mut ObjectGraph,
    entity: &Arc<EntityDescription>,
    object_id: i64,
) -> Result<Option<ObjectHandle>> {
    let sql = format!(
        "SELECT {id} FROM {table} WHERE {id} = ?1",
        id = quote_ident(OBJECT_ID_COLUMN),
        table = quote_ident(entity.plural())
    );
    let found = conn
        .query_row(&sql, params![object_id], |row| row.get::<_, i64>(0))
        .optional()
        .map_err(from_rusqlite)?;
    Ok(found.map(|id| graph.new_object_for_entity(entity, ObjectId::Row(id))))
}

/// Load the row and links of a fault
///
/// Returns false when the row no longer exists. Links to rows that are
/// gone are skipped with a warning.
pub fn load_fault(
    conn: &Connection,
    model: &ManagedObjectModel,
    graph: &mut ObjectGraph,
    handle: ObjectHandle,
) -> Result<bool> {
    let object = graph.get(handle)?;
    let entity = Arc::clone(object.entity());
    let row_id = match object.object_id().row() {
        Some(id) => id,
        None => return Ok(false),
    };

    let data = match load_row(conn, &entity, row_id)? {
        Some(data) => data,
        None => {
            tracing::debug!(entity = entity.name(), object_id = row_id, "Fault row missing");
            return Ok(false);
        }
    };

    let mut relationships = BTreeMap::new();
    for relationship in entity.relationships() {
        let sql = format!(
            "SELECT {} FROM {} WHERE {} = ?1 ORDER BY {}",
            quote_ident(&relationship.inverse_column_name()?),
            quote_ident(&relationship.table_name()?),
            quote_ident(&relationship.column_name()?),
            quote_ident(OBJECT_ID_COLUMN)
        );
        let mut stmt = conn.prepare(&sql).map_err(from_rusqlite)?;
        let ids = stmt
            .query_map(params![row_id], |row| row.get::<_, i64>(0))
            .map_err(from_rusqlite)?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(from_rusqlite)?;

        let target = model.entity_with_name(relationship.target()).ok_or_else(|| {
            store_error(
                "fault",
                format!(
                    "[{}.{}] Destination entity '{}' is not part of the model",
                    entity.name(),
                    relationship.name(),
                    relationship.target()
                ),
            )
        })?;

        let mut related = Vec::with_capacity(ids.len());
        for id in ids {
            match fetch_object_with_object_id(conn, graph, target, id)? {
                Some(h) => related.push(h),
                None => tracing::warn!(
                    entity = entity.name(),
                    relationship = relationship.name(),
                    object_id = id,
                    "Linked row not found"
                ),
            }
        }
        relationships.insert(relationship.name().to_string(), related);
    }

    let object = graph.get_mut(handle)?;
    object.set_data(data);
    object.set_relationships(relationships);
    Ok(true)
}

fn load_row(
    conn: &Connection,
    entity: &EntityDescription,
    row_id: i64,
) -> Result<Option<BTreeMap<String, Option<keel_core::Value>>>> {
    let sql = format!(
        "SELECT * FROM {} WHERE {} = ?1 LIMIT 1",
        quote_ident(entity.plural()),
        quote_ident(OBJECT_ID_COLUMN)
    );
    let mut stmt = conn.prepare(&sql).map_err(from_rusqlite)?;
    let columns: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();

    let mut rows = stmt.query(params![row_id]).map_err(from_rusqlite)?;
    let row = match rows.next().map_err(from_rusqlite)? {
        Some(row) => row,
        None => return Ok(None),
    };

    let mut data = BTreeMap::new();
    for (index, column) in columns.iter().enumerate() {
        if column == OBJECT_ID_COLUMN {
            continue;
        }
        let property = entity
            .property(column)
            .ok_or_else(|| incompatible_structure(entity.name(), column))?;
        let raw = row.get_ref(index).map_err(from_rusqlite)?;
        data.insert(property.name().to_string(), codec::from_sql(property, raw)?);
    }
    Ok(Some(data))
}
