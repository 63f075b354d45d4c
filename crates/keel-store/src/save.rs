//! Writing pending changes of a save request
//!
//! Saving an object writes its row, then flushes its pending relationship
//! changes. Flushing a link first saves the object on the other end, so a
//! save reaches every object connected through pending links. Each link
//! row is written once: while one end flushes, the matching relationship on
//! the other end is marked as already being flushed, and the other end's
//! pending layer is folded when the row is written.

#![allow(clippy::result_large_err)]

use std::collections::HashSet;
use std::sync::Arc;

use keel_core::model::{ManagedObjectModel, RelationshipDescription};
use keel_core::{ObjectGraph, ObjectHandle, RequestId, SaveRequest, OBJECT_ID_COLUMN};
use rusqlite::{params, params_from_iter, Connection};

use crate::codec;
use crate::errors::{from_rusqlite, store_error, Result};
use crate::load;
use crate::schema::quote_ident;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LinkChange {
    Insert,
    Remove,
}

/// State of one save request against one connection
pub struct SaveCascade<'a> {
    conn: &'a Connection,
    model: &'a ManagedObjectModel,
    request_id: RequestId,
    saving: HashSet<ObjectHandle>,
    flushing_inserts: HashSet<(ObjectHandle, String)>,
    flushing_removes: HashSet<(ObjectHandle, String)>,
}

impl<'a> SaveCascade<'a> {
    pub fn new(conn: &'a Connection, model: &'a ManagedObjectModel, request_id: RequestId) -> Self {
        Self {
            conn,
            model,
            request_id,
            saving: HashSet::new(),
            flushing_inserts: HashSet::new(),
            flushing_removes: HashSet::new(),
        }
    }

    /// Inserts, then updates, then deletes; returns every affected object
    pub fn execute(mut self, request: &SaveRequest, graph: &mut ObjectGraph) -> Result<Vec<ObjectHandle>> {
        for handle in request.inserts().iter().chain(request.updates()) {
            self.save_managed_object(graph, *handle)?;
        }
        for handle in request.deletes() {
            self.delete_managed_object(graph, *handle)?;
        }

        Ok(request
            .inserts()
            .iter()
            .chain(request.updates())
            .chain(request.deletes())
            .copied()
            .collect())
    }

    /// Write one object and flush its pending links
    ///
    /// Objects with an unknown id always get a row. Objects already being
    /// saved further up the cascade are skipped.
    pub fn save_managed_object(&mut self, graph: &mut ObjectGraph, handle: ObjectHandle) -> Result<()> {
        let object = graph.get(handle)?;
        if self.saving.contains(&handle)
            || (object.object_id().is_known() && !object.has_changes())
        {
            return Ok(());
        }
        self.saving.insert(handle);

        if object.has_updated_data() || !object.object_id().is_known() {
            self.write_row(graph, handle)?;
        }

        self.flush_links(graph, handle, LinkChange::Insert)?;
        self.flush_links(graph, handle, LinkChange::Remove)?;

        graph.get_mut(handle)?.persist_changes();
        self.saving.remove(&handle);
        Ok(())
    }

    /// Detach an object from everything it links to, then delete its row
    ///
    /// Related objects are not deleted; only the link rows go.
    pub fn delete_managed_object(&mut self, graph: &mut ObjectGraph, handle: ObjectHandle) -> Result<()> {
        graph.get_mut(handle)?.discard_changes();
        self.load_if_fault(graph, handle)?;

        let entity = Arc::clone(graph.get(handle)?.entity());
        for relationship in entity.relationships() {
            let related = graph.get(handle)?.related_objects(relationship.name());
            for other in related {
                self.load_if_fault(graph, other)?;
                graph.remove_object_from_relationship(handle, relationship.name(), other, true)?;
            }
        }

        self.save_managed_object(graph, handle)?;

        if let Some(row_id) = graph.get(handle)?.object_id().row() {
            let sql = format!(
                "DELETE FROM {} WHERE {} = ?1",
                quote_ident(entity.plural()),
                quote_ident(OBJECT_ID_COLUMN)
            );
            self.conn
                .execute(&sql, params![row_id])
                .map_err(from_rusqlite)?;
            tracing::debug!(
                request_id = %self.request_id,
                entity = entity.name(),
                object_id = row_id,
                "Deleted row"
            );
        }
        Ok(())
    }

    fn load_if_fault(&self, graph: &mut ObjectGraph, handle: ObjectHandle) -> Result<()> {
        if graph.get(handle)?.is_fault() {
            load::load_fault(self.conn, self.model, graph, handle)?;
        }
        Ok(())
    }

    fn write_row(&mut self, graph: &mut ObjectGraph, handle: ObjectHandle) -> Result<()> {
        let object = graph.get(handle)?;
        let entity = Arc::clone(object.entity());
        let table = quote_ident(entity.plural());

        let mut columns = Vec::new();
        let mut values = Vec::new();
        for (name, value) in object.updated_data() {
            let property = match entity.property(name) {
                Some(p) => p,
                None => continue,
            };
            columns.push(quote_ident(name));
            values.push(codec::to_sql(property.scalar_type(), value.as_ref()));
        }

        match object.object_id().row() {
            None => {
                let sql = if columns.is_empty() {
                    format!("INSERT INTO {} DEFAULT VALUES", table)
                } else {
                    let placeholders: Vec<String> =
                        (1..=columns.len()).map(|i| format!("?{}", i)).collect();
                    format!(
                        "INSERT INTO {} ({}) VALUES ({})",
                        table,
                        columns.join(", "),
                        placeholders.join(", ")
                    )
                };
                self.conn
                    .execute(&sql, params_from_iter(values))
                    .map_err(from_rusqlite)?;
                let row_id = self.conn.last_insert_rowid();
                graph.assign_object_id(handle, row_id)?;
                tracing::debug!(
                    request_id = %self.request_id,
                    entity = entity.name(),
                    object_id = row_id,
                    "Inserted row"
                );
            }
            Some(row_id) => {
                if columns.is_empty() {
                    return Ok(());
                }
                let assignments: Vec<String> = columns
                    .iter()
                    .enumerate()
                    .map(|(i, c)| format!("{} = ?{}", c, i + 1))
                    .collect();
                let sql = format!(
                    "UPDATE {} SET {} WHERE {} = ?{}",
                    table,
                    assignments.join(", "),
                    quote_ident(OBJECT_ID_COLUMN),
                    columns.len() + 1
                );
                values.push(rusqlite::types::Value::Integer(row_id));
                self.conn
                    .execute(&sql, params_from_iter(values))
                    .map_err(from_rusqlite)?;
                tracing::debug!(
                    request_id = %self.request_id,
                    entity = entity.name(),
                    object_id = row_id,
                    "Updated row"
                );
            }
        }
        Ok(())
    }

    fn flush_links(&mut self, graph: &mut ObjectGraph, owner: ObjectHandle, change: LinkChange) -> Result<()> {
        let object = graph.get(owner)?;
        let entity = Arc::clone(object.entity());
        let pending = match change {
            LinkChange::Insert => object.inserted_relationships(),
            LinkChange::Remove => object.removed_relationships(),
        };
        let names: Vec<String> = pending.keys().cloned().collect();

        for name in names {
            if self.flushing(change).contains(&(owner, name.clone())) {
                continue;
            }
            let relationship = match entity.relationship(&name) {
                Some(r) => r.clone(),
                None => continue,
            };
            let object = graph.get(owner)?;
            let related = match change {
                LinkChange::Insert => object.inserted_relationships().get(&name),
                LinkChange::Remove => object.removed_relationships().get(&name),
            }
            .cloned()
            .unwrap_or_default();

            for other in related {
                let inverse = relationship.inverse().map(|i| i.name.clone());
                if let Some(inverse) = &inverse {
                    self.flushing(change).insert((other, inverse.clone()));
                }

                self.save_managed_object(graph, other)?;
                self.write_link(graph, &relationship, owner, other, change)?;

                if let Some(inverse) = inverse {
                    let other_object = graph.get_mut(other)?;
                    match change {
                        LinkChange::Insert => other_object.did_save_inserted_objects_for(&inverse),
                        LinkChange::Remove => other_object.did_save_removed_objects_for(&inverse),
                    }
                    self.flushing(change).remove(&(other, inverse));
                }
            }
        }
        Ok(())
    }

    fn flushing(&mut self, change: LinkChange) -> &mut HashSet<(ObjectHandle, String)> {
        match change {
            LinkChange::Insert => &mut self.flushing_inserts,
            LinkChange::Remove => &mut self.flushing_removes,
        }
    }

    fn write_link(
        &self,
        graph: &ObjectGraph,
        relationship: &RelationshipDescription,
        owner: ObjectHandle,
        other: ObjectHandle,
        change: LinkChange,
    ) -> Result<()> {
        let row_of = |handle: ObjectHandle| -> Result<i64> {
            let object = graph.get(handle)?;
            object.object_id().row().ok_or_else(|| {
                store_error(
                    "save",
                    format!("{} has no row id while writing a link", object),
                )
            })
        };
        let owner_id = row_of(owner)?;
        let other_id = row_of(other)?;

        let table = quote_ident(&relationship.table_name()?);
        let column = quote_ident(&relationship.column_name()?);
        let inverse_column = quote_ident(&relationship.inverse_column_name()?);
        let sql = match change {
            LinkChange::Insert => format!(
                "INSERT INTO {} ({}, {}) VALUES (?1, ?2)",
                table, column, inverse_column
            ),
            LinkChange::Remove => format!(
                "DELETE FROM {} WHERE {} = ?1 AND {} = ?2",
                table, column, inverse_column
            ),
        };
        self.conn
            .execute(&sql, params![owner_id, other_id])
            .map_err(from_rusqlite)?;

        tracing::debug!(
            request_id = %self.request_id,
            relationship = %format!("{}.{}", relationship.entity(), relationship.name()),
            owner = owner_id,
            other = other_id,
            change = ?change,
            "Link written"
        );
        Ok(())
    }
}
