//! Managed object context: the caller-facing surface of the engine
//!
//! ## Logging Ownership
//!
//! The context owns lifecycle logging for its operations:
//! - `log_op_start!` at entry
//! - `log_op_end!` on success
//! - `log_op_error!` on failure
//!
//! The graph, coordinator and stores use only `tracing::debug!()` and
//! `tracing::warn!()` for internal details.

#![allow(clippy::result_large_err)]

use std::sync::Arc;
use std::time::Instant;

use crate::coordinator::PersistentStoreCoordinator;
use crate::errors::{KeelError, Result};
use crate::model::{EntityAttribute, EntityDescription, ManagedObjectModel, PropertyDescription, Value};
use crate::object::{ManagedObject, ObjectGraph, ObjectHandle, ObjectId};
use crate::request::{
    FaultRequest, FetchRequest, PersistentStoreRequest, SaveRequest, OBJECT_ID_COLUMN,
};
use crate::{log_op_end, log_op_error, log_op_start};

/// Value of one attribute as seen through `get` / `set`
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeValue {
    /// Property value; `None` is null
    Value(Option<Value>),
    /// To-One relationship
    Object(Option<ObjectHandle>),
    /// To-Many relationship
    Objects(Vec<ObjectHandle>),
}

impl From<Value> for AttributeValue {
    fn from(value: Value) -> Self {
        AttributeValue::Value(Some(value))
    }
}

impl From<ObjectHandle> for AttributeValue {
    fn from(handle: ObjectHandle) -> Self {
        AttributeValue::Object(Some(handle))
    }
}

/// Owns the coordinator and every managed object loaded through it
#[derive(Debug)]
pub struct ManagedObjectContext {
    coordinator: PersistentStoreCoordinator,
    graph: ObjectGraph,
    deleted: Vec<ObjectHandle>,
}

impl ManagedObjectContext {
    pub fn new(coordinator: PersistentStoreCoordinator) -> Self {
        Self {
            coordinator,
            graph: ObjectGraph::new(),
            deleted: Vec::new(),
        }
    }

    pub fn coordinator(&self) -> &PersistentStoreCoordinator {
        &self.coordinator
    }

    pub fn coordinator_mut(&mut self) -> &mut PersistentStoreCoordinator {
        &mut self.coordinator
    }

    pub fn model(&self) -> &Arc<ManagedObjectModel> {
        self.coordinator.model()
    }

    pub fn graph(&self) -> &ObjectGraph {
        &self.graph
    }

    /// Objects scheduled for deletion on the next save
    pub fn deleted_objects(&self) -> &[ObjectHandle] {
        &self.deleted
    }

    /// Entity by name or plural name
    pub fn entity(&self, name: &str) -> Result<Arc<EntityDescription>> {
        self.model()
            .entity_with_name(name)
            .cloned()
            .ok_or_else(|| KeelError::EntityNotFound {
                entity: name.to_string(),
            })
    }

    pub fn object(&self, handle: ObjectHandle) -> Result<&ManagedObject> {
        self.graph.get(handle)
    }

    /// Register an already constructed object
    pub fn insert_object(&mut self, object: ManagedObject) -> ObjectHandle {
        self.graph.insert_object(object)
    }

    pub fn new_object_for_entity(
        &mut self,
        entity: &Arc<EntityDescription>,
        object_id: ObjectId,
    ) -> ObjectHandle {
        self.graph.new_object_for_entity(entity, object_id)
    }

    /// Create a new, not yet inserted, object of the named entity
    pub fn insert_new_object(&mut self, entity: &str) -> Result<ObjectHandle> {
        let entity = self.entity(entity)?;
        Ok(self.graph.new_object_for_entity(&entity, ObjectId::Unknown))
    }

    pub fn is_fault(&self, handle: ObjectHandle) -> Result<bool> {
        Ok(self.graph.get(handle)?.is_fault())
    }

    /// Load a fault's data through the coordinator; no-op for non-faults
    ///
    /// # Errors
    /// Fails with a managed-object error if the store could not resolve it.
    pub fn fire_fault(&mut self, handle: ObjectHandle) -> Result<()> {
        if !self.is_fault(handle)? {
            return Ok(());
        }
        let object = self.graph.get(handle)?.to_string();
        log_op_start!("fire_fault", object = %object);
        let start = Instant::now();

        self.fire_fault_impl(handle).map_err(|e| {
            log_op_error!(
                "fire_fault",
                e.clone(),
                duration_ms = start.elapsed().as_millis() as u64
            );
            e
        })?;

        log_op_end!(
            "fire_fault",
            duration_ms = start.elapsed().as_millis() as u64,
            object = %object
        );
        Ok(())
    }

    fn fire_fault_impl(&mut self, handle: ObjectHandle) -> Result<()> {
        let request = FaultRequest::new(&self.graph, vec![handle])?;
        let failed = self
            .coordinator
            .execute_request(&request.into(), &mut self.graph)?;
        if !failed.is_empty() {
            return Err(KeelError::ManagedObject {
                object: self.graph.get(handle)?.to_string(),
                message: "Error while fetching data for fault".to_string(),
            });
        }
        Ok(())
    }

    /// Read an attribute, firing the fault first
    ///
    /// To-One relationships yield the last effective link.
    pub fn get(&mut self, handle: ObjectHandle, name: &str) -> Result<AttributeValue> {
        self.fire_fault(handle)?;
        let object = self.graph.get(handle)?;
        match lookup_attribute(object, name)? {
            EntityAttribute::Property(property) => Ok(AttributeValue::Value(
                object.value_for_property(property.name()).cloned(),
            )),
            EntityAttribute::Relationship(relationship) => {
                let related = object.related_objects(relationship.name());
                if relationship.is_to_many() {
                    Ok(AttributeValue::Objects(related))
                } else {
                    Ok(AttributeValue::Object(related.last().copied()))
                }
            }
        }
    }

    pub fn value(&mut self, handle: ObjectHandle, name: &str) -> Result<Option<Value>> {
        match self.get(handle, name)? {
            AttributeValue::Value(value) => Ok(value),
            _ => Err(not_a(self.graph.get(handle)?, name, "property")),
        }
    }

    pub fn related_object(&mut self, handle: ObjectHandle, name: &str) -> Result<Option<ObjectHandle>> {
        match self.get(handle, name)? {
            AttributeValue::Object(related) => Ok(related),
            AttributeValue::Objects(related) => Ok(related.last().copied()),
            AttributeValue::Value(_) => Err(not_a(self.graph.get(handle)?, name, "relationship")),
        }
    }

    pub fn related_objects(&mut self, handle: ObjectHandle, name: &str) -> Result<Vec<ObjectHandle>> {
        match self.get(handle, name)? {
            AttributeValue::Objects(related) => Ok(related),
            AttributeValue::Object(related) => Ok(related.into_iter().collect()),
            AttributeValue::Value(_) => Err(not_a(self.graph.get(handle)?, name, "relationship")),
        }
    }

    /// Write an attribute, firing the fault first
    ///
    /// Properties are type-checked into the pending-update layer. A To-One
    /// relationship drops its current link, then links the new object.
    /// To-Many relationships are changed through `add_to_relationship` and
    /// `remove_from_relationship` only.
    pub fn set(&mut self, handle: ObjectHandle, name: &str, value: AttributeValue) -> Result<()> {
        self.fire_fault(handle)?;
        let object = self.graph.get(handle)?;
        match (lookup_attribute(object, name)?.clone(), value) {
            (EntityAttribute::Property(property), AttributeValue::Value(value)) => {
                self.graph.set_value(handle, property.name(), value)
            }
            (EntityAttribute::Relationship(relationship), AttributeValue::Object(target)) => {
                if relationship.is_to_many() {
                    return Err(KeelError::InvalidOperation {
                        object: object.to_string(),
                        message: format!(
                            "Could not set To-Many relationship '{}', use add/remove",
                            relationship.name()
                        ),
                    });
                }
                let current = object.related_objects(relationship.name()).last().copied();
                if current.is_some() && current == target {
                    return Ok(());
                }
                if let Some(current) = current {
                    self.remove_from_relationship(handle, relationship.name(), current)?;
                }
                if let Some(target) = target {
                    self.add_to_relationship(handle, relationship.name(), target)?;
                }
                Ok(())
            }
            (attribute, _) => Err(KeelError::InvalidOperation {
                object: object.to_string(),
                message: format!("Value kind does not match attribute '{}'", attribute.name()),
            }),
        }
    }

    pub fn set_value(&mut self, handle: ObjectHandle, name: &str, value: Option<Value>) -> Result<()> {
        self.set(handle, name, AttributeValue::Value(value))
    }

    /// Link `target` through `relationship`, mirrored onto the inverse
    pub fn add_to_relationship(
        &mut self,
        handle: ObjectHandle,
        relationship: &str,
        target: ObjectHandle,
    ) -> Result<()> {
        self.fire_fault(handle)?;
        self.fire_fault(target)?;
        self.graph
            .add_object_to_relationship(handle, relationship, target, true)
    }

    /// Unlink `target` from `relationship`, mirrored onto the inverse
    pub fn remove_from_relationship(
        &mut self,
        handle: ObjectHandle,
        relationship: &str,
        target: ObjectHandle,
    ) -> Result<()> {
        self.fire_fault(handle)?;
        self.fire_fault(target)?;
        self.graph
            .remove_object_from_relationship(handle, relationship, target, true)
    }

    pub fn has_changes(&self) -> bool {
        !self.deleted.is_empty() || !self.graph.changed_objects().is_empty()
    }

    /// Schedule an object for deletion on the next save
    pub fn delete_object(&mut self, handle: ObjectHandle) -> Result<()> {
        let object = self.graph.get(handle)?.to_string();
        log_op_start!("delete_object", object = %object);
        let start = Instant::now();

        if !self.deleted.contains(&handle) {
            self.deleted.push(handle);
        }

        log_op_end!(
            "delete_object",
            duration_ms = start.elapsed().as_millis() as u64,
            object = %object
        );
        Ok(())
    }

    /// Send every pending change to all stores
    ///
    /// Returns false when there was nothing to save.
    ///
    /// # Errors
    /// Returns the first store error; nothing is retried.
    pub fn save(&mut self) -> Result<bool> {
        if !self.has_changes() {
            return Ok(false);
        }

        let request = self.build_save_request();
        let request_id = request.request_id().clone();
        log_op_start!(
            "save",
            request_id = %request_id,
            inserts = request.inserts().len(),
            updates = request.updates().len(),
            deletes = request.deletes().len()
        );
        let start = Instant::now();

        let affected = self.save_impl(request).map_err(|e| {
            log_op_error!(
                "save",
                e.clone(),
                duration_ms = start.elapsed().as_millis() as u64,
                request_id = %request_id
            );
            e
        })?;

        log_op_end!(
            "save",
            duration_ms = start.elapsed().as_millis() as u64,
            request_id = %request_id,
            results = affected
        );
        Ok(true)
    }

    fn build_save_request(&self) -> SaveRequest {
        let mut inserts = Vec::new();
        let mut updates = Vec::new();
        for handle in self.graph.changed_objects() {
            if self.deleted.contains(&handle) {
                continue;
            }
            let known = self
                .graph
                .get(handle)
                .map(|o| o.object_id().is_known())
                .unwrap_or(false);
            if known {
                updates.push(handle);
            } else {
                inserts.push(handle);
            }
        }
        SaveRequest::new(inserts, updates, self.deleted.clone())
    }

    fn save_impl(&mut self, request: SaveRequest) -> Result<usize> {
        let affected = self
            .coordinator
            .execute_request(&request.into(), &mut self.graph)?;
        for handle in &affected {
            if let Some(index) = self.deleted.iter().position(|h| h == handle) {
                self.deleted.remove(index);
                self.graph.forget(*handle)?;
            } else if let Ok(object) = self.graph.get_mut(*handle) {
                object.persist_changes();
            }
        }
        Ok(affected.len())
    }

    /// Execute a fetch request; results are faults until first read
    pub fn execute_fetch_request(&mut self, request: &FetchRequest) -> Result<Vec<ObjectHandle>> {
        let entity = request.entity().name().to_string();
        log_op_start!("execute_fetch_request", entity = %entity);
        let start = Instant::now();

        let results = self
            .coordinator
            .execute_request(&request.clone().into(), &mut self.graph)
            .map_err(|e| {
                log_op_error!(
                    "execute_fetch_request",
                    e.clone(),
                    duration_ms = start.elapsed().as_millis() as u64,
                    entity = %entity
                );
                e
            })?;

        log_op_end!(
            "execute_fetch_request",
            duration_ms = start.elapsed().as_millis() as u64,
            entity = %entity,
            results = results.len()
        );
        Ok(results)
    }

    /// Execute any request against the coordinator without lifecycle logging
    pub fn execute_request(&mut self, request: &PersistentStoreRequest) -> Result<Vec<ObjectHandle>> {
        self.coordinator.execute_request(request, &mut self.graph)
    }

    pub fn object_with_object_id(&mut self, entity: &str, object_id: i64) -> Result<Option<ObjectHandle>> {
        let entity = self.entity(entity)?;
        let request = FetchRequest::new(entity)
            .with_predicate(format!("\"{}\" = {}", OBJECT_ID_COLUMN, object_id));
        Ok(self.execute_fetch_request(&request)?.last().copied())
    }

    /// Last object whose `property` equals `value` (or is null)
    pub fn object_with(
        &mut self,
        entity: &str,
        property: &str,
        value: Option<&Value>,
    ) -> Result<Option<ObjectHandle>> {
        let entity = self.entity(entity)?;
        let property = entity
            .property(property)
            .cloned()
            .ok_or_else(|| KeelError::AttributeNotFound {
                entity: entity.name().to_string(),
                attribute: property.to_string(),
            })?;
        self.object_with_property(entity, &property, value)
    }

    /// `object_with` addressed by an `Entity.property` path
    pub fn object_with_attribute_path(
        &mut self,
        path: &str,
        value: Option<&Value>,
    ) -> Result<Option<ObjectHandle>> {
        let attribute = self
            .model()
            .attribute_with_path(path)
            .cloned()
            .ok_or_else(|| KeelError::AttributeNotFound {
                entity: path.split('.').next().unwrap_or(path).to_string(),
                attribute: path.to_string(),
            })?;
        let property = match attribute {
            EntityAttribute::Property(property) => property,
            EntityAttribute::Relationship(r) => {
                return Err(KeelError::InvalidOperation {
                    object: r.entity().to_string(),
                    message: format!("'{}' is not a property", path),
                })
            }
        };
        let entity = self.entity(property.entity())?;
        self.object_with_property(entity, &property, value)
    }

    fn object_with_property(
        &mut self,
        entity: Arc<EntityDescription>,
        property: &PropertyDescription,
        value: Option<&Value>,
    ) -> Result<Option<ObjectHandle>> {
        let column = quote_identifier(property.name());
        let predicate = match value {
            Some(value) => format!("{} = {}", column, sql_literal(value)),
            None => format!("{} IS NULL", column),
        };
        let request = FetchRequest::new(entity).with_predicate(predicate);
        Ok(self.execute_fetch_request(&request)?.last().copied())
    }
}

fn lookup_attribute<'a>(object: &'a ManagedObject, name: &str) -> Result<&'a EntityAttribute> {
    object
        .entity()
        .attribute_with_name(name)
        .ok_or_else(|| KeelError::AttributeNotFound {
            entity: object.entity().name().to_string(),
            attribute: name.to_string(),
        })
}

fn not_a(object: &ManagedObject, name: &str, kind: &str) -> KeelError {
    KeelError::InvalidOperation {
        object: object.to_string(),
        message: format!("'{}' is not a {}", name, kind),
    }
}

fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// SQL literal for a value, in the representation stores write it with
fn sql_literal(value: &Value) -> String {
    match value {
        Value::String(s) => format!("'{}'", s.replace('\'', "''")),
        Value::Integer(v) => v.to_string(),
        Value::Float(v) => v.to_string(),
        Value::Boolean(v) => i64::from(*v).to_string(),
        Value::Date(d) => d.timestamp().to_string(),
        Value::Binary(b) => format!("X'{}'", hex::encode(b)),
    }
}
