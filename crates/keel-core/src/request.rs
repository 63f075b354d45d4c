//! Requests a context sends through the coordinator to its stores

use std::sync::Arc;

use crate::correlation::RequestId;
use crate::errors::{KeelError, Result};
use crate::model::EntityDescription;
use crate::object::{ObjectGraph, ObjectHandle};

/// Primary key column of every entity and join table
pub const OBJECT_ID_COLUMN: &str = "objectID";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestType {
    Fetch,
    Fault,
    Save,
}

impl RequestType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestType::Fetch => "fetch",
            RequestType::Fault => "fault",
            RequestType::Save => "save",
        }
    }
}

impl std::fmt::Display for RequestType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Rows of one entity, optionally filtered
///
/// The predicate is a raw SQL fragment placed after `WHERE` as given.
#[derive(Debug, Clone)]
pub struct FetchRequest {
    entity: Arc<EntityDescription>,
    predicate: Option<String>,
}

impl FetchRequest {
    pub fn new(entity: Arc<EntityDescription>) -> Self {
        Self {
            entity,
            predicate: None,
        }
    }

    pub fn with_predicate(mut self, predicate: impl Into<String>) -> Self {
        self.predicate = Some(predicate.into());
        self
    }

    pub fn entity(&self) -> &Arc<EntityDescription> {
        &self.entity
    }

    pub fn predicate(&self) -> Option<&str> {
        self.predicate.as_deref()
    }
}

/// Objects whose data should be loaded in place
#[derive(Debug, Clone)]
pub struct FaultRequest {
    faults: Vec<ObjectHandle>,
}

impl FaultRequest {
    /// Fails if any object is not currently a fault
    pub fn new(graph: &ObjectGraph, faults: Vec<ObjectHandle>) -> Result<Self> {
        for handle in &faults {
            if !graph.get(*handle)?.is_fault() {
                return Err(KeelError::persistent_store(
                    "fault_request",
                    format!("Managed object {} is not a valid fault", handle),
                ));
            }
        }
        Ok(Self { faults })
    }

    pub fn faults(&self) -> &[ObjectHandle] {
        &self.faults
    }
}

/// Objects to insert, update and delete in one save
#[derive(Debug, Clone, Default)]
pub struct SaveRequest {
    request_id: RequestId,
    inserts: Vec<ObjectHandle>,
    updates: Vec<ObjectHandle>,
    deletes: Vec<ObjectHandle>,
}

impl SaveRequest {
    pub fn new(
        inserts: Vec<ObjectHandle>,
        updates: Vec<ObjectHandle>,
        deletes: Vec<ObjectHandle>,
    ) -> Self {
        Self {
            request_id: RequestId::new(),
            inserts,
            updates,
            deletes,
        }
    }

    pub fn request_id(&self) -> &RequestId {
        &self.request_id
    }

    pub fn inserts(&self) -> &[ObjectHandle] {
        &self.inserts
    }

    pub fn updates(&self) -> &[ObjectHandle] {
        &self.updates
    }

    pub fn deletes(&self) -> &[ObjectHandle] {
        &self.deletes
    }

    pub fn is_empty(&self) -> bool {
        self.inserts.is_empty() && self.updates.is_empty() && self.deletes.is_empty()
    }
}

#[derive(Debug, Clone)]
pub enum PersistentStoreRequest {
    Fetch(FetchRequest),
    Fault(FaultRequest),
    Save(SaveRequest),
}

impl PersistentStoreRequest {
    pub fn request_type(&self) -> RequestType {
        match self {
            PersistentStoreRequest::Fetch(_) => RequestType::Fetch,
            PersistentStoreRequest::Fault(_) => RequestType::Fault,
            PersistentStoreRequest::Save(_) => RequestType::Save,
        }
    }
}

impl From<FetchRequest> for PersistentStoreRequest {
    fn from(request: FetchRequest) -> Self {
        PersistentStoreRequest::Fetch(request)
    }
}

impl From<FaultRequest> for PersistentStoreRequest {
    fn from(request: FaultRequest) -> Self {
        PersistentStoreRequest::Fault(request)
    }
}

impl From<SaveRequest> for PersistentStoreRequest {
    fn from(request: SaveRequest) -> Self {
        PersistentStoreRequest::Save(request)
    }
}
