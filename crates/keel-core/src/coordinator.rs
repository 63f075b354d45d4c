//! Persistent store seam and the coordinator that routes requests to stores

use std::sync::Arc;

use crate::errors::{KeelError, Result};
use crate::model::ManagedObjectModel;
use crate::object::{ObjectGraph, ObjectHandle};
use crate::request::{PersistentStoreRequest, RequestType};

/// A storage backend able to execute requests against an object graph
pub trait PersistentStore {
    /// Unique name of this store within a coordinator
    fn identifier(&self) -> &str;

    /// Called when the store joins a coordinator
    ///
    /// # Errors
    /// Returns an error if the store cannot serve this model.
    fn attach(&mut self, model: Arc<ManagedObjectModel>) -> Result<()>;

    /// Called when the store leaves its coordinator
    fn detach(&mut self) {}

    fn supports(&self, _request_type: RequestType) -> bool {
        true
    }

    /// Execute one request
    ///
    /// Fetches return the matching objects, faults return the objects that
    /// could not be resolved, saves return every affected object.
    ///
    /// # Errors
    /// Returns an error if the backend fails; nothing is retried.
    fn execute_request(
        &mut self,
        request: &PersistentStoreRequest,
        graph: &mut ObjectGraph,
    ) -> Result<Vec<ObjectHandle>>;
}

/// Owns the model and the stores sharing it
///
/// Saves go to every store; fetches and faults go to the first one.
pub struct PersistentStoreCoordinator {
    model: Arc<ManagedObjectModel>,
    stores: Vec<Box<dyn PersistentStore>>,
}

impl PersistentStoreCoordinator {
    pub fn new(model: Arc<ManagedObjectModel>) -> Self {
        Self {
            model,
            stores: Vec::new(),
        }
    }

    pub fn model(&self) -> &Arc<ManagedObjectModel> {
        &self.model
    }

    /// Attach and register a store; returns false if a store with the same
    /// identifier is already registered
    ///
    /// # Errors
    /// Returns the store's attach error.
    pub fn add_persistent_store(&mut self, mut store: Box<dyn PersistentStore>) -> Result<bool> {
        if self
            .stores
            .iter()
            .any(|s| s.identifier() == store.identifier())
        {
            return Ok(false);
        }
        store.attach(Arc::clone(&self.model))?;
        tracing::debug!(store = store.identifier(), "Persistent store added");
        self.stores.push(store);
        Ok(true)
    }

    pub fn remove_persistent_store(&mut self, identifier: &str) -> Option<Box<dyn PersistentStore>> {
        let index = self.stores.iter().position(|s| s.identifier() == identifier)?;
        let mut store = self.stores.remove(index);
        store.detach();
        tracing::debug!(store = identifier, "Persistent store removed");
        Some(store)
    }

    pub fn persistent_stores(&self) -> impl Iterator<Item = &dyn PersistentStore> {
        self.stores.iter().map(|s| s.as_ref())
    }

    /// Route a request to its stores
    ///
    /// Every store after the first executes a save against a copy of the
    /// graph as it was before the save, so each store sees the same pending
    /// changes. The first store's result is returned.
    ///
    /// # Errors
    /// Fails when no store is registered, when a store does not support the
    /// request type, or with the first store error encountered.
    pub fn execute_request(
        &mut self,
        request: &PersistentStoreRequest,
        graph: &mut ObjectGraph,
    ) -> Result<Vec<ObjectHandle>> {
        if self.stores.is_empty() {
            return Err(KeelError::persistent_store(
                "execute_request",
                "No persistent stores defined",
            ));
        }
        let request_type = request.request_type();

        match request_type {
            RequestType::Save => {
                if let Some(store) = self.stores.iter().find(|s| !s.supports(request_type)) {
                    return Err(unsupported(request_type, store.identifier()));
                }
                let pristine = (self.stores.len() > 1).then(|| graph.clone());
                let (first, rest) = match self.stores.split_first_mut() {
                    Some(split) => split,
                    None => return Ok(Vec::new()),
                };
                let affected = first.execute_request(request, graph)?;
                if let Some(pristine) = pristine {
                    for store in rest {
                        let mut copy = pristine.clone();
                        store.execute_request(request, &mut copy)?;
                    }
                }
                Ok(affected)
            }
            RequestType::Fetch | RequestType::Fault => {
                let store = self
                    .stores
                    .iter_mut()
                    .next()
                    .ok_or_else(|| {
                        KeelError::persistent_store("execute_request", "No persistent stores defined")
                    })?;
                if !store.supports(request_type) {
                    return Err(unsupported(request_type, store.identifier()));
                }
                store.execute_request(request, graph)
            }
        }
    }
}

fn unsupported(request_type: RequestType, store: &str) -> KeelError {
    KeelError::persistent_store(
        "execute_request",
        format!("Unsupported request type ({}) for store '{}'", request_type, store),
    )
}

impl std::fmt::Debug for PersistentStoreCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PersistentStoreCoordinator")
            .field("version", &self.model.version())
            .field(
                "stores",
                &self.stores.iter().map(|s| s.identifier()).collect::<Vec<_>>(),
            )
            .finish()
    }
}
