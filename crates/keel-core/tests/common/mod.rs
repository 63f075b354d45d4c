use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use keel_core::{
    KeelError, ManagedObjectContext, ManagedObjectModel, ObjectGraph, ObjectHandle,
    PersistentStore, PersistentStoreCoordinator, PersistentStoreRequest, RequestType, Result,
    Value,
};

type Row = BTreeMap<String, Option<Value>>;

/// Path of a file under tests/fixtures
#[allow(dead_code)]
pub fn fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

/// The library schema at its current version
#[allow(dead_code)]
pub fn library_model() -> Arc<ManagedObjectModel> {
    Arc::new(ManagedObjectModel::from_file(fixture("library.xml"), None).unwrap())
}

/// In-memory store answering fetches and faults from seeded rows
///
/// Saves are not supported. Every executed request type is recorded in
/// `log` so tests can check routing.
pub struct FakeStore {
    identifier: String,
    rows: HashMap<String, BTreeMap<i64, Row>>,
    pub log: Arc<Mutex<Vec<RequestType>>>,
}

#[allow(dead_code)]
impl FakeStore {
    pub fn new(identifier: &str) -> Self {
        Self {
            identifier: identifier.to_string(),
            rows: HashMap::new(),
            log: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn with_row(mut self, entity: &str, id: i64, values: &[(&str, Value)]) -> Self {
        let row = values
            .iter()
            .map(|(k, v)| (k.to_string(), Some(v.clone())))
            .collect();
        self.rows
            .entry(entity.to_string())
            .or_default()
            .insert(id, row);
        self
    }
}

impl PersistentStore for FakeStore {
    fn identifier(&self) -> &str {
        &self.identifier
    }

    fn attach(&mut self, _model: Arc<ManagedObjectModel>) -> Result<()> {
        Ok(())
    }

    fn supports(&self, request_type: RequestType) -> bool {
        request_type != RequestType::Save
    }

    fn execute_request(
        &mut self,
        request: &PersistentStoreRequest,
        graph: &mut ObjectGraph,
    ) -> Result<Vec<ObjectHandle>> {
        if let Ok(mut log) = self.log.lock() {
            log.push(request.request_type());
        }
        match request {
            PersistentStoreRequest::Fetch(fetch) => {
                let ids: Vec<i64> = self
                    .rows
                    .get(fetch.entity().name())
                    .map(|rows| rows.keys().copied().collect())
                    .unwrap_or_default();
                Ok(ids
                    .into_iter()
                    .map(|id| {
                        graph.new_object_for_entity(fetch.entity(), keel_core::ObjectId::Row(id))
                    })
                    .collect())
            }
            PersistentStoreRequest::Fault(fault) => {
                let mut failed = Vec::new();
                for handle in fault.faults() {
                    let object = graph.get_mut(*handle)?;
                    let entity = object.entity().clone();
                    let row = object
                        .object_id()
                        .row()
                        .and_then(|id| self.rows.get(entity.name())?.get(&id));
                    match row {
                        Some(values) => {
                            let mut data: Row = entity
                                .properties()
                                .map(|p| (p.name().to_string(), None))
                                .collect();
                            data.extend(values.clone());
                            object.set_data(data);
                            object.set_relationships(
                                entity
                                    .relationships()
                                    .map(|r| (r.name().to_string(), Vec::new()))
                                    .collect(),
                            );
                        }
                        None => failed.push(*handle),
                    }
                }
                Ok(failed)
            }
            PersistentStoreRequest::Save(_) => Err(KeelError::persistent_store(
                "fake_store",
                "saves are not supported",
            )),
        }
    }
}

/// Context over the library model backed by one fake store
#[allow(dead_code)]
pub fn context_with(store: FakeStore) -> ManagedObjectContext {
    let mut coordinator = PersistentStoreCoordinator::new(library_model());
    coordinator.add_persistent_store(Box::new(store)).unwrap();
    ManagedObjectContext::new(coordinator)
}
