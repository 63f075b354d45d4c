//! SQLite-backed persistent store

#![allow(clippy::result_large_err)]

use std::sync::Arc;

use keel_core::model::{EntityDescription, ManagedObjectModel};
use keel_core::{ObjectGraph, ObjectHandle, PersistentStore, PersistentStoreRequest};
use rusqlite::Connection;

use crate::config::StoreConfig;
use crate::db;
use crate::errors::{from_rusqlite, not_attached, Result};
use crate::load;
use crate::save::SaveCascade;
use crate::schema;

/// Persistent store keeping each entity in its own table
///
/// The connection is opened on first use. Every request first makes sure
/// the database structure matches the attached model.
pub struct SqlitePersistentStore {
    identifier: String,
    config: StoreConfig,
    conn: Option<Connection>,
    model: Option<Arc<ManagedObjectModel>>,
}

impl SqlitePersistentStore {
    /// Store for a database file path or `:memory:`, identified by its URL
    pub fn new(url: impl Into<String>) -> Self {
        Self::from_config(StoreConfig::new(url))
    }

    pub fn in_memory() -> Self {
        Self::from_config(StoreConfig::in_memory())
    }

    pub fn from_config(config: StoreConfig) -> Self {
        Self {
            identifier: config.url.clone(),
            config,
            conn: None,
            model: None,
        }
    }

    /// Replace the identifier, e.g. to register two in-memory stores
    pub fn with_identifier(mut self, identifier: impl Into<String>) -> Self {
        self.identifier = identifier.into();
        self
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Open connection, opening and configuring it on first use
    pub fn connection(&mut self) -> Result<&mut Connection> {
        let conn = match self.conn.take() {
            Some(conn) => conn,
            None => {
                let conn = db::open_config(&self.config)?;
                tracing::debug!(store = %self.identifier, "Connection opened");
                conn
            }
        };
        Ok(self.conn.insert(conn))
    }

    fn attached_model(&self) -> Result<Arc<ManagedObjectModel>> {
        self.model
            .clone()
            .ok_or_else(|| not_attached(&self.identifier))
    }

    /// Model version stamped in the database, if any
    pub fn database_version(&mut self) -> Result<Option<String>> {
        schema::database_version(self.connection()?)
    }

    /// Create the structure of a fresh database, or reject a database
    /// created by another model version
    pub fn ensure_database_consistency(&mut self) -> Result<()> {
        let model = self.attached_model()?;
        schema::ensure_database_consistency(self.connection()?, &model)
    }

    /// Fault for a row of `entity`, or None if the row does not exist
    pub fn fetch_object_with_object_id(
        &mut self,
        graph: &mut ObjectGraph,
        entity: &Arc<EntityDescription>,
        object_id: i64,
    ) -> Result<Option<ObjectHandle>> {
        self.ensure_database_consistency()?;
        load::fetch_object_with_object_id(self.connection()?, graph, entity, object_id)
    }

    fn execute_save(
        &mut self,
        request: &keel_core::SaveRequest,
        graph: &mut ObjectGraph,
    ) -> Result<Vec<ObjectHandle>> {
        let model = self.attached_model()?;
        let snapshot = graph.clone();
        let tx = self.connection()?.transaction().map_err(from_rusqlite)?;

        let result = SaveCascade::new(&tx, &model, request.request_id().clone()).execute(request, graph);
        match result {
            Ok(affected) => {
                tx.commit().map_err(from_rusqlite)?;
                Ok(affected)
            }
            Err(e) => {
                // dropping the transaction rolls it back
                drop(tx);
                *graph = snapshot;
                tracing::debug!(request_id = %request.request_id(), error = %e, "Save rolled back");
                Err(e)
            }
        }
    }
}

impl PersistentStore for SqlitePersistentStore {
    fn identifier(&self) -> &str {
        &self.identifier
    }

    fn attach(&mut self, model: Arc<ManagedObjectModel>) -> keel_core::Result<()> {
        self.model = Some(model);
        Ok(())
    }

    fn detach(&mut self) {
        self.model = None;
        self.conn = None;
    }

    fn execute_request(
        &mut self,
        request: &PersistentStoreRequest,
        graph: &mut ObjectGraph,
    ) -> keel_core::Result<Vec<ObjectHandle>> {
        self.ensure_database_consistency()?;

        match request {
            PersistentStoreRequest::Fetch(fetch) => {
                load::fetch_objects(self.connection()?, graph, fetch)
            }
            PersistentStoreRequest::Fault(fault) => {
                let model = self.attached_model()?;
                let conn = self.connection()?;
                let mut failed = Vec::new();
                for handle in fault.faults() {
                    if !load::load_fault(conn, &model, graph, *handle)? {
                        failed.push(*handle);
                    }
                }
                Ok(failed)
            }
            PersistentStoreRequest::Save(save) => self.execute_save(save, graph),
        }
    }
}

impl std::fmt::Debug for SqlitePersistentStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqlitePersistentStore")
            .field("identifier", &self.identifier)
            .field("config", &self.config)
            .field("open", &self.conn.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use keel_core::{FetchRequest, SaveRequest};

    const MODEL: &str = r#"<models current-version="1">
      <model version="1">
        <entity name="Tag" plural="Tags">
          <property name="label" type="String"/>
        </entity>
      </model>
    </models>"#;

    fn attached() -> SqlitePersistentStore {
        let model = ManagedObjectModel::from_xml_str(MODEL, None).unwrap();
        let mut store = SqlitePersistentStore::in_memory();
        store.attach(Arc::new(model)).unwrap();
        store
    }

    #[test]
    fn test_requests_need_a_model() {
        let mut store = SqlitePersistentStore::in_memory();
        let mut graph = ObjectGraph::new();
        let err = store
            .execute_request(&SaveRequest::default().into(), &mut graph)
            .unwrap_err();
        assert!(err.to_string().contains("not attached"));
    }

    #[test]
    fn test_first_request_stamps_version() {
        let mut store = attached();
        assert_eq!(store.database_version().unwrap(), None);

        let mut graph = ObjectGraph::new();
        let model = store.attached_model().unwrap();
        let tags = Arc::clone(model.entity_with_name("Tag").unwrap());
        let found = store
            .execute_request(&FetchRequest::new(tags).into(), &mut graph)
            .unwrap();

        assert!(found.is_empty());
        assert_eq!(store.database_version().unwrap(), Some("1".to_string()));
    }

    #[test]
    fn test_identifier_defaults_to_url() {
        let store = SqlitePersistentStore::new("library.db");
        assert_eq!(store.identifier(), "library.db");
        let renamed = SqlitePersistentStore::in_memory().with_identifier("mirror");
        assert_eq!(renamed.identifier(), "mirror");
    }
}
