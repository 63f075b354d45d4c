//! Keel Core - schema model, managed objects and request routing
//!
//! This crate provides the storage-independent half of the Keel persistence
//! engine:
//! - Entity, property and relationship descriptions with deterministic
//!   join-table and column naming
//! - A versioned XML schema loader resolving inverse relationships
//! - Managed objects with faulting and layered change tracking, held in a
//!   per-context object graph
//! - Fetch, fault and save requests and the coordinator routing them to
//!   persistent stores
//!
//! SQL-backed stores live in `keel-store`.

pub mod context;
pub mod coordinator;
pub mod correlation;
pub mod errors;
pub mod import;
pub mod logging_facility;
pub mod model;
pub mod object;
pub mod request;

// Re-export commonly used types
pub use context::{AttributeValue, ManagedObjectContext};
pub use coordinator::{PersistentStore, PersistentStoreCoordinator};
pub use correlation::RequestId;
pub use errors::{ExError, ExErrorKind, KeelError, Result};
pub use model::{
    Cardinality, EntityAttribute, EntityDescription, ManagedObjectModel, PropertyDescription,
    RelationshipDescription, RelationshipType, ScalarType, Value,
};
pub use object::{ManagedObject, ObjectGraph, ObjectHandle, ObjectId};
pub use request::{
    FaultRequest, FetchRequest, PersistentStoreRequest, RequestType, SaveRequest,
    OBJECT_ID_COLUMN,
};
