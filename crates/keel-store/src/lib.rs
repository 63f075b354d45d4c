//! Keel Store - SQLite persistence for Keel managed objects
//!
//! This crate provides the SQL side of the engine:
//! - Schema bootstrap from a model, stamped with the model version
//! - Fetching rows as faults and loading faults in place
//! - Transactional saves cascading through pending relationship changes
//! - Deletes that detach an object from everything it links to

pub mod codec;
pub mod config;
pub mod db;
pub mod errors;
pub mod load;
pub mod save;
pub mod schema;
pub mod sqlite_store;

pub use config::StoreConfig;
pub use errors::Result;
pub use sqlite_store::SqlitePersistentStore;
