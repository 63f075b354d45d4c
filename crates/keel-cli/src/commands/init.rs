//! Init command
//!
//! Usage: keel init

use std::sync::Arc;

use clap::Args;
use keel_core::PersistentStore;
use keel_store::SqlitePersistentStore;

use crate::config::KeelConfig;

#[derive(Debug, Args)]
pub struct InitArgs {}

/// Execute init command
pub fn execute(_args: InitArgs, config: &KeelConfig) -> Result<(), Box<dyn std::error::Error>> {
    let model = Arc::new(config.load_model()?);

    for store_config in config.store_configs()? {
        let mut store = SqlitePersistentStore::from_config(store_config.clone());
        store.attach(Arc::clone(&model))?;
        let existing = store.database_version()?;
        store.ensure_database_consistency()?;

        match existing {
            Some(_) => println!("✓ {} already at model version {}", store_config.url, model.version()),
            None => println!("✓ Created {} at model version {}", store_config.url, model.version()),
        }
    }
    Ok(())
}
