//! CLI configuration
//!
//! Settings come from a TOML file (`--config`, or `keel.toml` in the
//! working directory when present) and are overridden by flags:
//!
//! ```toml
//! model = "library.xml"
//! version = "2"
//! log_profile = "development"
//!
//! [[stores]]
//! url = "library.db"
//! journal_mode = "WAL"
//! ```

use std::error::Error;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::Args;
use keel_core::logging_facility::{self, Profile};
use keel_core::{ManagedObjectContext, ManagedObjectModel, PersistentStoreCoordinator};
use keel_store::{SqlitePersistentStore, StoreConfig};
use serde::Deserialize;

const DEFAULT_CONFIG_FILE: &str = "keel.toml";

#[derive(Debug, Clone, Args)]
pub struct GlobalOptions {
    /// Configuration file
    #[arg(long, short, global = true)]
    pub config: Option<PathBuf>,

    /// Schema document, overrides `model`
    #[arg(long, global = true)]
    pub model: Option<PathBuf>,

    /// Model version, overrides `version`
    #[arg(long = "model-version", global = true)]
    pub version: Option<String>,

    /// Database path; repeat for several stores. Replaces `stores`
    #[arg(long = "db", global = true)]
    pub db: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct KeelConfig {
    pub model: Option<PathBuf>,

    #[serde(default)]
    pub version: Option<String>,

    #[serde(default)]
    pub stores: Vec<StoreConfig>,

    #[serde(default)]
    pub log_profile: Option<String>,
}

impl KeelConfig {
    pub fn from_toml_str(document: &str) -> Result<Self, Box<dyn Error>> {
        Ok(toml::from_str(document)?)
    }

    pub fn load(path: &Path) -> Result<Self, Box<dyn Error>> {
        let document = std::fs::read_to_string(path)
            .map_err(|e| format!("Cannot read config {}: {}", path.display(), e))?;
        Self::from_toml_str(&document)
    }

    /// Configuration file (if any) with command-line overrides applied
    pub fn resolve(options: &GlobalOptions) -> Result<Self, Box<dyn Error>> {
        let mut config = match &options.config {
            Some(path) => Self::load(path)?,
            None if Path::new(DEFAULT_CONFIG_FILE).exists() => {
                Self::load(Path::new(DEFAULT_CONFIG_FILE))?
            }
            None => Self::default(),
        };
        config.apply_overrides(options);
        Ok(config)
    }

    pub fn apply_overrides(&mut self, options: &GlobalOptions) {
        if let Some(model) = &options.model {
            self.model = Some(model.clone());
        }
        if let Some(version) = &options.version {
            self.version = Some(version.clone());
        }
        if !options.db.is_empty() {
            self.stores = options.db.iter().map(StoreConfig::new).collect();
        }
    }

    /// Install logging for the configured profile; silent when unset
    pub fn init_logging(&self) {
        if let Some(profile) = &self.log_profile {
            match profile.parse::<Profile>() {
                Ok(profile) => logging_facility::init(profile),
                Err(e) => eprintln!("Warning: {}", e),
            }
        }
    }

    pub fn load_model(&self) -> Result<ManagedObjectModel, Box<dyn Error>> {
        let path = self
            .model
            .as_ref()
            .ok_or("No schema document configured (use --model or `model` in keel.toml)")?;
        Ok(ManagedObjectModel::from_file(path, self.version.as_deref())?)
    }

    pub fn store_configs(&self) -> Result<&[StoreConfig], Box<dyn Error>> {
        if self.stores.is_empty() {
            return Err("No stores configured (use --db or [[stores]] in keel.toml)".into());
        }
        Ok(&self.stores)
    }

    /// Context over the configured model with one store per configured entry
    pub fn context(&self) -> Result<ManagedObjectContext, Box<dyn Error>> {
        let mut coordinator = PersistentStoreCoordinator::new(Arc::new(self.load_model()?));
        for store in self.store_configs()? {
            let store = SqlitePersistentStore::from_config(store.clone());
            if !coordinator.add_persistent_store(Box::new(store))? {
                return Err("The same store is configured twice".into());
            }
        }
        Ok(ManagedObjectContext::new(coordinator))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_config_file() {
        let config = KeelConfig::from_toml_str(
            r#"
            model = "library.xml"
            log_profile = "production"

            [[stores]]
            url = "library.db"
            journal_mode = "WAL"

            [[stores]]
            url = ":memory:"
            foreign_keys = false
            "#,
        )
        .unwrap();

        assert_eq!(config.model, Some(PathBuf::from("library.xml")));
        assert_eq!(config.version, None);
        assert_eq!(config.stores.len(), 2);
        assert_eq!(config.stores[0].journal_mode.as_deref(), Some("WAL"));
        assert!(config.stores[0].foreign_keys);
        assert!(config.stores[1].is_in_memory());
        assert!(!config.stores[1].foreign_keys);
    }

    #[test]
    fn test_flags_override_file() {
        let mut config = KeelConfig::from_toml_str(
            "model = \"a.xml\"\nversion = \"1\"\n[[stores]]\nurl = \"a.db\"\n",
        )
        .unwrap();
        let options = GlobalOptions {
            config: None,
            model: None,
            version: Some("2".to_string()),
            db: vec!["b.db".to_string()],
        };

        config.apply_overrides(&options);

        assert_eq!(config.model, Some(PathBuf::from("a.xml")));
        assert_eq!(config.version.as_deref(), Some("2"));
        assert_eq!(config.stores, vec![StoreConfig::new("b.db")]);
    }

    #[test]
    fn test_missing_settings_are_reported() {
        let config = KeelConfig::default();
        assert!(config.load_model().is_err());
        assert!(config.store_configs().is_err());
    }
}
