//! Store connection settings

use serde::{Deserialize, Serialize};

/// URL selecting a private in-memory database
pub const IN_MEMORY_URL: &str = ":memory:";

/// Settings of one SQLite persistent store
///
/// ```toml
/// url = "library.db"
/// journal_mode = "WAL"
/// foreign_keys = true
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Database file path, or `:memory:`
    pub url: String,

    /// Journal mode applied to file databases
    #[serde(default)]
    pub journal_mode: Option<String>,

    #[serde(default = "default_foreign_keys")]
    pub foreign_keys: bool,
}

fn default_foreign_keys() -> bool {
    true
}

impl StoreConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            journal_mode: None,
            foreign_keys: default_foreign_keys(),
        }
    }

    pub fn in_memory() -> Self {
        Self::new(IN_MEMORY_URL)
    }

    pub fn with_journal_mode(mut self, mode: impl Into<String>) -> Self {
        self.journal_mode = Some(mode.into());
        self
    }

    pub fn is_in_memory(&self) -> bool {
        self.url == IN_MEMORY_URL
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self::in_memory()
    }
}
