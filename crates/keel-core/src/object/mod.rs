//! Managed objects and the per-context arena that owns them

pub mod graph;
pub mod managed_object;

pub use graph::ObjectGraph;
pub use managed_object::{ManagedObject, ObjectId};

use serde::Serialize;

/// Stable address of a managed object within one `ObjectGraph`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ObjectHandle(pub(crate) usize);

impl ObjectHandle {
    pub fn index(&self) -> usize {
        self.0
    }
}

impl std::fmt::Display for ObjectHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}
