//! Scalar attribute of an entity

use super::value::{ScalarType, Value};
use crate::errors::{KeelError, Result};

/// A typed scalar column of an entity
#[derive(Debug, Clone, PartialEq)]
pub struct PropertyDescription {
    entity: String,
    name: String,
    scalar_type: ScalarType,
    default_value: Option<Value>,
}

impl PropertyDescription {
    /// New property owned by the entity named `entity`, with no default
    pub fn new(entity: impl Into<String>, name: impl Into<String>, scalar_type: ScalarType) -> Self {
        Self {
            entity: entity.into(),
            name: name.into(),
            scalar_type,
            default_value: None,
        }
    }

    pub fn entity(&self) -> &str {
        &self.entity
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn scalar_type(&self) -> ScalarType {
        self.scalar_type
    }

    pub fn default_value(&self) -> Option<&Value> {
        self.default_value.as_ref()
    }

    /// Set the default copied into every newly inserted object
    ///
    /// Fails with `InvalidOperation` when the value's class does not match
    /// the declared type.
    pub fn set_default_value(&mut self, value: Option<Value>) -> Result<()> {
        if let Some(v) = &value {
            if !self.scalar_type.accepts(v) {
                return Err(KeelError::InvalidOperation {
                    object: format!("{}->{}", self.entity, self.name),
                    message: format!(
                        "Invalid default type [{}], expected [{}]",
                        v.value_class(),
                        self.scalar_type.value_class()
                    ),
                });
            }
        }
        self.default_value = value;
        Ok(())
    }
}
