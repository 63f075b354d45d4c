use thiserror::Error;

/// Result type alias using KeelError
pub type Result<T> = std::result::Result<T, KeelError>;

// ========== Error Facility ==========

/// Canonical error kind taxonomy
///
/// Every `KeelError` maps onto exactly one kind, and every kind carries a
/// stable code suitable for programmatic handling and CLI exit reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExErrorKind {
    // Schema document
    ModelParse,
    ModelVersionNotFound,

    // Lookup
    EntityNotFound,
    AttributeNotFound,

    // Storage
    PersistentStore,

    // Object lifecycle
    ManagedObject,
    InvalidOperation,

    // Integration
    Io,
}

impl ExErrorKind {
    /// Get the stable error code for this kind
    pub fn code(&self) -> &'static str {
        match self {
            ExErrorKind::ModelParse => "ERR_MODEL_PARSE",
            ExErrorKind::ModelVersionNotFound => "ERR_MODEL_VERSION_NOT_FOUND",
            ExErrorKind::EntityNotFound => "ERR_ENTITY_NOT_FOUND",
            ExErrorKind::AttributeNotFound => "ERR_ATTRIBUTE_NOT_FOUND",
            ExErrorKind::PersistentStore => "ERR_PERSISTENT_STORE",
            ExErrorKind::ManagedObject => "ERR_MANAGED_OBJECT",
            ExErrorKind::InvalidOperation => "ERR_INVALID_OPERATION",
            ExErrorKind::Io => "ERR_IO",
        }
    }
}

/// Canonical structured error type
///
/// Carries classification plus the operation, entity and attribute the
/// failing layer knew about.
#[derive(Debug, Clone)]
pub struct ExError {
    kind: ExErrorKind,
    op: Option<String>,
    entity: Option<String>,
    attribute: Option<String>,
    message: String,
}

impl ExError {
    /// Create a new error with the specified kind
    pub fn new(kind: ExErrorKind) -> Self {
        Self {
            kind,
            op: None,
            entity: None,
            attribute: None,
            message: String::new(),
        }
    }

    /// Add operation context
    pub fn with_op(mut self, op: impl Into<String>) -> Self {
        self.op = Some(op.into());
        self
    }

    /// Add entity context
    pub fn with_entity(mut self, entity: impl Into<String>) -> Self {
        self.entity = Some(entity.into());
        self
    }

    /// Add attribute context
    pub fn with_attribute(mut self, attribute: impl Into<String>) -> Self {
        self.attribute = Some(attribute.into());
        self
    }

    /// Add custom message
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    pub fn kind(&self) -> ExErrorKind {
        self.kind
    }

    pub fn code(&self) -> &'static str {
        self.kind.code()
    }

    pub fn op(&self) -> Option<&str> {
        self.op.as_deref()
    }

    pub fn entity(&self) -> Option<&str> {
        self.entity.as_deref()
    }

    pub fn attribute(&self) -> Option<&str> {
        self.attribute.as_deref()
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl std::fmt::Display for ExError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}]", self.code())?;
        if let Some(op) = &self.op {
            write!(f, " in operation '{}'", op)?;
        }
        if !self.message.is_empty() {
            write!(f, ": {}", self.message)?;
        }
        if let Some(entity) = &self.entity {
            write!(f, " (entity: {})", entity)?;
        }
        if let Some(attribute) = &self.attribute {
            write!(f, " (attribute: {})", attribute)?;
        }
        Ok(())
    }
}

impl std::error::Error for ExError {}

// ========== End Error Facility ==========

/// Error taxonomy for the persistence engine
#[derive(Error, Debug, Clone, PartialEq)]
pub enum KeelError {
    /// Malformed schema document, duplicate entity, unresolved inverse,
    /// unsupported property type or default value
    #[error("Model parse error in {source_name}: {message}")]
    ModelParse {
        source_name: String,
        message: String,
    },

    /// The requested (or declared current) model version is not in the document
    #[error("Model version '{version}' not found in {source_name}")]
    ModelVersionNotFound {
        source_name: String,
        version: String,
    },

    #[error("Entity not found: {entity}")]
    EntityNotFound { entity: String },

    #[error("Attribute '{attribute}' not found on entity '{entity}'")]
    AttributeNotFound { entity: String, attribute: String },

    /// SQL failure, missing store or coordinator, rejected migration,
    /// unresolvable relationship metadata
    #[error("Persistent store error in {op}: {message}")]
    PersistentStore { op: String, message: String },

    /// Operation attempted on an object in an invalid state
    #[error("Managed object error on {object}: {message}")]
    ManagedObject { object: String, message: String },

    /// Value of the wrong dynamic type assigned to a property or relationship
    #[error("Invalid managed object operation on {object}: {message}")]
    InvalidOperation { object: String, message: String },

    #[error("IO error: {message}")]
    Io { message: String },
}

impl KeelError {
    pub fn persistent_store(op: impl Into<String>, message: impl Into<String>) -> Self {
        KeelError::PersistentStore {
            op: op.into(),
            message: message.into(),
        }
    }

    pub fn kind(&self) -> ExErrorKind {
        match self {
            KeelError::ModelParse { .. } => ExErrorKind::ModelParse,
            KeelError::ModelVersionNotFound { .. } => ExErrorKind::ModelVersionNotFound,
            KeelError::EntityNotFound { .. } => ExErrorKind::EntityNotFound,
            KeelError::AttributeNotFound { .. } => ExErrorKind::AttributeNotFound,
            KeelError::PersistentStore { .. } => ExErrorKind::PersistentStore,
            KeelError::ManagedObject { .. } => ExErrorKind::ManagedObject,
            KeelError::InvalidOperation { .. } => ExErrorKind::InvalidOperation,
            KeelError::Io { .. } => ExErrorKind::Io,
        }
    }
}

impl From<KeelError> for ExError {
    fn from(err: KeelError) -> Self {
        let message = err.to_string();
        let ex = ExError::new(err.kind()).with_message(message);
        match err {
            KeelError::EntityNotFound { entity } => ex.with_entity(entity),
            KeelError::AttributeNotFound { entity, attribute } => {
                ex.with_entity(entity).with_attribute(attribute)
            }
            KeelError::PersistentStore { op, .. } => ex.with_op(op),
            _ => ex,
        }
    }
}

impl From<std::io::Error> for KeelError {
    fn from(err: std::io::Error) -> Self {
        KeelError::Io {
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kind_codes_are_distinct() {
        let kinds = [
            ExErrorKind::ModelParse,
            ExErrorKind::ModelVersionNotFound,
            ExErrorKind::EntityNotFound,
            ExErrorKind::AttributeNotFound,
            ExErrorKind::PersistentStore,
            ExErrorKind::ManagedObject,
            ExErrorKind::InvalidOperation,
            ExErrorKind::Io,
        ];
        let mut codes: Vec<_> = kinds.iter().map(|k| k.code()).collect();
        codes.sort();
        codes.dedup();
        assert_eq!(codes.len(), kinds.len());
    }

    #[test]
    fn test_keel_error_converts_with_context() {
        let err = KeelError::AttributeNotFound {
            entity: "Author".to_string(),
            attribute: "age".to_string(),
        };
        let ex: ExError = err.into();
        assert_eq!(ex.kind(), ExErrorKind::AttributeNotFound);
        assert_eq!(ex.entity(), Some("Author"));
        assert_eq!(ex.attribute(), Some("age"));
        assert!(ex.to_string().starts_with("[ERR_ATTRIBUTE_NOT_FOUND]"));
    }

    #[test]
    fn test_persistent_store_error_keeps_op() {
        let ex: ExError = KeelError::persistent_store("migration", "nope").into();
        assert_eq!(ex.code(), "ERR_PERSISTENT_STORE");
        assert_eq!(ex.op(), Some("migration"));
    }
}
