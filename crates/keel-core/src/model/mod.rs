//! Schema model: entities, their properties and relationships, and the
//! versioned document they are loaded from

pub mod entity;
pub mod managed_object_model;
pub mod property;
pub mod relationship;
pub mod value;
mod xml_format;

pub use entity::{EntityAttribute, EntityDescription};
pub use managed_object_model::ManagedObjectModel;
pub use property::PropertyDescription;
pub use relationship::{
    Cardinality, InverseRelationship, RelationshipDescription, RelationshipType,
    JOIN_TABLE_PREFIX,
};
pub use value::{parse_bool, parse_date, ScalarType, Value};
