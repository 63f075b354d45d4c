//! Relationship attribute of an entity and its storage naming

use md5::{Digest, Md5};

use crate::errors::{KeelError, Result};

/// Prefix of every relationship join table
pub const JOIN_TABLE_PREFIX: &str = "Z_";

/// How many objects one end of a relationship links to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Cardinality {
    One,
    Many,
}

impl Cardinality {
    /// Parse the `to` attribute; anything but "many" (any case) is To-One
    pub fn parse(raw: &str) -> Self {
        if raw.eq_ignore_ascii_case("many") {
            Cardinality::Many
        } else {
            Cardinality::One
        }
    }
}

/// Classification of a relationship considering both of its ends
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RelationshipType {
    OneToOne,
    OneToMany,
    ManyToMany,
    /// To-One with no inverse declared
    OneToNone,
    /// To-Many with no inverse declared
    ManyToNone,
}

/// Lookup key of the inverse end, resolved once when the model is loaded
///
/// The inverse lives on another entity description; holding its names and
/// cardinality instead of a reference keeps entity descriptions acyclic.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct InverseRelationship {
    pub entity: String,
    pub name: String,
    pub to: Cardinality,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RelationshipDescription {
    entity: String,
    name: String,
    target: String,
    to: Cardinality,
    singular: Option<String>,
    inverse: Option<InverseRelationship>,
}

impl RelationshipDescription {
    /// New To-One relationship from `entity` to the entity type `target`
    pub fn new(entity: impl Into<String>, name: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            entity: entity.into(),
            name: name.into(),
            target: target.into(),
            to: Cardinality::One,
            singular: None,
            inverse: None,
        }
    }

    pub fn with_to(mut self, to: Cardinality) -> Self {
        self.to = to;
        self
    }

    pub fn with_singular(mut self, singular: impl Into<String>) -> Self {
        self.singular = Some(singular.into());
        self
    }

    pub fn entity(&self) -> &str {
        &self.entity
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Entity-type name of the objects on the other end
    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn to(&self) -> Cardinality {
        self.to
    }

    pub fn set_to(&mut self, to: Cardinality) {
        self.to = to;
    }

    pub fn is_to_many(&self) -> bool {
        self.to == Cardinality::Many
    }

    /// Singular name, only meaningful on To-Many relationships
    pub fn singular(&self) -> Option<&str> {
        self.singular.as_deref()
    }

    pub fn set_singular(&mut self, singular: Option<String>) {
        self.singular = singular;
    }

    pub fn inverse(&self) -> Option<&InverseRelationship> {
        self.inverse.as_ref()
    }

    pub fn set_inverse(&mut self, inverse: Option<InverseRelationship>) {
        self.inverse = inverse;
    }

    /// Symmetric classification; identical when asked from either end
    pub fn relationship_type(&self) -> RelationshipType {
        match (&self.inverse, self.to) {
            (None, Cardinality::One) => RelationshipType::OneToNone,
            (None, Cardinality::Many) => RelationshipType::ManyToNone,
            (Some(inverse), to) => match (to, inverse.to) {
                (Cardinality::One, Cardinality::One) => RelationshipType::OneToOne,
                (Cardinality::Many, Cardinality::Many) => RelationshipType::ManyToMany,
                _ => RelationshipType::OneToMany,
            },
        }
    }

    /// Join table shared by both ends: `Z_` + uppercase digest of the sorted names
    pub fn table_name(&self) -> Result<String> {
        let mut names: Vec<&str> = match &self.inverse {
            Some(inverse) => vec![
                self.entity.as_str(),
                inverse.entity.as_str(),
                self.name.as_str(),
                inverse.name.as_str(),
            ],
            None => vec![self.entity.as_str(), self.name.as_str()],
        };
        names.sort_unstable();
        let digest = name_digest(&names)?;
        Ok(format!("{}{}", JOIN_TABLE_PREFIX, digest.to_uppercase()))
    }

    /// Join-table column holding this end's object id
    pub fn column_name(&self) -> Result<String> {
        name_digest(&[self.entity.as_str(), self.name.as_str()])
    }

    /// Join-table column holding the other end's object id
    ///
    /// Without an inverse this hashes the target type alone, so two
    /// un-inversed relationships sharing a target type share this name.
    pub fn inverse_column_name(&self) -> Result<String> {
        match &self.inverse {
            Some(inverse) => name_digest(&[inverse.entity.as_str(), inverse.name.as_str()]),
            None => name_digest(&[self.target.as_str()]),
        }
    }
}

/// First 16 lowercase hex digits of the MD5 of the concatenated names
fn name_digest(names: &[&str]) -> Result<String> {
    let joined: String = names.concat();
    if joined.is_empty() {
        return Err(KeelError::persistent_store(
            "relationship_naming",
            "No names available to derive a table or column name",
        ));
    }
    let digest = hex::encode(Md5::digest(joined.as_bytes()));
    Ok(digest[..16].to_string())
}
