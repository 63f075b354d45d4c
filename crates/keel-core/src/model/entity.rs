//! Entity descriptions: the static shape of one entity

use super::property::PropertyDescription;
use super::relationship::RelationshipDescription;

/// One attribute of an entity: a scalar property or a relationship
#[derive(Debug, Clone, PartialEq)]
pub enum EntityAttribute {
    Property(PropertyDescription),
    Relationship(RelationshipDescription),
}

impl EntityAttribute {
    pub fn name(&self) -> &str {
        match self {
            EntityAttribute::Property(p) => p.name(),
            EntityAttribute::Relationship(r) => r.name(),
        }
    }

    /// Name of the owning entity
    pub fn entity(&self) -> &str {
        match self {
            EntityAttribute::Property(p) => p.entity(),
            EntityAttribute::Relationship(r) => r.entity(),
        }
    }

    pub fn as_property(&self) -> Option<&PropertyDescription> {
        match self {
            EntityAttribute::Property(p) => Some(p),
            EntityAttribute::Relationship(_) => None,
        }
    }

    pub fn as_relationship(&self) -> Option<&RelationshipDescription> {
        match self {
            EntityAttribute::Relationship(r) => Some(r),
            EntityAttribute::Property(_) => None,
        }
    }

    /// Matches the attribute name, or a relationship's singular name
    fn answers_to(&self, name: &str) -> bool {
        if self.name() == name {
            return true;
        }
        match self {
            EntityAttribute::Relationship(r) => r.singular() == Some(name),
            EntityAttribute::Property(_) => false,
        }
    }
}

impl From<PropertyDescription> for EntityAttribute {
    fn from(p: PropertyDescription) -> Self {
        EntityAttribute::Property(p)
    }
}

impl From<RelationshipDescription> for EntityAttribute {
    fn from(r: RelationshipDescription) -> Self {
        EntityAttribute::Relationship(r)
    }
}

/// Name, plural (the table name), backing type and ordered attributes
///
/// Attribute names are expected to be unique; lookups return the first match.
#[derive(Debug, Clone, PartialEq)]
pub struct EntityDescription {
    name: String,
    plural: String,
    class_name: String,
    attributes: Vec<EntityAttribute>,
}

impl EntityDescription {
    pub fn new(
        name: impl Into<String>,
        plural: impl Into<String>,
        class_name: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            plural: plural.into(),
            class_name: class_name.into(),
            attributes: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn plural(&self) -> &str {
        &self.plural
    }

    /// Backing type name declared by the schema's `class` attribute
    pub fn class_name(&self) -> &str {
        &self.class_name
    }

    pub fn add_attribute(&mut self, attribute: impl Into<EntityAttribute>) {
        self.attributes.push(attribute.into());
    }

    /// Remove the first attribute named `name`, returning it
    pub fn remove_attribute(&mut self, name: &str) -> Option<EntityAttribute> {
        let index = self.attributes.iter().position(|a| a.name() == name)?;
        Some(self.attributes.remove(index))
    }

    pub fn attributes(&self) -> &[EntityAttribute] {
        &self.attributes
    }

    pub fn properties(&self) -> impl Iterator<Item = &PropertyDescription> {
        self.attributes.iter().filter_map(EntityAttribute::as_property)
    }

    pub fn relationships(&self) -> impl Iterator<Item = &RelationshipDescription> {
        self.attributes
            .iter()
            .filter_map(EntityAttribute::as_relationship)
    }

    /// First attribute whose name, or relationship singular name, is `name`
    pub fn attribute_with_name(&self, name: &str) -> Option<&EntityAttribute> {
        self.attributes.iter().find(|a| a.answers_to(name))
    }

    pub(crate) fn attribute_with_name_mut(&mut self, name: &str) -> Option<&mut EntityAttribute> {
        self.attributes.iter_mut().find(|a| a.answers_to(name))
    }

    pub fn property(&self, name: &str) -> Option<&PropertyDescription> {
        self.attribute_with_name(name)
            .and_then(EntityAttribute::as_property)
    }

    pub fn relationship(&self, name: &str) -> Option<&RelationshipDescription> {
        self.attribute_with_name(name)
            .and_then(EntityAttribute::as_relationship)
    }

    /// Whether objects of this entity may sit on the target end of a
    /// relationship declaring `target_type`
    pub fn is_kind_of(&self, target_type: &str) -> bool {
        self.name == target_type || self.class_name == target_type
    }
}

impl std::fmt::Display for EntityDescription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}<{}>", self.name, self.class_name)
    }
}
