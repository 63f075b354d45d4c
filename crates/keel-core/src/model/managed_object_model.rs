//! Versioned schema document loader
//!
//! A schema document holds several `model` blocks, one per version. Loading
//! selects one block and builds its entity descriptions in two passes:
//! entities first, then inverse relationships, because an inverse may name
//! an entity declared further down the document.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::entity::{EntityAttribute, EntityDescription};
use super::property::PropertyDescription;
use super::relationship::{Cardinality, InverseRelationship, RelationshipDescription};
use super::value::ScalarType;
use super::xml_format::{EntityElement, ModelsDocument};
use crate::errors::{KeelError, Result};

const INLINE_SOURCE: &str = "<inline>";

#[derive(Debug, Clone)]
struct ModelSource {
    path: Option<PathBuf>,
    document: Arc<str>,
}

impl ModelSource {
    fn name(&self) -> String {
        match &self.path {
            Some(path) => path.display().to_string(),
            None => INLINE_SOURCE.to_string(),
        }
    }
}

/// One version of a schema document, parsed into entity descriptions
#[derive(Debug, Clone)]
pub struct ManagedObjectModel {
    source: ModelSource,
    version: String,
    entities: Vec<Arc<EntityDescription>>,
}

/// Inverse link recorded during the first pass
struct PendingInverse {
    entity_index: usize,
    relationship: String,
    target: String,
    inverse: String,
}

impl ManagedObjectModel {
    /// Load `version` (or the document's current version) from a file
    pub fn from_file(path: impl AsRef<Path>, version: Option<&str>) -> Result<Self> {
        let path = path.as_ref();
        let document = std::fs::read_to_string(path).map_err(|e| KeelError::ModelParse {
            source_name: path.display().to_string(),
            message: format!("Cannot read schema document: {}", e),
        })?;
        Self::load(
            ModelSource {
                path: Some(path.to_path_buf()),
                document: Arc::from(document),
            },
            version,
        )
    }

    /// Load `version` (or the document's current version) from document text
    pub fn from_xml_str(document: &str, version: Option<&str>) -> Result<Self> {
        Self::load(
            ModelSource {
                path: None,
                document: Arc::from(document),
            },
            version,
        )
    }

    /// Parse another version of the same schema document
    pub fn model_for_version(&self, version: &str) -> Result<Self> {
        Self::load(self.source.clone(), Some(version))
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn source_path(&self) -> Option<&Path> {
        self.source.path.as_deref()
    }

    pub fn entities(&self) -> &[Arc<EntityDescription>] {
        &self.entities
    }

    /// Entity whose name or plural name is `name`
    pub fn entity_with_name(&self, name: &str) -> Option<&Arc<EntityDescription>> {
        self.entities
            .iter()
            .find(|e| e.name() == name || e.plural() == name)
    }

    /// Resolve an `Entity.attribute` path
    pub fn attribute_with_path(&self, path: &str) -> Option<&EntityAttribute> {
        let (entity, attribute) = path.split_once('.')?;
        if attribute.contains('.') {
            return None;
        }
        self.entity_with_name(entity)?.attribute_with_name(attribute)
    }

    fn load(source: ModelSource, version: Option<&str>) -> Result<Self> {
        let source_name = source.name();
        let parse_error = |message: String| KeelError::ModelParse {
            source_name: source_name.clone(),
            message,
        };

        let document: ModelsDocument = quick_xml::de::from_str(&source.document)
            .map_err(|e| parse_error(format!("Malformed schema document: {}", e)))?;

        let version = match version.or(document.current_version()) {
            Some(v) => v.to_string(),
            None => {
                return Err(parse_error(
                    "No model version requested and no current version declared".to_string(),
                ))
            }
        };

        // Later blocks win when a version is declared twice
        let model = document
            .models
            .iter()
            .rev()
            .find(|m| m.version.trim() == version)
            .ok_or_else(|| KeelError::ModelVersionNotFound {
                source_name: source_name.clone(),
                version: version.clone(),
            })?;

        let mut entities: Vec<EntityDescription> = Vec::with_capacity(model.entities.len());
        let mut pending: Vec<PendingInverse> = Vec::new();

        for element in &model.entities {
            if entities.iter().any(|e| e.name() == element.name) {
                return Err(parse_error(format!(
                    "Duplicate entity name '{}'",
                    element.name
                )));
            }
            let entity_index = entities.len();
            let entity = build_entity(element, entity_index, &mut pending).map_err(parse_error)?;
            entities.push(entity);
        }

        // Second pass: every entity exists, resolve the recorded inverses
        let mut resolved: Vec<(usize, String, InverseRelationship)> = Vec::new();
        for link in &pending {
            let owner = entities[link.entity_index].name().to_string();
            let target = entities
                .iter()
                .find(|e| e.name() == link.target || e.plural() == link.target)
                .ok_or_else(|| {
                    parse_error(format!(
                        "[{}.{}] Inverse relationship's entity named '{}' not defined in model version {}",
                        owner, link.relationship, link.target, version
                    ))
                })?;
            let inverse = target.relationship(&link.inverse).ok_or_else(|| {
                parse_error(format!(
                    "[{}.{}] Could not find the relationship named '{}' in entity '{}'",
                    owner,
                    link.relationship,
                    link.inverse,
                    target.name()
                ))
            })?;
            resolved.push((
                link.entity_index,
                link.relationship.clone(),
                InverseRelationship {
                    entity: target.name().to_string(),
                    name: inverse.name().to_string(),
                    to: inverse.to(),
                },
            ));
        }

        for (entity_index, relationship, inverse) in resolved {
            if let Some(EntityAttribute::Relationship(r)) =
                entities[entity_index].attribute_with_name_mut(&relationship)
            {
                r.set_inverse(Some(inverse));
            }
        }

        tracing::debug!(
            source = %source_name,
            version = %version,
            entities = entities.len(),
            "Loaded managed object model"
        );

        Ok(Self {
            source,
            version,
            entities: entities.into_iter().map(Arc::new).collect(),
        })
    }
}

fn build_entity(
    element: &EntityElement,
    entity_index: usize,
    pending: &mut Vec<PendingInverse>,
) -> std::result::Result<EntityDescription, String> {
    let class_name = element.class.as_deref().unwrap_or(&element.name);
    let mut entity = EntityDescription::new(&element.name, &element.plural, class_name);

    for p in &element.properties {
        let type_name = p.scalar_type.as_deref().unwrap_or("String");
        let scalar_type = ScalarType::parse(type_name).ok_or_else(|| {
            format!(
                "[{}.{}] Invalid data type '{}'",
                element.name, p.name, type_name
            )
        })?;
        let mut property = PropertyDescription::new(&element.name, &p.name, scalar_type);
        if let Some(raw) = &p.default_value {
            let default = scalar_type
                .parse_default(raw)
                .map_err(|reason| format!("[{}.{}] {}", element.name, p.name, reason))?;
            property
                .set_default_value(default)
                .map_err(|e| e.to_string())?;
        }
        entity.add_attribute(property);
    }

    for r in &element.relationships {
        let to = r.to.as_deref().map(Cardinality::parse).unwrap_or(Cardinality::One);
        let mut relationship =
            RelationshipDescription::new(&element.name, &r.name, &r.target).with_to(to);
        relationship.set_singular(r.singular.clone().filter(|s| !s.trim().is_empty()));
        if let Some(inverse) = r.inverse.as_deref().filter(|s| !s.trim().is_empty()) {
            pending.push(PendingInverse {
                entity_index,
                relationship: r.name.clone(),
                target: r.target.clone(),
                inverse: inverse.to_string(),
            });
        }
        entity.add_attribute(relationship);
    }

    Ok(entity)
}
