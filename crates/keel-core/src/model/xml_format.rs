//! Versioned schema document structure
//!
//! ```xml
//! <models current-version="2">
//!   <model version="2">
//!     <entity name="Author" plural="Authors" class="Author">
//!       <property name="name" type="String" defaultValue="Anonymous"/>
//!       <relationship name="books" type="Book" to="many" singular="book" inverse="author"/>
//!     </entity>
//!   </model>
//! </models>
//! ```
//!
//! The current version may also be given as a `<current-version>` child of
//! the root element.

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct ModelsDocument {
    #[serde(rename = "@current-version", default)]
    pub current_version_attribute: Option<String>,

    #[serde(rename = "current-version", default)]
    pub current_version_element: Option<String>,

    #[serde(rename = "model", default)]
    pub models: Vec<ModelElement>,
}

impl ModelsDocument {
    /// Declared current version, attribute first
    pub fn current_version(&self) -> Option<&str> {
        self.current_version_attribute
            .as_deref()
            .or(self.current_version_element.as_deref())
            .map(str::trim)
            .filter(|v| !v.is_empty())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ModelElement {
    #[serde(rename = "@version")]
    pub version: String,

    #[serde(rename = "entity", default)]
    pub entities: Vec<EntityElement>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EntityElement {
    #[serde(rename = "@name")]
    pub name: String,

    #[serde(rename = "@plural")]
    pub plural: String,

    /// Backing type name; defaults to the entity name
    #[serde(rename = "@class", default)]
    pub class: Option<String>,

    #[serde(rename = "property", default)]
    pub properties: Vec<PropertyElement>,

    #[serde(rename = "relationship", default)]
    pub relationships: Vec<RelationshipElement>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PropertyElement {
    #[serde(rename = "@name")]
    pub name: String,

    /// One of String, Integer, Float, Boolean, Date, Binary; String if absent
    #[serde(rename = "@type", default)]
    pub scalar_type: Option<String>,

    #[serde(rename = "@defaultValue", default)]
    pub default_value: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RelationshipElement {
    #[serde(rename = "@name")]
    pub name: String,

    /// Target entity-type name
    #[serde(rename = "@type")]
    pub target: String,

    /// "one" or "many"; To-One if absent
    #[serde(rename = "@to", default)]
    pub to: Option<String>,

    #[serde(rename = "@singular", default)]
    pub singular: Option<String>,

    /// Name of the relationship on the target entity that links back
    #[serde(rename = "@inverse", default)]
    pub inverse: Option<String>,
}
