//! Building new managed objects from an XML object document
//!
//! ```xml
//! <library>
//!   <Author>
//!     <name>Ursula</name>
//!     <books>
//!       <Book><title>The Dispossessed</title></Book>
//!     </books>
//!   </Author>
//! </library>
//! ```
//!
//! Every child of the root is an entity-named element. Its children name
//! attributes: property elements hold text converted per scalar type
//! (Binary as base64), relationship elements hold nested entity elements
//! that are linked through mirrored relationship insertion.

#![allow(clippy::result_large_err)]

use std::path::Path;
use std::time::Instant;

use base64::Engine as _;
use quick_xml::events::Event;
use quick_xml::Reader;

use crate::context::ManagedObjectContext;
use crate::errors::{KeelError, Result};
use crate::model::{parse_bool, parse_date, EntityAttribute, PropertyDescription, ScalarType, Value};
use crate::object::{ObjectHandle, ObjectId};
use crate::{log_op_end, log_op_error, log_op_start};

#[derive(Debug, Default)]
struct XmlNode {
    name: String,
    text: String,
    children: Vec<XmlNode>,
}

impl ManagedObjectContext {
    /// Create objects for every entity element under the document root
    ///
    /// Objects are new and unsaved; call `save` to insert them.
    ///
    /// # Errors
    /// Fails on malformed XML, unknown entities or attributes, and values
    /// that do not convert to their property's type.
    pub fn parse_objects_from_str(&mut self, document: &str) -> Result<Vec<ObjectHandle>> {
        log_op_start!("import");
        let start = Instant::now();

        let result = parse_tree(document).and_then(|root| {
            root.children
                .iter()
                .map(|node| self.import_node(node))
                .collect::<Result<Vec<_>>>()
        });
        let objects = result.map_err(|e| {
            log_op_error!(
                "import",
                e.clone(),
                duration_ms = start.elapsed().as_millis() as u64
            );
            e
        })?;

        log_op_end!(
            "import",
            duration_ms = start.elapsed().as_millis() as u64,
            results = objects.len()
        );
        Ok(objects)
    }

    pub fn parse_objects_from_file(&mut self, path: impl AsRef<Path>) -> Result<Vec<ObjectHandle>> {
        let document = std::fs::read_to_string(path.as_ref())?;
        self.parse_objects_from_str(&document)
    }

    fn import_node(&mut self, node: &XmlNode) -> Result<ObjectHandle> {
        let entity = self.entity(&node.name)?;
        let handle = self.new_object_for_entity(&entity, ObjectId::Unknown);

        for child in &node.children {
            let attribute = entity.attribute_with_name(&child.name).ok_or_else(|| {
                KeelError::AttributeNotFound {
                    entity: entity.name().to_string(),
                    attribute: child.name.clone(),
                }
            })?;
            match attribute {
                EntityAttribute::Property(property) => {
                    let value = convert_text(property, &child.text)?;
                    self.set_value(handle, property.name(), Some(value))?;
                }
                EntityAttribute::Relationship(relationship) => {
                    for nested in &child.children {
                        let related = self.import_node(nested)?;
                        self.add_to_relationship(handle, relationship.name(), related)?;
                    }
                }
            }
        }
        Ok(handle)
    }
}

fn convert_text(property: &PropertyDescription, text: &str) -> Result<Value> {
    let invalid = || KeelError::InvalidOperation {
        object: format!("{}.{}", property.entity(), property.name()),
        message: format!(
            "Cannot convert '{}' to {}",
            text,
            property.scalar_type()
        ),
    };
    let trimmed = text.trim();
    match property.scalar_type() {
        ScalarType::String => Ok(Value::String(text.to_string())),
        ScalarType::Integer => trimmed.parse::<i64>().map(Value::Integer).map_err(|_| invalid()),
        ScalarType::Float => trimmed.parse::<f64>().map(Value::Float).map_err(|_| invalid()),
        ScalarType::Boolean => parse_bool(trimmed).map(Value::Boolean).ok_or_else(invalid),
        ScalarType::Date => parse_date(trimmed).map(Value::Date).ok_or_else(invalid),
        ScalarType::Binary => base64::engine::general_purpose::STANDARD
            .decode(trimmed)
            .map(Value::Binary)
            .map_err(|_| invalid()),
    }
}

fn parse_tree(document: &str) -> Result<XmlNode> {
    let malformed = |message: String| KeelError::InvalidOperation {
        object: "object document".to_string(),
        message,
    };

    let mut reader = Reader::from_str(document);
    reader.trim_text(true);

    let mut stack: Vec<XmlNode> = Vec::new();
    let mut root: Option<XmlNode> = None;

    loop {
        match reader
            .read_event()
            .map_err(|e| malformed(format!("Malformed XML: {}", e)))?
        {
            Event::Start(e) => stack.push(XmlNode {
                name: element_name(e.name().as_ref()).map_err(malformed)?,
                ..XmlNode::default()
            }),
            Event::Empty(e) => {
                let node = XmlNode {
                    name: element_name(e.name().as_ref()).map_err(malformed)?,
                    ..XmlNode::default()
                };
                attach(&mut stack, &mut root, node);
            }
            Event::End(_) => {
                let node = stack
                    .pop()
                    .ok_or_else(|| malformed("Unbalanced closing tag".to_string()))?;
                attach(&mut stack, &mut root, node);
            }
            Event::Text(t) => {
                let text = t
                    .unescape()
                    .map_err(|e| malformed(format!("Malformed text: {}", e)))?;
                if let Some(top) = stack.last_mut() {
                    top.text.push_str(&text);
                }
            }
            Event::CData(c) => {
                let bytes = c.into_inner();
                let text = std::str::from_utf8(&bytes)
                    .map_err(|e| malformed(format!("Malformed CDATA: {}", e)))?;
                if let Some(top) = stack.last_mut() {
                    top.text.push_str(text);
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if !stack.is_empty() {
        return Err(malformed("Unclosed element at end of document".to_string()));
    }
    root.ok_or_else(|| malformed("Empty object document".to_string()))
}

fn element_name(raw: &[u8]) -> std::result::Result<String, String> {
    std::str::from_utf8(raw)
        .map(str::to_string)
        .map_err(|e| format!("Element name is not UTF-8: {}", e))
}

fn attach(stack: &mut [XmlNode], root: &mut Option<XmlNode>, node: XmlNode) {
    match stack.last_mut() {
        Some(parent) => parent.children.push(node),
        None => *root = Some(node),
    }
}
