//! Fetch command
//!
//! Usage: keel fetch <ENTITY> [--where <PREDICATE>]

use clap::Args;
use keel_core::{FetchRequest, ManagedObjectContext, ObjectHandle};
use serde_json::{json, Map, Value as Json};

use crate::config::KeelConfig;

#[derive(Debug, Args)]
pub struct FetchArgs {
    /// Entity name or plural
    pub entity: String,

    /// SQL condition placed after WHERE
    #[arg(long = "where")]
    pub predicate: Option<String>,
}

/// Execute fetch command
pub fn execute(args: FetchArgs, config: &KeelConfig) -> Result<(), Box<dyn std::error::Error>> {
    let mut ctx = config.context()?;
    let entity = ctx.entity(&args.entity)?;

    let mut request = FetchRequest::new(entity);
    if let Some(predicate) = args.predicate {
        request = request.with_predicate(predicate);
    }

    let objects = ctx.execute_fetch_request(&request)?;
    let rendered = objects
        .into_iter()
        .map(|handle| object_json(&mut ctx, handle))
        .collect::<Result<Vec<_>, _>>()?;

    println!("{}", serde_json::to_string_pretty(&rendered)?);
    Ok(())
}

/// Loaded object as JSON; links are given as row ids
fn object_json(
    ctx: &mut ManagedObjectContext,
    handle: ObjectHandle,
) -> Result<Json, Box<dyn std::error::Error>> {
    ctx.fire_fault(handle)?;
    let entity = std::sync::Arc::clone(ctx.object(handle)?.entity());

    let mut properties = Map::new();
    for property in entity.properties() {
        let value = ctx.value(handle, property.name())?;
        properties.insert(property.name().to_string(), serde_json::to_value(value)?);
    }

    let mut relationships = Map::new();
    for relationship in entity.relationships() {
        let mut ids = Vec::new();
        for related in ctx.related_objects(handle, relationship.name())? {
            ids.push(ctx.object(related)?.object_id().row());
        }
        relationships.insert(relationship.name().to_string(), json!(ids));
    }

    Ok(json!({
        "entity": entity.name(),
        "objectID": ctx.object(handle)?.object_id().row(),
        "properties": properties,
        "relationships": relationships,
    }))
}
