//! Schema command
//!
//! Usage: keel schema [--entity <NAME>]

use clap::Args;
use keel_core::model::{EntityDescription, ManagedObjectModel};

use crate::config::KeelConfig;

#[derive(Debug, Args)]
pub struct SchemaArgs {
    /// Only describe this entity (name or plural)
    #[arg(long)]
    pub entity: Option<String>,
}

/// Execute schema command
pub fn execute(args: SchemaArgs, config: &KeelConfig) -> Result<(), Box<dyn std::error::Error>> {
    let model = config.load_model()?;
    print!("{}", describe(&model, args.entity.as_deref())?);
    Ok(())
}

/// Text description of the tables `model` maps to
pub fn describe(
    model: &ManagedObjectModel,
    only: Option<&str>,
) -> Result<String, Box<dyn std::error::Error>> {
    let entities: Vec<&EntityDescription> = match only {
        Some(name) => vec![model
            .entity_with_name(name)
            .map(|e| e.as_ref())
            .ok_or_else(|| format!("Unknown entity '{}'", name))?],
        None => model.entities().iter().map(|e| e.as_ref()).collect(),
    };

    let mut out = format!("Model version {}\n", model.version());
    for entity in entities {
        out.push_str(&format!("\n{} (table {})\n", entity.name(), entity.plural()));
        for property in entity.properties() {
            out.push_str(&format!(
                "  {:<16} {:<8} {}\n",
                property.name(),
                property.scalar_type(),
                keel_store::schema::column_type(property.scalar_type())
            ));
        }
        for relationship in entity.relationships() {
            let inverse = relationship
                .inverse()
                .map(|i| format!("{}.{}", i.entity, i.name))
                .unwrap_or_else(|| "-".to_string());
            out.push_str(&format!(
                "  {:<16} -> {} ({:?}, inverse {})\n    join {} ({}, {})\n",
                relationship.name(),
                relationship.target(),
                relationship.relationship_type(),
                inverse,
                relationship.table_name()?,
                relationship.column_name()?,
                relationship.inverse_column_name()?
            ));
        }
    }
    Ok(out)
}
