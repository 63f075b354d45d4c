//! Import command
//!
//! Usage: keel import <PATH>

use clap::Args;
use std::path::PathBuf;

use crate::config::KeelConfig;

#[derive(Debug, Args)]
pub struct ImportArgs {
    /// XML object document
    pub path: PathBuf,
}

/// Execute import command
pub fn execute(args: ImportArgs, config: &KeelConfig) -> Result<(), Box<dyn std::error::Error>> {
    let mut ctx = config.context()?;

    println!("Importing {}...", args.path.display());
    let objects = ctx.parse_objects_from_file(&args.path)?;
    let top_level = objects.len();
    ctx.save()?;

    println!(
        "✓ Imported {} top-level objects ({} in total)",
        top_level,
        ctx.graph().len()
    );
    Ok(())
}
