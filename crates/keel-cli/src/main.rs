//! Keel CLI
//!
//! Command-line interface for Keel object stores

use clap::{Parser, Subcommand};

mod commands;
mod config;

use config::{GlobalOptions, KeelConfig};

#[derive(Debug, Parser)]
#[command(name = "keel")]
#[command(about = "Keel - schema-driven object persistence", long_about = None)]
struct Cli {
    #[command(flatten)]
    options: GlobalOptions,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Print entity tables, join tables and column names
    Schema(commands::schema::SchemaArgs),
    /// Create the database structure of every configured store
    Init(commands::init::InitArgs),
    /// Print the objects of an entity as JSON
    Fetch(commands::fetch::FetchArgs),
    /// Import objects from an XML document and save them
    Import(commands::import::ImportArgs),
}

fn main() {
    let cli = Cli::parse();

    let result = KeelConfig::resolve(&cli.options).and_then(|config| {
        config.init_logging();
        match cli.command {
            Commands::Schema(args) => commands::schema::execute(args, &config),
            Commands::Init(args) => commands::init::execute(args, &config),
            Commands::Fetch(args) => commands::fetch::execute(args, &config),
            Commands::Import(args) => commands::import::execute(args, &config),
        }
    });

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
