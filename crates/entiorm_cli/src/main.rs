//! EntiORM CLI
//!
//! Command-line tools for EntiORM file stores.
//!
//! # Commands
//!
//! - `inspect` - Display collections, record counts and config entries
//! - `config` - Read and write config entries
//! - `version` - Show version information

mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// EntiORM command-line store tools.
#[derive(Parser)]
#[command(name = "entiorm")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the store document
    #[arg(global = true, short, long)]
    path: Option<PathBuf>,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Display collections, record counts and config entries
    Inspect {
        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Read and write config entries
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Show version information
    Version,
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the value of a key
    Get {
        /// Config key
        key: String,
    },

    /// Set a key, replacing any previous value
    Set {
        /// Config key
        key: String,
        /// New value
        value: String,
    },

    /// List every entry
    List,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Inspect { format } => {
            let path = cli.path.ok_or("Store path required for inspect")?;
            let report = commands::inspect::run(&path).await?;
            match format.as_str() {
                "json" => println!("{}", serde_json::to_string_pretty(&report)?),
                "text" => print!("{report}"),
                other => return Err(format!("Unknown format: {other}").into()),
            }
        }
        Commands::Config { action } => {
            let path = cli.path.ok_or("Store path required for config")?;
            match action {
                ConfigAction::Get { key } => {
                    println!("{}", commands::config::get(&path, &key).await?);
                }
                ConfigAction::Set { key, value } => {
                    commands::config::set(&path, &key, &value).await?;
                }
                ConfigAction::List => {
                    for entry in commands::config::list(&path).await? {
                        println!("{}={}", entry.key, entry.value);
                    }
                }
            }
        }
        Commands::Version => {
            println!("EntiORM CLI v{}", env!("CARGO_PKG_VERSION"));
            println!("EntiORM Core v{}", entiorm_core::VERSION);
        }
    }

    Ok(())
}
