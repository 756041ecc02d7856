//! sqlitekit command-line interface.

pub mod commands;
pub mod config;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "sqlitekit")]
#[command(about = "Open SQLite databases in WAL mode and apply schemas with atlas")]
pub struct Cli {
    /// Configuration file (TOML)
    #[arg(long, global = true, env = "SQLITEKIT_CONFIG_PATH")]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Open (creating if needed) a database and report its settings
    Open {
        /// Database path; defaults to `database.path` from config
        path: Option<PathBuf>,
    },

    /// Apply a schema file to a database with the migration tool
    Migrate {
        /// File holding the desired schema
        schema: PathBuf,

        /// Database path; defaults to `database.path` from config
        path: Option<PathBuf>,
    },
}
