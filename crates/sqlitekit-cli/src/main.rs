//! sqlitekit binary: opens SQLite databases and applies schemas with atlas.

use clap::Parser;
use sqlitekit_cli::commands::{self, CommandError};
use sqlitekit_cli::config::{self, Config, LoggingConfig, DEFAULT_CONFIG_PATH};
use sqlitekit_cli::{Cli, Command};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

fn init_tracing(logging: &LoggingConfig) {
    let filter = EnvFilter::try_new(&logging.level).unwrap_or_else(|_| EnvFilter::new("info"));

    // stdout belongs to the migration tool.
    if logging.json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    }
}

fn run(command: Command, config: &Config) -> Result<(), CommandError> {
    match command {
        Command::Open { path } => {
            let path = commands::database_path(path, config);
            commands::open(&path, config)?;
        }
        Command::Migrate { schema, path } => {
            let path = commands::database_path(path, config);
            // A skipped migration still leaves an open, usable database, so
            // it is reported but does not fail the command.
            commands::migrate(&schema, &path, &config.migrate_options())?;
        }
    }
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let (config_path, config_source) = match cli.config.as_deref() {
        Some(path) => (path, "cli-arg"),
        None => (DEFAULT_CONFIG_PATH, "default"),
    };

    let config = match config::load_config(Some(config_path)) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{e}");
            return ExitCode::from(2);
        }
    };

    init_tracing(&config.logging);

    tracing::debug!(
        source = config_source,
        path = config_path,
        "resolved configuration path"
    );

    match run(cli.command, &config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "command failed");
            ExitCode::FAILURE
        }
    }
}
