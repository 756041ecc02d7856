//! Subcommand implementations.

use std::path::{Path, PathBuf};

use sqlitekit_db::{
    journal_mode, open_and_migrate_sqlite_with, open_sqlite_with, MigrateError, MigrateOptions,
    MigrateOutcome, OpenError,
};
use thiserror::Error;

use crate::config::Config;

/// Errors surfaced by a subcommand.
#[derive(Debug, Error)]
pub enum CommandError {
    /// The schema file could not be read.
    #[error("failed to read schema file {}: {source}", path.display())]
    SchemaRead {
        /// The schema file given on the command line.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// Opening the database failed.
    #[error(transparent)]
    Open(#[from] OpenError),

    /// Migrating the database failed.
    #[error(transparent)]
    Migrate(#[from] MigrateError),
}

/// Settings observed on a freshly opened database.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenReport {
    /// Journal mode reported by SQLite.
    pub journal_mode: String,
    /// Maximum pool size.
    pub pool_size: u32,
}

/// Returns the database path from the command line, or the configured one.
pub fn database_path(arg: Option<PathBuf>, config: &Config) -> PathBuf {
    arg.unwrap_or_else(|| PathBuf::from(&config.database.path))
}

/// Opens the database at `path` and reports its settings.
///
/// # Errors
///
/// Returns `CommandError::Open` if the database cannot be opened.
pub fn open(path: &Path, config: &Config) -> Result<OpenReport, CommandError> {
    let pool = open_sqlite_with(path, config.database.runtime_settings())?;
    let report = OpenReport {
        journal_mode: journal_mode(&pool)?,
        pool_size: pool.max_size(),
    };

    tracing::info!(
        path = %path.display(),
        journal_mode = %report.journal_mode,
        pool_size = report.pool_size,
        "database ready"
    );

    Ok(report)
}

/// Reads the schema in `schema_file` and applies it to the database at `path`.
///
/// # Errors
///
/// Returns `CommandError::SchemaRead` if the schema file cannot be read and
/// `CommandError::Migrate` for hard migration failures.
pub fn migrate(
    schema_file: &Path,
    path: &Path,
    options: &MigrateOptions,
) -> Result<MigrateOutcome, CommandError> {
    let schema =
        std::fs::read_to_string(schema_file).map_err(|source| CommandError::SchemaRead {
            path: schema_file.to_path_buf(),
            source,
        })?;

    let outcome = open_and_migrate_sqlite_with(&schema, path, options)?;
    if outcome.is_migrated() {
        tracing::info!(path = %path.display(), "database migrated");
    }

    Ok(outcome)
}
