//! Declarative schema migration through the external `atlas` tool.
//!
//! The schema is written to [`SCHEMA_FILE_NAME`] inside the working
//! directory and handed to `atlas schema apply`, which diffs it against the
//! live database and applies the difference. The file name is fixed, so two
//! migrations running concurrently in the same working directory overwrite
//! each other's schema file.

use std::ffi::OsString;
use std::fmt;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus, Stdio};

use thiserror::Error;
use url::Url;

use crate::pool::{open_sqlite_with, DbPool, DbRuntimeSettings, OpenError, MEMORY_PATH};
use crate::tool::find_executable;

/// Name of the temporary schema file, relative to the working directory.
pub const SCHEMA_FILE_NAME: &str = "temp_migration_schema.sql";

/// Migration tool looked up on the search path.
pub const DEFAULT_TOOL: &str = "atlas";

/// Scratch database atlas uses to compute schema diffs.
pub const DEFAULT_DEV_URL: &str = "sqlite://file?mode=memory";

/// Settings for [`open_and_migrate_sqlite_with`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrateOptions {
    /// Executable name (or path) of the migration tool.
    pub tool: String,

    /// Directory that receives the temporary schema file. The tool runs with
    /// this as its working directory.
    pub work_dir: PathBuf,

    /// Dev database URL passed as `--dev-url`.
    pub dev_url: String,

    /// Search path used to locate `tool`. `None` uses `PATH`.
    pub search_path: Option<OsString>,

    /// Settings for every open performed during the migration.
    pub settings: DbRuntimeSettings,
}

impl Default for MigrateOptions {
    fn default() -> Self {
        Self {
            tool: DEFAULT_TOOL.to_string(),
            work_dir: PathBuf::from("."),
            dev_url: DEFAULT_DEV_URL.to_string(),
            search_path: None,
            settings: DbRuntimeSettings::default(),
        }
    }
}

/// Errors that can occur while migrating a database.
#[derive(Debug, Error)]
pub enum MigrateError {
    /// Opening the database failed.
    #[error(transparent)]
    Open(#[from] OpenError),

    /// The migration tool is not installed. Reported alongside a usable
    /// handle in [`MigrateOutcome::Skipped`].
    #[error("open sqlite: could not find '{tool}' executable on path, is it installed? skipping migrations...")]
    ToolMissing {
        /// The tool that was searched for.
        tool: String,
    },

    /// The schema could not be written to the temporary file.
    #[error("open sqlite: failed to write {}: {source}", path.display())]
    SchemaWrite {
        /// The temporary schema file.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// The target URL could not be built.
    #[error("open sqlite: invalid database url: {0}")]
    Url(#[from] url::ParseError),

    /// The migration tool could not be started.
    #[error("open sqlite: failed to run '{tool}': {source}")]
    Launch {
        /// The resolved tool path.
        tool: String,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// The migration tool ran and reported failure.
    #[error("open sqlite: '{tool}' failed: {status}")]
    Exit {
        /// The resolved tool path.
        tool: String,
        /// The tool's exit status.
        status: ExitStatus,
    },
}

/// Result of a migration that produced a usable handle.
pub enum MigrateOutcome {
    /// The schema was applied.
    Migrated(DbPool),

    /// The schema was not applied, but the database is open. `reason` says
    /// why.
    Skipped {
        /// Handle to the unmigrated database.
        pool: DbPool,
        /// The diagnostic for the skipped migration.
        reason: MigrateError,
    },
}

impl MigrateOutcome {
    /// Returns the database handle.
    pub fn pool(&self) -> &DbPool {
        match self {
            Self::Migrated(pool) | Self::Skipped { pool, .. } => pool,
        }
    }

    /// Consumes the outcome, returning the database handle.
    pub fn into_pool(self) -> DbPool {
        match self {
            Self::Migrated(pool) | Self::Skipped { pool, .. } => pool,
        }
    }

    /// Returns `true` if the schema was applied.
    pub fn is_migrated(&self) -> bool {
        matches!(self, Self::Migrated(_))
    }

    /// Returns the reason the migration was skipped, if it was.
    pub fn skip_reason(&self) -> Option<&MigrateError> {
        match self {
            Self::Migrated(_) => None,
            Self::Skipped { reason, .. } => Some(reason),
        }
    }
}

impl fmt::Debug for MigrateOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Migrated(_) => f.write_str("Migrated"),
            Self::Skipped { reason, .. } => {
                f.debug_struct("Skipped").field("reason", reason).finish()
            }
        }
    }
}

/// Opens the database at `path` and applies `schema` with default
/// [`MigrateOptions`].
///
/// See [`open_and_migrate_sqlite_with`].
pub fn open_and_migrate_sqlite(
    schema: &str,
    path: impl AsRef<Path>,
) -> Result<MigrateOutcome, MigrateError> {
    open_and_migrate_sqlite_with(schema, path, &MigrateOptions::default())
}

/// Opens (creating if needed) the database at `path` and applies `schema`
/// with the migration tool.
///
/// The tool inherits stdin, stdout and stderr, and blocks the caller until it
/// exits. If the tool is not installed, the database is still opened and
/// returned as [`MigrateOutcome::Skipped`].
///
/// # Errors
///
/// Returns `MigrateError::Open` if the database cannot be opened,
/// `MigrateError::Url` if the target has no URL form (such as `:memory:`),
/// `MigrateError::SchemaWrite` if the temporary schema file cannot be written,
/// and `MigrateError::Launch` or `MigrateError::Exit` if the tool fails.
pub fn open_and_migrate_sqlite_with(
    schema: &str,
    path: impl AsRef<Path>,
    options: &MigrateOptions,
) -> Result<MigrateOutcome, MigrateError> {
    let path = path.as_ref();

    // Creates the database file; atlas opens its own connection.
    drop(open_sqlite_with(path, options.settings)?);

    let Some(tool) = find_executable(&options.tool, options.search_path.as_deref()) else {
        let reason = MigrateError::ToolMissing {
            tool: options.tool.clone(),
        };
        tracing::warn!(tool = %options.tool, "{reason}");
        let pool = open_sqlite_with(path, options.settings)?;
        return Ok(MigrateOutcome::Skipped { pool, reason });
    };

    // The tool runs from `work_dir`, so a relative hit on the search path
    // must be resolved first.
    let tool = std::path::absolute(&tool).unwrap_or(tool);

    // Built before the schema file exists, so an unreachable target leaves
    // nothing behind.
    let target = sqlite_url(&target_path(path))?;

    let _schema_file = SchemaFile::write(&options.work_dir, schema)?;

    let tool_name = tool.display().to_string();

    tracing::info!(tool = %tool_name, url = %target, "applying schema");

    let status = Command::new(&tool)
        .args(["schema", "apply", "--url", target.as_str(), "--to"])
        .arg(format!("file://{SCHEMA_FILE_NAME}"))
        .args(["--dev-url", options.dev_url.as_str()])
        .current_dir(&options.work_dir)
        .stdin(Stdio::inherit())
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit())
        .status()
        .map_err(|source| MigrateError::Launch {
            tool: tool_name.clone(),
            source,
        })?;

    if !status.success() {
        return Err(MigrateError::Exit {
            tool: tool_name,
            status,
        });
    }

    tracing::info!(path = %path.display(), "schema applied");

    Ok(MigrateOutcome::Migrated(open_sqlite_with(path, options.settings)?))
}

/// Builds the `sqlite://` URL atlas uses to reach the database at `path`.
///
/// # Errors
///
/// Returns a parse error if `path` does not form a valid URL.
pub fn sqlite_url(path: &Path) -> Result<Url, url::ParseError> {
    let path = path.to_string_lossy().replace('\\', "/");
    if path.starts_with('/') {
        let mut url = Url::parse("sqlite://")?;
        url.set_path(&path);
        Ok(url)
    } else {
        Url::parse(&format!("sqlite://{path}"))
    }
}

/// Absolute database path, so the URL stays valid from the tool's working
/// directory. The file exists by the time this runs.
fn target_path(path: &Path) -> PathBuf {
    if path == Path::new(MEMORY_PATH) {
        return path.to_path_buf();
    }
    std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}

/// The schema handed to the tool. Deleted on drop.
struct SchemaFile {
    path: PathBuf,
}

impl SchemaFile {
    fn write(dir: &Path, schema: &str) -> Result<Self, MigrateError> {
        let path = dir.join(SCHEMA_FILE_NAME);

        let mut options = OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o666);
        }

        match options
            .open(&path)
            .and_then(|mut file| file.write_all(schema.as_bytes()))
        {
            Ok(()) => Ok(Self { path }),
            Err(source) => Err(MigrateError::SchemaWrite { path, source }),
        }
    }
}

impl Drop for SchemaFile {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            tracing::warn!(
                path = %self.path.display(),
                error = %e,
                "could not delete temporary schema file"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_file_is_removed_on_drop() {
        let dir = tempfile::tempdir().expect("failed to create temp dir");
        let path = dir.path().join(SCHEMA_FILE_NAME);

        let file = SchemaFile::write(dir.path(), "CREATE TABLE t (id INTEGER);")
            .expect("should write schema");
        assert_eq!(
            std::fs::read_to_string(&path).expect("should read schema"),
            "CREATE TABLE t (id INTEGER);"
        );

        drop(file);
        assert!(!path.exists(), "schema file should be deleted");
    }

    #[test]
    fn schema_file_overwrites_leftover() {
        let dir = tempfile::tempdir().expect("failed to create temp dir");
        let path = dir.path().join(SCHEMA_FILE_NAME);
        std::fs::write(&path, "a much longer leftover schema from an earlier run")
            .expect("should write leftover");

        let _file = SchemaFile::write(dir.path(), "short").expect("should write schema");
        assert_eq!(std::fs::read_to_string(&path).expect("should read"), "short");
    }

    #[test]
    fn schema_file_tolerates_external_removal() {
        let dir = tempfile::tempdir().expect("failed to create temp dir");
        let file = SchemaFile::write(dir.path(), "").expect("should write schema");

        std::fs::remove_file(dir.path().join(SCHEMA_FILE_NAME)).expect("should remove");
        // Only logs.
        drop(file);
    }

    #[test]
    fn schema_write_into_missing_dir_fails() {
        let dir = tempfile::tempdir().expect("failed to create temp dir");
        let missing = dir.path().join("missing");

        match SchemaFile::write(&missing, "") {
            Err(MigrateError::SchemaWrite { path, .. }) => {
                assert_eq!(path, missing.join(SCHEMA_FILE_NAME))
            }
            Err(other) => panic!("unexpected error type: {other:?}"),
            Ok(_) => panic!("write into a missing directory should fail"),
        }
    }

    #[test]
    fn absolute_path_url() {
        let url = sqlite_url(Path::new("/var/lib/app/data.db")).expect("should build url");
        assert_eq!(url.as_str(), "sqlite:///var/lib/app/data.db");
    }

    #[test]
    fn url_escapes_spaces() {
        let url = sqlite_url(Path::new("/tmp/my data/app.db")).expect("should build url");
        assert_eq!(url.as_str(), "sqlite:///tmp/my%20data/app.db");
    }

    #[test]
    fn relative_path_url() {
        let url = sqlite_url(Path::new("data/app.db")).expect("should build url");
        assert_eq!(url.as_str(), "sqlite://data/app.db");
    }

    #[test]
    fn error_messages_carry_prefix() {
        let missing = MigrateError::ToolMissing {
            tool: "atlas".to_string(),
        };
        assert_eq!(
            missing.to_string(),
            "open sqlite: could not find 'atlas' executable on path, is it installed? skipping migrations..."
        );

        let open: MigrateError = OpenError::JournalMode("delete".to_string()).into();
        assert!(open.to_string().starts_with("open sqlite: "));
    }

    #[test]
    fn default_options() {
        let options = MigrateOptions::default();
        assert_eq!(options.tool, "atlas");
        assert_eq!(options.work_dir, PathBuf::from("."));
        assert_eq!(options.dev_url, "sqlite://file?mode=memory");
        assert_eq!(options.search_path, None);
    }
}
