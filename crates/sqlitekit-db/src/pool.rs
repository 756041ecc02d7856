//! Connection pool creation and configuration.

use std::path::Path;
use std::time::Duration;

use r2d2::{ManageConnection, Pool};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::OpenFlags;
use thiserror::Error;

/// Path that selects a non-persistent, memory-only database.
pub const MEMORY_PATH: &str = ":memory:";

/// The pool never holds more than one connection.
const POOL_MAX_SIZE: u32 = 1;

/// Runtime tunables for SQLite connection behavior.
///
/// The pool size is not among them: it is always one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DbRuntimeSettings {
    /// Busy timeout for SQLite connections, in milliseconds.
    pub busy_timeout_ms: u64,

    /// How long to wait for the pooled connection before giving up, in
    /// milliseconds.
    pub connection_timeout_ms: u64,
}

impl Default for DbRuntimeSettings {
    fn default() -> Self {
        Self {
            busy_timeout_ms: 5_000,
            connection_timeout_ms: 30_000,
        }
    }
}

/// A type alias for the single-connection SQLite pool.
pub type DbPool = Pool<SqliteConnectionManager>;

/// Errors that can occur when opening a database.
#[derive(Debug, Error)]
pub enum OpenError {
    /// SQLite refused to open the database file.
    #[error("open sqlite: {0}")]
    Connect(#[source] rusqlite::Error),

    /// Failed to build the pool or check out its connection.
    #[error("open sqlite: {0}")]
    Pool(#[from] r2d2::Error),

    /// The journal mode pragma failed.
    #[error("open sqlite: failed to set journal mode: {0}")]
    Pragma(#[source] rusqlite::Error),

    /// SQLite accepted the pragma but kept a different journal mode.
    #[error("open sqlite: failed to set WAL journal mode, got: {0}")]
    JournalMode(String),
}

/// Opens the database at `path` with default [`DbRuntimeSettings`].
///
/// See [`open_sqlite_with`].
pub fn open_sqlite(path: impl AsRef<Path>) -> Result<DbPool, OpenError> {
    open_sqlite_with(path, DbRuntimeSettings::default())
}

/// Opens the database at `path` as a one-connection pool in WAL mode.
///
/// Missing parent directories are created first (best effort). Pass
/// [`MEMORY_PATH`] for an in-memory database; no directories are touched then.
/// Nothing is undone on failure.
///
/// # Errors
///
/// Returns `OpenError::Connect` if SQLite cannot open the file,
/// `OpenError::Pool` if the pool cannot hand out its connection, and
/// `OpenError::Pragma` or `OpenError::JournalMode` if WAL cannot be enabled.
pub fn open_sqlite_with(
    path: impl AsRef<Path>,
    settings: DbRuntimeSettings,
) -> Result<DbPool, OpenError> {
    let path = path.as_ref();

    if let Some(dir) = dir_to_create(path) {
        create_dir_best_effort(dir);
    }

    let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
        | OpenFlags::SQLITE_OPEN_CREATE
        | OpenFlags::SQLITE_OPEN_FULL_MUTEX;

    let busy_timeout = Duration::from_millis(settings.busy_timeout_ms);
    let manager = SqliteConnectionManager::file(path)
        .with_flags(flags)
        .with_init(move |conn| conn.busy_timeout(busy_timeout));

    // r2d2 retries failed connects until the pool timeout expires; a direct
    // connect surfaces SQLite's own error immediately.
    drop(manager.connect().map_err(OpenError::Connect)?);

    // The connection must outlive idle and lifetime reaping, otherwise an
    // in-memory database would silently start over.
    let pool = Pool::builder()
        .max_size(POOL_MAX_SIZE)
        .idle_timeout(None)
        .max_lifetime(None)
        .connection_timeout(Duration::from_millis(settings.connection_timeout_ms.max(1)))
        .build(manager)?;

    {
        let conn = pool.get()?;
        // In-memory databases report "memory", which is expected.
        let mode: String = conn
            .query_row("PRAGMA journal_mode = WAL;", [], |row| row.get(0))
            .map_err(OpenError::Pragma)?;
        if mode != "wal" && mode != "memory" {
            return Err(OpenError::JournalMode(mode));
        }
    }

    tracing::debug!(path = %path.display(), "opened sqlite database");

    Ok(pool)
}

/// Returns the current journal mode of the pooled connection.
///
/// # Errors
///
/// Returns `OpenError::Pool` if the connection cannot be checked out and
/// `OpenError::Pragma` if the query fails.
pub fn journal_mode(pool: &DbPool) -> Result<String, OpenError> {
    let conn = pool.get()?;
    conn.query_row("PRAGMA journal_mode;", [], |row| row.get(0))
        .map_err(OpenError::Pragma)
}

fn dir_to_create(path: &Path) -> Option<&Path> {
    if path == Path::new(MEMORY_PATH) {
        return None;
    }
    path.parent().filter(|dir| !dir.as_os_str().is_empty())
}

fn create_dir_best_effort(dir: &Path) {
    let mut builder = std::fs::DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        builder.mode(0o777);
    }
    if let Err(e) = builder.create(dir) {
        tracing::debug!(path = %dir.display(), error = %e, "could not create database directory");
    }
}
