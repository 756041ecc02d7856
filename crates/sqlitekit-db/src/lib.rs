//! Opening and migrating local SQLite databases.
//!
//! Provides a single-connection `r2d2` pool with WAL journaling, and a
//! migration entry point that hands a declarative schema to the external
//! [atlas](https://atlasgo.io) tool.
//!
//! # Design decisions
//!
//! - **One pooled connection**: SQLite serializes writers itself, but a pool
//!   that hands out several connections lets writers contend for the database
//!   lock and fail with `SQLITE_BUSY`. Capping the pool at one connection
//!   routes every operation through the same session.
//! - **WAL mode**: readers never block the single writer and vice versa.
//! - **External schema diffing**: atlas computes and applies the diff between
//!   the live database and the desired schema. When atlas is not installed,
//!   migration degrades to a plain open and the caller is told why.
//!
//! ```no_run
//! use sqlitekit_db::{open_and_migrate_sqlite, MigrateOutcome};
//!
//! let outcome = open_and_migrate_sqlite("CREATE TABLE notes (id INTEGER PRIMARY KEY);", "data/notes.db")?;
//! if let MigrateOutcome::Skipped { reason, .. } = &outcome {
//!     eprintln!("{reason}");
//! }
//! let pool = outcome.into_pool();
//! # Ok::<(), sqlitekit_db::MigrateError>(())
//! ```

mod migrate;
mod pool;
mod tool;

pub use migrate::{
    open_and_migrate_sqlite, open_and_migrate_sqlite_with, sqlite_url, MigrateError,
    MigrateOptions, MigrateOutcome, DEFAULT_DEV_URL, DEFAULT_TOOL, SCHEMA_FILE_NAME,
};
pub use pool::{
    journal_mode, open_sqlite, open_sqlite_with, DbPool, DbRuntimeSettings, OpenError,
    MEMORY_PATH,
};
pub use tool::find_executable;
