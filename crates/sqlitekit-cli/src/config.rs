//! CLI configuration loading from file and environment variables.

use serde::Deserialize;
use sqlitekit_db::{DbRuntimeSettings, MigrateOptions, DEFAULT_DEV_URL, DEFAULT_TOOL};
use std::path::PathBuf;
use thiserror::Error;

/// Config file read when neither `--config` nor `SQLITEKIT_CONFIG_PATH` is set.
pub const DEFAULT_CONFIG_PATH: &str = "sqlitekit.toml";

/// Top-level configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// Database settings.
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Migration tool settings.
    #[serde(default)]
    pub migrate: MigrateConfig,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Database configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Path to the SQLite database file, or `:memory:`.
    #[serde(default = "default_db_path")]
    pub path: String,

    /// Busy timeout for SQLite connections, in milliseconds.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,

    /// Wait for the pooled connection, in milliseconds.
    #[serde(default = "default_connection_timeout_ms")]
    pub connection_timeout_ms: u64,
}

/// Migration tool configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct MigrateConfig {
    /// Executable name or path of the migration tool.
    #[serde(default = "default_tool")]
    pub tool: String,

    /// Directory for the temporary schema file.
    #[serde(default = "default_work_dir")]
    pub work_dir: PathBuf,

    /// Dev database URL handed to the tool.
    #[serde(default = "default_dev_url")]
    pub dev_url: String,
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "sqlitekit_db=debug,info").
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Whether to output logs in JSON format.
    #[serde(default)]
    pub json: bool,
}

fn default_db_path() -> String {
    "sqlitekit.db".to_string()
}

fn default_busy_timeout_ms() -> u64 {
    DbRuntimeSettings::default().busy_timeout_ms
}

fn default_connection_timeout_ms() -> u64 {
    DbRuntimeSettings::default().connection_timeout_ms
}

fn default_tool() -> String {
    DEFAULT_TOOL.to_string()
}

fn default_work_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_dev_url() -> String {
    DEFAULT_DEV_URL.to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
            busy_timeout_ms: default_busy_timeout_ms(),
            connection_timeout_ms: default_connection_timeout_ms(),
        }
    }
}

impl Default for MigrateConfig {
    fn default() -> Self {
        Self {
            tool: default_tool(),
            work_dir: default_work_dir(),
            dev_url: default_dev_url(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

impl DatabaseConfig {
    /// Connection settings for the library.
    pub fn runtime_settings(&self) -> DbRuntimeSettings {
        DbRuntimeSettings {
            busy_timeout_ms: self.busy_timeout_ms,
            connection_timeout_ms: self.connection_timeout_ms,
        }
    }
}

impl Config {
    /// Migration options assembled from the `[migrate]` and `[database]`
    /// sections. The tool is looked up on `PATH`.
    pub fn migrate_options(&self) -> MigrateOptions {
        MigrateOptions {
            tool: self.migrate.tool.clone(),
            work_dir: self.migrate.work_dir.clone(),
            dev_url: self.migrate.dev_url.clone(),
            search_path: None,
            settings: self.database.runtime_settings(),
        }
    }
}

/// Errors that can occur when loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read the configuration file.
    #[error("failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    /// Failed to parse the configuration file.
    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Loads configuration from a TOML file, falling back to defaults.
///
/// Environment variable overrides:
/// - `SQLITEKIT_DB_PATH` overrides `database.path`
/// - `SQLITEKIT_BUSY_TIMEOUT_MS` overrides `database.busy_timeout_ms`
/// - `SQLITEKIT_MIGRATE_TOOL` overrides `migrate.tool`
/// - `SQLITEKIT_LOG_LEVEL` overrides `logging.level`
/// - `SQLITEKIT_LOG_JSON` overrides `logging.json` (set to "true" to enable)
///
/// # Errors
///
/// Returns `ConfigError` if the file exists but cannot be read or parsed.
pub fn load_config(path: Option<&str>) -> Result<Config, ConfigError> {
    let mut config = match path {
        Some(p) => match std::fs::read_to_string(p) {
            Ok(contents) => toml::from_str(&contents)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = p, "config file not found, using defaults");
                Config::default()
            }
            Err(e) => return Err(ConfigError::FileRead(e)),
        },
        None => Config::default(),
    };

    apply_env_overrides(&mut config, |key| std::env::var(key).ok());

    Ok(config)
}

/// Applies `SQLITEKIT_*` overrides read through `lookup`. Unparseable numeric
/// values are ignored.
pub fn apply_env_overrides(config: &mut Config, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(db_path) = lookup("SQLITEKIT_DB_PATH") {
        config.database.path = db_path;
    }
    if let Some(timeout) = lookup("SQLITEKIT_BUSY_TIMEOUT_MS") {
        if let Ok(parsed) = timeout.parse() {
            config.database.busy_timeout_ms = parsed;
        }
    }
    if let Some(tool) = lookup("SQLITEKIT_MIGRATE_TOOL") {
        config.migrate.tool = tool;
    }
    if let Some(level) = lookup("SQLITEKIT_LOG_LEVEL") {
        config.logging.level = level;
    }
    if let Some(json) = lookup("SQLITEKIT_LOG_JSON") {
        config.logging.json = json == "true" || json == "1";
    }
}
