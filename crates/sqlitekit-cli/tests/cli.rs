use std::path::Path;
use std::process::{Command, Output};

fn sqlitekit(work_dir: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_sqlitekit"))
        .args(args)
        .current_dir(work_dir)
        .env_remove("SQLITEKIT_CONFIG_PATH")
        .env_remove("SQLITEKIT_DB_PATH")
        .env_remove("SQLITEKIT_LOG_LEVEL")
        .env("SQLITEKIT_MIGRATE_TOOL", "sqlitekit-test-missing-tool")
        .output()
        .expect("failed to run sqlitekit")
}

#[test]
fn open_creates_database_in_nested_directory() {
    let dir = tempfile::tempdir().expect("failed to create temp dir");

    let output = sqlitekit(dir.path(), &["open", "var/lib/app.db"]);

    assert!(output.status.success(), "{output:?}");
    assert!(dir.path().join("var/lib/app.db").is_file());
}

#[test]
fn open_uses_configured_path() {
    let dir = tempfile::tempdir().expect("failed to create temp dir");
    std::fs::write(
        dir.path().join("sqlitekit.toml"),
        "[database]\npath = \"configured/app.db\"\n",
    )
    .expect("should write config");

    let output = sqlitekit(dir.path(), &["open"]);

    assert!(output.status.success(), "{output:?}");
    assert!(dir.path().join("configured/app.db").is_file());
}

#[test]
fn malformed_config_exits_with_usage_code() {
    let dir = tempfile::tempdir().expect("failed to create temp dir");
    std::fs::write(dir.path().join("broken.toml"), "[database").expect("should write config");

    let output = sqlitekit(dir.path(), &["--config", "broken.toml", "open"]);

    assert_eq!(output.status.code(), Some(2), "{output:?}");
}

#[test]
fn migrate_without_tool_succeeds_with_warning() {
    let dir = tempfile::tempdir().expect("failed to create temp dir");
    std::fs::write(dir.path().join("schema.sql"), "CREATE TABLE t (id INTEGER);")
        .expect("should write schema");

    let output = sqlitekit(dir.path(), &["migrate", "schema.sql", "app.db"]);

    assert!(output.status.success(), "{output:?}");
    assert!(dir.path().join("app.db").is_file());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("sqlitekit-test-missing-tool"),
        "warning should name the missing tool: {stderr}"
    );
    assert_eq!(
        stderr.lines().filter(|line| line.contains("WARN")).count(),
        1,
        "missing tool should be reported once: {stderr}"
    );
}

#[test]
fn migrate_with_unreadable_schema_fails() {
    let dir = tempfile::tempdir().expect("failed to create temp dir");

    let output = sqlitekit(dir.path(), &["migrate", "absent.sql", "app.db"]);

    assert_eq!(output.status.code(), Some(1), "{output:?}");
}
