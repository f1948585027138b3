//! Test plan for the `parley-config` crate.
//!
//! Covers default handling, file discovery, environment overrides and
//! rejection of malformed files.

use std::fs;
use std::path::{Path, PathBuf};

use serial_test::serial;
use tempfile::TempDir;

use parley_config::{load, AppConfig, LoggingConfig, SessionConfig};

const ENV_VARS_TO_RESET: &[&str] = &[
    "PARLEY_CONFIG",
    "PARLEY__DATABASE__URL",
    "PARLEY__DATABASE__MAX_CONNECTIONS",
    "PARLEY__SESSION__TTL_SECONDS",
    "PARLEY__LOGGING__FILTER",
];

struct TestContext {
    vars: Vec<(String, Option<String>)>,
    original_dir: Option<PathBuf>,
}

impl TestContext {
    fn new() -> Self {
        Self {
            vars: Vec::new(),
            original_dir: None,
        }
    }

    fn reset_environment(&mut self) {
        for key in ENV_VARS_TO_RESET {
            self.remove_var(key);
        }
    }

    fn set_var(&mut self, key: &str, value: impl AsRef<str>) {
        let previous = std::env::var(key).ok();
        std::env::set_var(key, value.as_ref());
        self.vars.push((key.to_string(), previous));
    }

    fn remove_var(&mut self, key: &str) {
        let previous = std::env::var(key).ok();
        std::env::remove_var(key);
        self.vars.push((key.to_string(), previous));
    }

    fn set_current_dir(&mut self, dir: &Path) {
        if self.original_dir.is_none() {
            self.original_dir =
                Some(std::env::current_dir().expect("failed to capture current directory"));
        }
        std::env::set_current_dir(dir).expect("failed to set current directory");
    }
}

impl Drop for TestContext {
    fn drop(&mut self) {
        if let Some(original) = self.original_dir.take() {
            let _ = std::env::set_current_dir(original);
        }

        while let Some((key, value)) = self.vars.pop() {
            match value {
                Some(val) => std::env::set_var(&key, val),
                None => std::env::remove_var(&key),
            }
        }
    }
}

fn write_config_file(root: &Path, relative: &str, contents: &str) -> PathBuf {
    let path = root.join(relative);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("failed to create config directories");
    }
    fs::write(&path, contents).expect("failed to write config file");
    path
}

fn isolated() -> (TempDir, TestContext) {
    let temp_dir = TempDir::new().expect("failed to create temp dir");
    let mut ctx = TestContext::new();
    ctx.reset_environment();
    ctx.set_current_dir(temp_dir.path());
    (temp_dir, ctx)
}

#[test]
#[serial]
fn load_uses_default_values_when_no_files_found() {
    let (_dir, _ctx) = isolated();

    let config = load().expect("configuration load should succeed without files");
    let defaults = AppConfig::default();

    assert_eq!(config.database.url, defaults.database.url);
    assert_eq!(config.database.max_connections, defaults.database.max_connections);
    assert_eq!(config.session.ttl_seconds, defaults.session.ttl_seconds);
    assert_eq!(config.logging.filter, defaults.logging.filter);
}

#[test]
#[serial]
fn load_picks_first_available_file_in_search_order() {
    let (dir, _ctx) = isolated();

    write_config_file(
        dir.path(),
        "parley.toml",
        r#"
        [session]
        ttl_seconds = 600
        "#,
    );
    write_config_file(
        dir.path(),
        "config/parley.toml",
        r#"
        [session]
        ttl_seconds = 1200
        "#,
    );

    let config = load().expect("configuration load should pick the first file");
    assert_eq!(config.session.ttl_seconds, 600);
}

#[test]
#[serial]
fn load_merges_partial_file_with_defaults() {
    let (dir, _ctx) = isolated();

    write_config_file(
        dir.path(),
        "parley.toml",
        r#"
        [database]
        max_connections = 50
        "#,
    );

    let config = load().expect("configuration load should succeed");
    let defaults = AppConfig::default();

    assert_eq!(config.database.max_connections, 50);
    assert_eq!(config.database.url, defaults.database.url);
    assert_eq!(config.session.ttl_seconds, defaults.session.ttl_seconds);
}

#[test]
#[serial]
fn load_honours_explicit_config_path() {
    let (dir, mut ctx) = isolated();

    let path = write_config_file(
        dir.path(),
        "elsewhere/custom.toml",
        r#"
        [logging]
        filter = "parley=debug"
        "#,
    );
    ctx.set_var("PARLEY_CONFIG", path.display().to_string());

    let config = load().expect("configuration load should read PARLEY_CONFIG");
    assert_eq!(config.logging.filter, "parley=debug");
}

#[test]
#[serial]
fn load_applies_environment_overrides() {
    let (dir, mut ctx) = isolated();

    write_config_file(
        dir.path(),
        "parley.toml",
        r#"
        [session]
        ttl_seconds = 300
        "#,
    );

    ctx.set_var("PARLEY__SESSION__TTL_SECONDS", "900");
    ctx.set_var("PARLEY__DATABASE__URL", "sqlite://override.db");

    let config = load().expect("configuration load should honour env overrides");
    assert_eq!(config.session.ttl_seconds, 900);
    assert_eq!(config.database.url, "sqlite://override.db");
}

#[test]
#[serial]
fn load_clamps_session_ttl_to_i64_maximum() {
    let (_dir, mut ctx) = isolated();

    let oversized = (i64::MAX as u128 + 42).to_string();
    ctx.set_var("PARLEY__SESSION__TTL_SECONDS", &oversized);

    let config = load().expect("configuration load should succeed with oversized TTL");
    assert_eq!(config.session.ttl_seconds, i64::MAX as u64);
}

#[test]
#[serial]
fn load_raises_zero_pool_size_to_one() {
    let (_dir, mut ctx) = isolated();

    ctx.set_var("PARLEY__DATABASE__MAX_CONNECTIONS", "0");

    let config = load().expect("configuration load should succeed");
    assert_eq!(config.database.max_connections, 1);
}

#[test]
#[serial]
fn load_errors_on_invalid_toml_contents() {
    let (dir, _ctx) = isolated();

    write_config_file(
        dir.path(),
        "parley.toml",
        r#"
        [session]
        ttl_seconds = "not-a-number
        "#,
    );

    let error = load().expect_err("invalid TOML should cause load to fail");
    let message = error.to_string();
    assert!(
        message.contains("invalid configuration")
            || message.contains("unable to build configuration"),
        "unexpected error message: {message}"
    );
}

#[test]
fn session_config_exposes_ttl_as_duration() {
    let session = SessionConfig { ttl_seconds: 90 };
    assert_eq!(session.ttl().as_secs(), 90);
}

#[test]
fn logging_config_defaults_to_info() {
    assert_eq!(LoggingConfig::default().filter, "info");
}
