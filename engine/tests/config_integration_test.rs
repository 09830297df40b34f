//! Config files driving a real manager

mod common;

use common::{write_plugin, CLEAN_SOURCE};
use std::fs;
use std::time::Duration;
use tempfile::TempDir;
use warden_engine::code_validator::CodeValidator;
use warden_engine::config::Config;
use warden_engine::runtime::{PluginManager, PluginStatus};
use warden_sdk::errors::{LoadError, SecurityError};

fn write_config(dir: &TempDir, body: &str) -> Config {
    let path = dir.path().join("config.toml");
    fs::write(&path, body).unwrap();
    Config::load_from_path(&path).unwrap()
}

#[test]
fn test_config_file_roundtrip() {
    let dir = TempDir::new().unwrap();
    let plugins = dir.path().join("plugins");
    fs::create_dir_all(&plugins).unwrap();

    let config = write_config(
        &dir,
        &format!(
            r#"
[core]
plugins_dir = "{}"
log_level = "debug"

[plugins]
enabled = ["security_plugin"]
instantiate_timeout_secs = 2
"#,
            plugins.display()
        ),
    );

    assert_eq!(config.core.plugins_dir, plugins.canonicalize().unwrap());
    assert_eq!(config.core.log_level, "debug");
    assert_eq!(config.plugins.enabled, vec!["security_plugin"]);
    assert_eq!(config.instantiate_timeout(), Duration::from_secs(2));
    // Omitted section falls back to defaults
    assert!(config.validator.deny_unsafe);
}

#[test]
fn test_invalid_config_file_rejected() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.toml");
    fs::write(&path, "[core]\nlog_level = \"loud\"\n").unwrap();

    assert!(Config::load_from_path(&path).is_err());
    assert!(Config::load_from_path(&dir.path().join("missing.toml")).is_err());
}

#[tokio::test]
async fn test_builtin_manager_rejects_unapproved_plugin_dir() {
    let dir = TempDir::new().unwrap();
    let plugins = dir.path().join("plugins");
    fs::create_dir_all(&plugins).unwrap();
    write_plugin(&plugins, "homebrew", &[], CLEAN_SOURCE);

    let config = write_config(
        &dir,
        &format!("[core]\nplugins_dir = \"{}\"\n", plugins.display()),
    );
    let manager = PluginManager::from_config(&config);

    let report = manager.load_enabled_plugins(&["homebrew"]).await;

    assert_eq!(
        report.failed[0].error,
        LoadError::Security(SecurityError::NotAuthorized("homebrew".to_string()))
    );
    assert_eq!(manager.status("homebrew").await, PluginStatus::Failed);
}

#[test]
fn test_validator_rules_from_config() {
    let dir = TempDir::new().unwrap();
    let config = write_config(
        &dir,
        r#"
[core]

[validator]
allowed_imports = ["warden_sdk", "tokio"]
blocked_calls = ["spawn"]
deny_unsafe = false
"#,
    );
    let validator = CodeValidator::from(&config.validator);

    assert!(validator.validate("use tokio::sync::Mutex;").is_ok());
    assert!(validator.validate("fn f() { unsafe {} }").is_ok());
    assert_eq!(
        validator.validate("use serde::Serialize;"),
        Err(SecurityError::DisallowedImport("serde".to_string()))
    );
    assert_eq!(
        validator.validate("fn f() { tokio::spawn(async {}); }"),
        Err(SecurityError::BlockedCall("spawn".to_string()))
    );
}
