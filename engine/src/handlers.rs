//! Command handlers for CLI operations
//!
//! - load: run the batch loader and hold plugins until shutdown
//! - checksum: print a plugin's source digest
//! - validate: run the static code validator over one file
//! - policy: list the compiled-in policy table

use anyhow::{Context, Result};
use serde_json::json;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use warden_sdk::WardenErrorExt;

use crate::checksum::ChecksumVerifier;
use crate::code_validator::CodeValidator;
use crate::config::Config;
use crate::policy::PolicyTable;
use crate::runtime::{LoadReport, PluginManager, PluginStatus};

/// Output format for command results
#[derive(Debug, Clone, Copy)]
pub enum OutputFormat {
    /// Human-readable text output
    Text,
    /// JSON output for machine consumption
    Json,
}

/// Load plugins, report, then wait for Ctrl-C and clean up
///
/// With `once`, cleanup runs immediately after the report.
pub async fn handle_load(names: Vec<String>, once: bool, config: &Config, format: OutputFormat) -> Result<()> {
    let names = if names.is_empty() {
        config.plugins.enabled.clone()
    } else {
        names
    };

    let manager = Arc::new(PluginManager::from_config(config));
    let report = manager.load_enabled_plugins(&names).await;
    let statuses = manager.status_snapshot().await;

    print_report(&report, &statuses, &manager, format);

    if !once {
        if matches!(format, OutputFormat::Text) {
            println!();
            println!("Plugins running. Press Ctrl-C to stop.");
        }

        let shutdown = {
            let manager = manager.clone();
            tokio::spawn(async move {
                tokio::signal::ctrl_c().await?;
                tracing::info!("Shutdown signal received");
                Ok::<usize, std::io::Error>(manager.cleanup_all().await)
            })
        };
        shutdown
            .await
            .context("Shutdown task failed")?
            .context("Failed to listen for Ctrl-C")?;
    }

    let remaining = manager.cleanup_all().await;
    tracing::debug!("Final cleanup unloaded {} plugins", remaining);
    Ok(())
}

fn print_report(
    report: &LoadReport,
    statuses: &BTreeMap<String, PluginStatus>,
    manager: &PluginManager,
    format: OutputFormat,
) {
    match format {
        OutputFormat::Text => {
            println!("Plugins:");
            for (name, status) in statuses {
                println!("  {:<20} {}", name, status);
            }

            if !report.failed.is_empty() {
                println!();
                println!("Failures:");
                for failure in &report.failed {
                    println!("  {}: {}", failure.name, failure.error);
                    println!("    hint: {}", failure.error.user_hint());
                }
            }

            if !report.missing_dependencies.is_empty() {
                println!();
                println!("Missing dependencies:");
                for missing in &report.missing_dependencies {
                    println!("  {} needs {}", missing.plugin, missing.dependency);
                }
            }

            let routes = manager.routes().sorted();
            if !routes.is_empty() {
                println!();
                println!("Routes:");
                for route in routes {
                    println!("  {:<6} {:<36} {}", route.method.as_str(), route.path, route.owner);
                }
            }
        }
        OutputFormat::Json => {
            let failed: Vec<_> = report
                .failed
                .iter()
                .map(|f| {
                    json!({
                        "name": f.name,
                        "error": f.error.to_string(),
                        "hint": f.error.user_hint(),
                    })
                })
                .collect();

            let output = json!({
                "loaded": report.loaded,
                "failed": failed,
                "missing_dependencies": report.missing_dependencies,
                "statuses": statuses,
                "routes": manager.routes().sorted(),
            });
            println!("{}", output);
        }
    }
}

/// Print the checksum of one plugin
pub fn handle_checksum(name: &str, config: &Config, format: OutputFormat) -> Result<()> {
    let digest = ChecksumVerifier::new(&config.core.plugins_dir)
        .compute(name)
        .with_context(|| format!("Failed to checksum plugin '{}'", name))?;

    match format {
        OutputFormat::Text => println!("{}", digest),
        OutputFormat::Json => println!("{}", json!({ "plugin": name, "checksum": digest })),
    }
    Ok(())
}

/// Validate one source file with the configured rules
///
/// A rejected file is reported, not returned as an error; only an
/// unreadable file fails the command.
pub fn handle_validate(file: &Path, config: &Config, format: OutputFormat) -> Result<()> {
    let source = std::fs::read_to_string(file)
        .with_context(|| format!("Failed to read {}", file.display()))?;

    let result = CodeValidator::from(&config.validator).validate(&source);

    match (format, &result) {
        (OutputFormat::Text, Ok(())) => println!("{}: ok", file.display()),
        (OutputFormat::Text, Err(e)) => {
            println!("{}: rejected: {}", file.display(), e);
            println!("  hint: {}", e.user_hint());
        }
        (OutputFormat::Json, _) => {
            let output = json!({
                "file": file.display().to_string(),
                "valid": result.is_ok(),
                "error": result.as_ref().err().map(|e| e.to_string()),
            });
            println!("{}", output);
        }
    }
    Ok(())
}

/// List the compiled-in policy table
pub fn handle_policy(format: OutputFormat) -> Result<()> {
    let table = PolicyTable::builtin();

    match format {
        OutputFormat::Text => {
            println!("Approved plugins:");
            for (name, policy) in table.iter() {
                let permissions: Vec<&str> = policy.allowed_permissions.iter().map(|p| p.as_str()).collect();
                println!("  {}", name);
                println!("    max version: {}", policy.max_version);
                println!("    permissions: {}", permissions.join(", "));
                println!("    checksum:    {}", policy.required_checksum);
            }
        }
        OutputFormat::Json => {
            let entries: Vec<_> = table
                .iter()
                .map(|(name, policy)| {
                    json!({
                        "name": name,
                        "max_version": policy.max_version,
                        "allowed_permissions": policy.allowed_permissions,
                        "required_checksum": policy.required_checksum,
                    })
                })
                .collect();
            println!("{}", json!({ "plugins": entries }));
        }
    }
    Ok(())
}
