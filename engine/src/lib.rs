//! Warden Engine Library
//!
//! This library provides the plugin host: verification gates, the plugin
//! manager and the ambient configuration and logging layers. It is used by
//! both the `warden` binary and integration tests.

/// Configuration management module
pub mod config;

/// Static code validation of plugin sources
pub mod code_validator;

/// Manifest loading module
pub mod manifest_loader;

/// Approved-plugin policy and validation
pub mod policy;

/// Source tree checksums
pub mod checksum;

/// Route table backing the host handle
pub mod routes;

/// Runtime module for loading and managing plugins
pub mod runtime;

/// Telemetry and Observability
pub mod telemetry;

/// CLI interface module
pub mod cli;

/// Command handlers module
pub mod handlers;
