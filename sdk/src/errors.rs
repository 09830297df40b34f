//! Error types and handling
//!
//! This module provides the error taxonomy shared by the Warden host and its
//! plugins. Every error implements [`WardenErrorExt`], which provides a
//! user-facing hint and tells the caller whether the failure is fatal for
//! the plugin it concerns.
//!
//! # Error Categories
//!
//! - **ManifestError**: manifest missing, unreadable, malformed or incomplete
//! - **SecurityError**: policy violations, tamper detection, banned code
//! - **LoadError**: everything that can end a single plugin load attempt
//! - **PluginError**: failures reported by plugin code itself
//! - **EngineError**: host configuration and I/O failures
//!
//! Load errors are never retried. A plugin that failed stays failed until an
//! operator asks for a fresh load.

use crate::permission::Permission;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Trait for Warden error extensions
///
/// Provides a short hint that is safe to show to operators and marks whether
/// the error ends the affected plugin's load attempt.
pub trait WardenErrorExt {
    /// Returns a user-friendly hint for the error
    fn user_hint(&self) -> &str;

    /// Returns whether the error is fatal for the plugin it concerns
    fn is_fatal(&self) -> bool;
}

/// Manifest loading errors
///
/// Raised while locating and structurally validating `manifest.json`.
/// No policy is enforced at this stage.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ManifestError {
    #[error("Manifest not found: {0:?}")]
    NotFound(PathBuf),

    #[error("Manifest unreadable at {path:?}: {reason}")]
    Unreadable { path: PathBuf, reason: String },

    #[error("Malformed manifest: {0}")]
    Malformed(String),

    #[error("Missing required manifest field: {0}")]
    MissingField(String),

    #[error("Manifest name '{found}' does not match plugin '{expected}'")]
    NameMismatch { expected: String, found: String },

    #[error("Invalid plugin name: '{0}'")]
    InvalidName(String),
}

/// Security violations
///
/// Every variant is fatal for the plugin concerned and is never downgraded
/// to a warning.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SecurityError {
    // Policy table checks
    #[error("Plugin not authorized: {0}")]
    NotAuthorized(String),

    #[error("Permission not allowed for {plugin}: {permission}")]
    PermissionNotAllowed {
        plugin: String,
        permission: Permission,
    },

    #[error("Version not allowed: {version} exceeds maximum {max}")]
    VersionNotAllowed { version: String, max: String },

    #[error("Checksum not approved for {plugin}")]
    ChecksumNotApproved { plugin: String },

    // Filesystem layout checks
    #[error("Invalid plugin path: {0:?}")]
    InvalidPluginPath(PathBuf),

    #[error("No source files found for plugin {0}")]
    NoSourceFiles(String),

    #[error("Primary source file missing: {0:?}")]
    MissingPrimarySource(PathBuf),

    // Integrity
    #[error("Checksum mismatch: expected {expected}, got {actual}")]
    ChecksumMismatch { expected: String, actual: String },

    // Static code validation
    #[error("Plugin source could not be parsed: {0}")]
    UnparseableSource(String),

    #[error("Import not allowed: {0}")]
    DisallowedImport(String),

    #[error("Blocked call: {0}")]
    BlockedCall(String),

    #[error("Unsafe code is not allowed in plugins")]
    UnsafeCode,

    // Runtime permission enforcement
    #[error("Permission required by plugin but not declared: {0}")]
    UndeclaredPermission(Permission),
}

/// Errors reported by plugin code
///
/// Returned from plugin constructors and from the `initialize`,
/// `register_routes` and `cleanup` hooks.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PluginError {
    #[error("Initialization failed: {0}")]
    Initialization(String),

    #[error("Cleanup failed: {0}")]
    Cleanup(String),

    #[error("Route {method} {path} already registered by {owner}")]
    RouteConflict {
        method: String,
        path: String,
        owner: String,
    },

    #[error("Permission not granted: {0}")]
    PermissionDenied(Permission),

    #[error("Plugin error: {0}")]
    Other(String),
}

/// Everything that can end a single plugin load attempt
///
/// Cloneable so the manager can keep the causal error of a failed plugin
/// for later status queries.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LoadError {
    #[error(transparent)]
    Manifest(#[from] ManifestError),

    #[error(transparent)]
    Security(#[from] SecurityError),

    #[error("Plugin requires runtime {required}, host runs {current}")]
    IncompatibleRuntime { required: String, current: String },

    #[error("Plugin instantiation timed out after {0:?}")]
    Timeout(Duration),

    #[error("Plugin instantiation failed: {0}")]
    Instantiation(String),

    #[error("Plugin initialization failed: {0}")]
    Initialization(#[source] PluginError),

    #[error("Plugin already loaded: {0}")]
    AlreadyLoaded(String),
}

/// Host-level errors (configuration, filesystem)
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Path canonicalization failed for {0:?}: {1}")]
    PathCanonicalization(PathBuf, String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl WardenErrorExt for ManifestError {
    fn user_hint(&self) -> &str {
        match self {
            Self::NotFound(_) => "Plugin has no manifest.json. Check the plugin directory",
            Self::Unreadable { .. } => "Manifest could not be read. Check file permissions",
            Self::Malformed(_) => "Manifest is not valid JSON or has wrongly typed fields",
            Self::MissingField(_) => "Manifest is missing a required field",
            Self::NameMismatch { .. } => "Manifest name must match the plugin directory name",
            Self::InvalidName(_) => "Plugin names must be a single plain path component",
        }
    }

    fn is_fatal(&self) -> bool {
        true
    }
}

impl WardenErrorExt for SecurityError {
    fn user_hint(&self) -> &str {
        match self {
            Self::NotAuthorized(_) => "Plugin is not in the approved policy table",
            Self::PermissionNotAllowed { .. } => "Plugin requests a permission it was not approved for",
            Self::VersionNotAllowed { .. } => "Plugin version is newer than the approved maximum",
            Self::ChecksumNotApproved { .. } => "Manifest checksum differs from the approved checksum",
            Self::InvalidPluginPath(_) => "Plugin directory is missing",
            Self::NoSourceFiles(_) => "Plugin directory contains no source files",
            Self::MissingPrimarySource(_) => "Plugin has no src/lib.rs",
            Self::ChecksumMismatch { .. } => "Security verification failed. Plugin may be tampered",
            Self::UnparseableSource(_) => "Plugin source is not valid Rust",
            Self::DisallowedImport(_) => "Plugin imports a crate outside the allow-list",
            Self::BlockedCall(_) => "Plugin calls a blocked operation",
            Self::UnsafeCode => "Plugin contains unsafe code",
            Self::UndeclaredPermission(_) => "Plugin needs a permission its manifest does not declare",
        }
    }

    fn is_fatal(&self) -> bool {
        true
    }
}

impl WardenErrorExt for PluginError {
    fn user_hint(&self) -> &str {
        match self {
            Self::Initialization(_) => "Plugin failed to start. Check plugin logs",
            Self::Cleanup(_) => "Plugin failed to release its resources",
            Self::RouteConflict { .. } => "Another plugin already serves this route",
            Self::PermissionDenied(_) => "Plugin used a capability it was not granted",
            Self::Other(_) => "Plugin operation failed",
        }
    }

    fn is_fatal(&self) -> bool {
        // Cleanup failures are logged and swallowed during shutdown.
        !matches!(self, Self::Cleanup(_))
    }
}

impl WardenErrorExt for LoadError {
    fn user_hint(&self) -> &str {
        match self {
            Self::Manifest(e) => e.user_hint(),
            Self::Security(e) => e.user_hint(),
            Self::IncompatibleRuntime { .. } => "Plugin needs a newer Warden runtime",
            Self::Timeout(_) => "Plugin took too long to start",
            Self::Instantiation(_) => "Plugin could not be constructed",
            Self::Initialization(e) => e.user_hint(),
            Self::AlreadyLoaded(_) => "Unload the plugin before loading it again",
        }
    }

    fn is_fatal(&self) -> bool {
        // A duplicate load request leaves the running instance untouched.
        !matches!(self, Self::AlreadyLoaded(_))
    }
}

impl WardenErrorExt for EngineError {
    fn user_hint(&self) -> &str {
        match self {
            Self::Config(_) => "Check your config.toml file for errors",
            Self::PathCanonicalization(_, _) => "Invalid path specified",
            Self::Io(_) => "File system operation failed",
        }
    }

    fn is_fatal(&self) -> bool {
        true
    }
}
