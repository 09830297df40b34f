//! Security policy
//!
//! The approved-plugin table and the validator that checks a manifest
//! against it. A plugin that is not in the table can never load.
//!
//! # Checks
//!
//! Performed in order, stopping at the first failure:
//!
//! 1. The plugin name is in the table
//! 2. Every requested permission is in the approved set
//! 3. The manifest version does not exceed the approved maximum
//! 4. The manifest checksum equals the approved checksum
//! 5. The plugin directory exists and holds at least one `.rs` file

use crate::checksum;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::path::PathBuf;
use warden_sdk::errors::SecurityError;
use warden_sdk::{Permission, PermissionSet, PluginManifest};

/// Policy for one approved plugin
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApprovedPlugin {
    pub allowed_permissions: PermissionSet,
    pub max_version: String,
    pub required_checksum: String,
}

impl ApprovedPlugin {
    pub fn new<I, S>(permissions: I, max_version: impl Into<String>, required_checksum: impl Into<String>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            allowed_permissions: Permission::set_of(permissions),
            max_version: max_version.into(),
            required_checksum: required_checksum.into(),
        }
    }
}

struct BuiltinEntry {
    name: &'static str,
    permissions: &'static [&'static str],
    max_version: &'static str,
    checksum: &'static str,
}

/// Approved first-party plugins
///
/// Checksums are produced with `warden checksum <name>` and must be
/// refreshed whenever a plugin's sources change.
const BUILTIN_POLICY: &[BuiltinEntry] = &[
    BuiltinEntry {
        name: "gdpr_plugin",
        permissions: &["database", "filesystem"],
        max_version: "2.0.0",
        checksum: "sha256:cc262c8bf66ca3a6e21adb7585b456d31771afd2c42fc3cb6861964eb656e26a",
    },
    BuiltinEntry {
        name: "security_plugin",
        permissions: &["database", "network"],
        max_version: "1.0.0",
        checksum: "sha256:b63a87ba86f19f89639718c07666e316e30d54d2e6ea9659a98c0945904f1866",
    },
    BuiltinEntry {
        name: "analytics_plugin",
        permissions: &["database"],
        max_version: "1.0.0",
        checksum: "sha256:d8b97aca1cecfabce9f244d9b7511e9e48070adf6f51e5d1f38004d0c8f8943a",
    },
];

/// Immutable name → policy mapping
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PolicyTable {
    entries: BTreeMap<String, ApprovedPlugin>,
}

impl PolicyTable {
    /// Empty table; nothing can load
    pub fn new() -> Self {
        Self::default()
    }

    /// The compiled-in table
    pub fn builtin() -> Self {
        BUILTIN_POLICY.iter().fold(Self::new(), |table, entry| {
            table.with(
                entry.name,
                ApprovedPlugin::new(entry.permissions.iter().copied(), entry.max_version, entry.checksum),
            )
        })
    }

    /// Builder-style insert
    pub fn with(mut self, name: impl Into<String>, policy: ApprovedPlugin) -> Self {
        self.insert(name, policy);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, policy: ApprovedPlugin) {
        self.entries.insert(name.into(), policy);
    }

    pub fn get(&self, name: &str) -> Option<&ApprovedPlugin> {
        self.entries.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Approved names, sorted
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ApprovedPlugin)> {
        self.entries.iter().map(|(name, policy)| (name.as_str(), policy))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Cross-checks manifests against a [`PolicyTable`]
#[derive(Debug, Clone)]
pub struct SecurityValidator {
    policy: PolicyTable,
    plugins_dir: PathBuf,
}

impl SecurityValidator {
    pub fn new(policy: PolicyTable, plugins_dir: impl Into<PathBuf>) -> Self {
        Self {
            policy,
            plugins_dir: plugins_dir.into(),
        }
    }

    pub fn policy(&self) -> &PolicyTable {
        &self.policy
    }

    /// Validate `manifest` for `plugin_name`
    ///
    /// # Errors
    ///
    /// The first failing check as a [`SecurityError`]: `NotAuthorized`,
    /// `PermissionNotAllowed`, `VersionNotAllowed`, `ChecksumNotApproved`,
    /// `InvalidPluginPath` or `NoSourceFiles`.
    pub fn validate(&self, plugin_name: &str, manifest: &PluginManifest) -> Result<(), SecurityError> {
        let approved = self
            .policy
            .get(plugin_name)
            .ok_or_else(|| SecurityError::NotAuthorized(plugin_name.to_string()))?;

        if let Some(permission) = manifest
            .permissions
            .iter()
            .find(|p| !approved.allowed_permissions.contains(*p))
        {
            return Err(SecurityError::PermissionNotAllowed {
                plugin: plugin_name.to_string(),
                permission: permission.clone(),
            });
        }

        if version_exceeds(&manifest.version, &approved.max_version) {
            return Err(SecurityError::VersionNotAllowed {
                version: manifest.version.clone(),
                max: approved.max_version.clone(),
            });
        }

        if manifest.checksum != approved.required_checksum {
            return Err(SecurityError::ChecksumNotApproved {
                plugin: plugin_name.to_string(),
            });
        }

        let plugin_dir = self.plugins_dir.join(plugin_name);
        if checksum::source_files(&plugin_dir)?.is_empty() {
            return Err(SecurityError::NoSourceFiles(plugin_name.to_string()));
        }

        Ok(())
    }
}

/// Compare two version strings
///
/// Semantic-version order when both parse, plain string order otherwise.
pub fn compare_versions(a: &str, b: &str) -> Ordering {
    match (semver::Version::parse(a), semver::Version::parse(b)) {
        (Ok(a), Ok(b)) => a.cmp(&b),
        _ => a.cmp(b),
    }
}

/// Whether `version` is strictly greater than `max`
pub fn version_exceeds(version: &str, max: &str) -> bool {
    compare_versions(version, max) == Ordering::Greater
}
