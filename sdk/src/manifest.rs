//! Plugin manifest types

use crate::permission::{Permission, PermissionSet};
use serde::{Deserialize, Serialize};

/// Fields every manifest must declare, in the order they are checked
pub const REQUIRED_FIELDS: [&str; 5] = ["name", "version", "description", "author", "permissions"];

/// Declared identity and requested capabilities of one plugin
///
/// Built once per load attempt from `manifest.json` and never mutated
/// afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginManifest {
    pub name: String,
    pub version: String,
    pub description: String,
    pub author: String,
    pub permissions: PermissionSet,
    /// Other plugins expected to be loaded alongside this one (advisory)
    #[serde(default)]
    pub dependencies: Vec<String>,
    #[serde(default)]
    pub min_required_runtime_version: Option<String>,
    /// Content digest of the plugin sources, `sha256:<hex>`
    #[serde(default)]
    pub checksum: String,
}

impl PluginManifest {
    /// Parse manifest from JSON string
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Serialize manifest to JSON string
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Whether the manifest requests the given permission
    pub fn requests(&self, permission: &Permission) -> bool {
        self.permissions.contains(permission)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_json() -> &'static str {
        r#"{
            "name": "gdpr_plugin",
            "version": "1.2.0",
            "description": "Consent tracking",
            "author": "Warden Team",
            "permissions": ["database", "filesystem"]
        }"#
    }

    #[test]
    fn test_optional_fields_default() {
        let manifest = PluginManifest::from_json(sample_json()).unwrap();

        assert_eq!(manifest.name, "gdpr_plugin");
        assert!(manifest.dependencies.is_empty());
        assert!(manifest.min_required_runtime_version.is_none());
        assert!(manifest.checksum.is_empty());
        assert!(manifest.requests(&Permission::Database));
        assert!(!manifest.requests(&Permission::Network));
    }

    #[test]
    fn test_manifest_serialization() {
        let manifest = PluginManifest::from_json(sample_json()).unwrap();
        let json = manifest.to_json().unwrap();
        let parsed = PluginManifest::from_json(&json).unwrap();

        assert_eq!(manifest, parsed);
    }

    #[test]
    fn test_unknown_permission_survives_parsing() {
        let json = r#"{
            "name": "p1", "version": "1.0.0", "description": "", "author": "",
            "permissions": ["database", "telepathy"]
        }"#;
        let manifest = PluginManifest::from_json(json).unwrap();

        assert!(manifest
            .permissions
            .contains(&Permission::Other("telepathy".to_string())));
    }
}
