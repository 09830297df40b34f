//! Manifest loading
//!
//! Locates `<plugins_dir>/<name>/manifest.json` and validates its shape.
//! Policy is enforced later by [`crate::policy::SecurityValidator`]; this
//! module only guarantees that a well-formed [`PluginManifest`] comes out.

use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};
use warden_sdk::errors::ManifestError;
use warden_sdk::manifest::REQUIRED_FIELDS;
use warden_sdk::PluginManifest;

/// File name of the manifest inside a plugin directory
pub const MANIFEST_FILE: &str = "manifest.json";

/// Reads plugin manifests from a plugin directory root
#[derive(Debug, Clone)]
pub struct ManifestLoader {
    plugins_dir: PathBuf,
}

impl ManifestLoader {
    pub fn new(plugins_dir: impl Into<PathBuf>) -> Self {
        Self {
            plugins_dir: plugins_dir.into(),
        }
    }

    /// Path the manifest for `plugin_name` is expected at
    pub fn manifest_path(&self, plugin_name: &str) -> PathBuf {
        self.plugins_dir.join(plugin_name).join(MANIFEST_FILE)
    }

    /// Load and structurally validate a plugin's manifest
    ///
    /// # Errors
    ///
    /// - `InvalidName` if `plugin_name` is not a single plain path component
    /// - `NotFound` / `Unreadable` for filesystem problems
    /// - `Malformed` if the file is not a JSON object or a field has the wrong type
    /// - `MissingField` naming the first absent required field
    /// - `NameMismatch` if the manifest declares a different name
    pub fn load(&self, plugin_name: &str) -> Result<PluginManifest, ManifestError> {
        check_plugin_name(plugin_name)?;

        let path = self.manifest_path(plugin_name);
        let contents = fs::read_to_string(&path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => ManifestError::NotFound(path.clone()),
            _ => ManifestError::Unreadable {
                path: path.clone(),
                reason: e.to_string(),
            },
        })?;

        let manifest = parse_manifest(&contents)?;

        if manifest.name != plugin_name {
            return Err(ManifestError::NameMismatch {
                expected: plugin_name.to_string(),
                found: manifest.name,
            });
        }

        tracing::debug!("Loaded manifest for '{}' from {:?}", plugin_name, path);
        Ok(manifest)
    }
}

/// Parse manifest text, reporting missing fields by name
///
/// Goes through `serde_json::Value` first so that an absent required field
/// is reported as `MissingField` rather than a generic deserialization error.
pub fn parse_manifest(contents: &str) -> Result<PluginManifest, ManifestError> {
    let value: serde_json::Value =
        serde_json::from_str(contents).map_err(|e| ManifestError::Malformed(e.to_string()))?;

    let object = value
        .as_object()
        .ok_or_else(|| ManifestError::Malformed("manifest must be a JSON object".to_string()))?;

    if let Some(field) = REQUIRED_FIELDS.iter().find(|f| !object.contains_key(**f)) {
        return Err(ManifestError::MissingField(field.to_string()));
    }

    serde_json::from_value(value).map_err(|e| ManifestError::Malformed(e.to_string()))
}

/// Reject names that would escape or alias the plugin directory
pub fn check_plugin_name(name: &str) -> Result<(), ManifestError> {
    let mut components = Path::new(name).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) if !name.contains(['/', '\\']) => Ok(()),
        _ => Err(ManifestError::InvalidName(name.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_manifest(dir: &TempDir, name: &str, body: &str) {
        let plugin_dir = dir.path().join(name);
        fs::create_dir_all(&plugin_dir).unwrap();
        fs::write(plugin_dir.join(MANIFEST_FILE), body).unwrap();
    }

    #[test]
    fn test_load_valid_manifest() {
        let dir = TempDir::new().unwrap();
        write_manifest(
            &dir,
            "p1",
            r#"{"name":"p1","version":"1.0.0","description":"d","author":"a",
                "permissions":["database"],"dependencies":["p0"],"checksum":"sha256:00"}"#,
        );

        let manifest = ManifestLoader::new(dir.path()).load("p1").unwrap();
        assert_eq!(manifest.version, "1.0.0");
        assert_eq!(manifest.dependencies, vec!["p0".to_string()]);
        assert_eq!(manifest.checksum, "sha256:00");
    }

    #[test]
    fn test_missing_manifest() {
        let dir = TempDir::new().unwrap();
        let loader = ManifestLoader::new(dir.path());

        assert_eq!(
            loader.load("ghost"),
            Err(ManifestError::NotFound(loader.manifest_path("ghost")))
        );
    }

    #[test]
    fn test_missing_fields_reported_in_order() {
        assert_eq!(
            parse_manifest(r#"{"name":"p1","author":"a"}"#),
            Err(ManifestError::MissingField("version".to_string()))
        );
        assert_eq!(
            parse_manifest(r#"{"name":"p1","version":"1","description":"d","author":"a"}"#),
            Err(ManifestError::MissingField("permissions".to_string()))
        );
    }

    #[test]
    fn test_malformed_manifest() {
        assert!(matches!(parse_manifest("{not json"), Err(ManifestError::Malformed(_))));
        assert!(matches!(parse_manifest("[1, 2]"), Err(ManifestError::Malformed(_))));
        assert!(matches!(
            parse_manifest(
                r#"{"name":"p1","version":"1","description":"d","author":"a","permissions":"network"}"#
            ),
            Err(ManifestError::Malformed(_))
        ));
    }

    #[test]
    fn test_name_mismatch() {
        let dir = TempDir::new().unwrap();
        write_manifest(
            &dir,
            "p1",
            r#"{"name":"p2","version":"1","description":"d","author":"a","permissions":[]}"#,
        );

        assert_eq!(
            ManifestLoader::new(dir.path()).load("p1"),
            Err(ManifestError::NameMismatch {
                expected: "p1".to_string(),
                found: "p2".to_string(),
            })
        );
    }

    #[test]
    fn test_invalid_names_rejected() {
        for name in ["", ".", "..", "a/b", "../etc", "a\\b", "/abs"] {
            assert_eq!(
                check_plugin_name(name),
                Err(ManifestError::InvalidName(name.to_string())),
                "{name:?} should be rejected"
            );
        }
        assert!(check_plugin_name("gdpr_plugin").is_ok());
    }
}
