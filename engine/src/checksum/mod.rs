//! Content checksums over plugin source trees
//!
//! The digest covers the raw bytes of every `.rs` file below the plugin
//! directory, fed through one SHA-256 accumulator in sorted path order, and
//! is written as `sha256:<lowercase hex>`. Paths are sorted component-wise
//! relative to the plugin directory, so the result does not depend on where
//! the tree lives on disk or on filesystem iteration order.

use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;
use warden_sdk::errors::SecurityError;

/// Prefix of every checksum string
pub const CHECKSUM_PREFIX: &str = "sha256:";

/// Extension of files covered by the checksum
const SOURCE_EXTENSION: &str = "rs";

/// Recomputes and compares plugin checksums
#[derive(Debug, Clone)]
pub struct ChecksumVerifier {
    plugins_dir: PathBuf,
}

impl ChecksumVerifier {
    pub fn new(plugins_dir: impl Into<PathBuf>) -> Self {
        Self {
            plugins_dir: plugins_dir.into(),
        }
    }

    /// Digest of `<plugins_dir>/<plugin_name>`
    pub fn compute(&self, plugin_name: &str) -> Result<String, SecurityError> {
        let plugin_dir = self.plugins_dir.join(plugin_name);
        let files = source_files(&plugin_dir)?;

        if files.is_empty() {
            return Err(SecurityError::NoSourceFiles(plugin_name.to_string()));
        }

        digest_files(&plugin_dir, &files)
    }

    /// Compare the recomputed digest with `expected`
    ///
    /// # Errors
    ///
    /// `ChecksumMismatch` carrying both values when they differ in any way,
    /// including case. Layout and read failures surface as
    /// `InvalidPluginPath` or `NoSourceFiles`.
    pub fn verify(&self, plugin_name: &str, expected: &str) -> Result<(), SecurityError> {
        let actual = self.compute(plugin_name)?;

        if actual != expected {
            tracing::error!(
                "Checksum mismatch for '{}': expected {}, got {}",
                plugin_name,
                expected,
                actual
            );
            return Err(SecurityError::ChecksumMismatch {
                expected: expected.to_string(),
                actual,
            });
        }

        Ok(())
    }
}

/// List every `.rs` file below `plugin_dir`, relative to it, sorted
///
/// # Errors
///
/// `InvalidPluginPath` if `plugin_dir` is not a directory or cannot be walked.
pub fn source_files(plugin_dir: &Path) -> Result<Vec<PathBuf>, SecurityError> {
    if !plugin_dir.is_dir() {
        return Err(SecurityError::InvalidPluginPath(plugin_dir.to_path_buf()));
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(plugin_dir) {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(plugin_dir).to_path_buf();
            tracing::warn!("Failed to walk {:?}: {}", path, e);
            SecurityError::InvalidPluginPath(path)
        })?;

        let is_source = entry.file_type().is_file()
            && entry.path().extension().is_some_and(|ext| ext == SOURCE_EXTENSION);
        if !is_source {
            continue;
        }

        if let Ok(relative) = entry.path().strip_prefix(plugin_dir) {
            files.push(relative.to_path_buf());
        }
    }

    files.sort();
    Ok(files)
}

/// Hash the given files (relative to `plugin_dir`) in the order given
fn digest_files(plugin_dir: &Path, files: &[PathBuf]) -> Result<String, SecurityError> {
    let mut hasher = Sha256::new();

    for relative in files {
        let path = plugin_dir.join(relative);
        let bytes = fs::read(&path).map_err(|e| {
            tracing::warn!("Failed to read {:?}: {}", path, e);
            SecurityError::InvalidPluginPath(path.clone())
        })?;
        hasher.update(&bytes);
    }

    Ok(format!("{}{}", CHECKSUM_PREFIX, hex::encode(hasher.finalize())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn plugin_tree(files: &[(&str, &str)]) -> TempDir {
        let dir = TempDir::new().unwrap();
        for (path, body) in files {
            let full = dir.path().join("p1").join(path);
            fs::create_dir_all(full.parent().unwrap()).unwrap();
            fs::write(full, body).unwrap();
        }
        dir
    }

    #[test]
    fn test_single_file_digest_matches_plain_sha256() {
        let dir = plugin_tree(&[("src/lib.rs", "hello world")]);
        let digest = ChecksumVerifier::new(dir.path()).compute("p1").unwrap();

        assert_eq!(
            digest,
            "sha256:b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9"
        );
    }

    #[test]
    fn test_only_rust_sources_are_covered() {
        let dir = plugin_tree(&[("src/lib.rs", "fn a() {}"), ("manifest.json", "{}")]);
        let verifier = ChecksumVerifier::new(dir.path());
        let before = verifier.compute("p1").unwrap();

        fs::write(dir.path().join("p1/manifest.json"), r#"{"edited":true}"#).unwrap();
        assert_eq!(verifier.compute("p1").unwrap(), before);
    }

    #[test]
    fn test_sorted_component_wise() {
        let dir = plugin_tree(&[("src/z.rs", ""), ("src/a/b.rs", ""), ("src/a.rs", "")]);
        let files = source_files(&dir.path().join("p1")).unwrap();

        assert_eq!(
            files,
            vec![
                PathBuf::from("src/a/b.rs"),
                PathBuf::from("src/a.rs"),
                PathBuf::from("src/z.rs"),
            ]
        );
    }

    #[test]
    fn test_verify_mismatch_reports_both_digests() {
        let dir = plugin_tree(&[("src/lib.rs", "fn a() {}")]);
        let verifier = ChecksumVerifier::new(dir.path());
        let actual = verifier.compute("p1").unwrap();

        assert!(verifier.verify("p1", &actual).is_ok());
        assert_eq!(
            verifier.verify("p1", "sha256:00"),
            Err(SecurityError::ChecksumMismatch {
                expected: "sha256:00".to_string(),
                actual: actual.clone(),
            })
        );
        assert!(verifier.verify("p1", &actual.to_uppercase()).is_err());
    }

    #[test]
    fn test_missing_dir_and_empty_dir() {
        let dir = plugin_tree(&[("README.md", "docs")]);
        let verifier = ChecksumVerifier::new(dir.path());

        assert_eq!(
            verifier.compute("p1"),
            Err(SecurityError::NoSourceFiles("p1".to_string()))
        );
        assert!(matches!(
            verifier.compute("absent"),
            Err(SecurityError::InvalidPluginPath(_))
        ));
    }
}
