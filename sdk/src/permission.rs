//! Capability tokens granted to plugins

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// A named privilege a plugin must be explicitly granted to exercise
///
/// Serialized as its lowercase token (`"database"`, `"network"`,
/// `"filesystem"`). Tokens the host does not know are kept as
/// [`Permission::Other`] so that policy checks can reject them by name
/// instead of failing the manifest parse.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Permission {
    /// Access to the host's persistence layer
    Database,
    /// Network exposure; gates route registration
    Network,
    /// Access to the local filesystem
    Filesystem,
    /// Any other token
    Other(String),
}

/// Ordered set of permissions
pub type PermissionSet = BTreeSet<Permission>;

impl Permission {
    /// The token as written in manifests and policy entries
    pub fn as_str(&self) -> &str {
        match self {
            Self::Database => "database",
            Self::Network => "network",
            Self::Filesystem => "filesystem",
            Self::Other(token) => token,
        }
    }

    /// Build a permission set from string tokens
    pub fn set_of<I, S>(tokens: I) -> PermissionSet
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        tokens.into_iter().map(|t| Permission::from(t.as_ref())).collect()
    }
}

impl From<&str> for Permission {
    fn from(token: &str) -> Self {
        match token {
            "database" => Self::Database,
            "network" => Self::Network,
            "filesystem" => Self::Filesystem,
            other => Self::Other(other.to_string()),
        }
    }
}

impl From<String> for Permission {
    fn from(token: String) -> Self {
        Permission::from(token.as_str())
    }
}

impl From<Permission> for String {
    fn from(permission: Permission) -> Self {
        permission.as_str().to_string()
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
