//! Warden SDK
//!
//! Shared library providing the traits and types used by both the Warden
//! host and its plugins.

/// Plugin trait, context and host handle
pub mod plugin;

/// Error types and handling
pub mod errors;

/// Capability tokens
pub mod permission;

/// Route types
pub mod types;

/// Manifest types
pub mod manifest;

/// Standard collections, importable by plugins without naming `std`
pub mod collections {
    pub use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
}

/// Everything a plugin crate needs in one import
pub mod prelude {
    pub use crate::errors::PluginError;
    pub use crate::permission::{Permission, PermissionSet};
    pub use crate::plugin::{HostHandle, Plugin, PluginContext, PluginFuture};
    pub use crate::types::{HttpMethod, Route};
    pub use async_trait::async_trait;
}

// Re-export commonly used types
pub use async_trait::async_trait;
pub use errors::{EngineError, LoadError, ManifestError, PluginError, SecurityError, WardenErrorExt};
pub use manifest::PluginManifest;
pub use permission::{Permission, PermissionSet};
pub use plugin::{HostHandle, HostHandleImpl, Plugin, PluginContext, PluginFactory, PluginFuture};
pub use types::{HttpMethod, Route};
