//! Runtime module for loading and managing plugins
//!
//! - PluginRegistry: compiled-in name → factory mapping
//! - PluginManager: the gated load pipeline and lifecycle state machine

pub mod manager;
pub mod registry;

pub use manager::{
    LoadReport, MissingDependency, PluginFailure, PluginManager, PluginStatus, DEFAULT_INSTANTIATE_TIMEOUT,
    RUNTIME_VERSION,
};
pub use registry::PluginRegistry;
