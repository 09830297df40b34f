//! Compiled-in plugin registry
//!
//! Maps a plugin name to the factory that constructs it. Only names present
//! here can ever be instantiated; a plugin directory on disk without a
//! registry entry fails at the instantiation step.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use warden_sdk::{PluginContext, PluginFactory, PluginFuture};

/// Name → factory mapping
#[derive(Clone, Default)]
pub struct PluginRegistry {
    factories: BTreeMap<String, PluginFactory>,
}

impl PluginRegistry {
    /// Empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry of the first-party plugins shipped with the engine
    pub fn builtin() -> Self {
        Self::new()
            .with("gdpr_plugin", gdpr_plugin::create)
            .with("security_plugin", security_plugin::create)
            .with("analytics_plugin", analytics_plugin::create)
    }

    /// Register a factory, replacing any previous one under the same name
    pub fn register<F>(&mut self, name: impl Into<String>, factory: F)
    where
        F: Fn(PluginContext) -> PluginFuture + Send + Sync + 'static,
    {
        self.factories.insert(name.into(), Arc::new(factory));
    }

    /// Builder-style [`register`](Self::register)
    pub fn with<F>(mut self, name: impl Into<String>, factory: F) -> Self
    where
        F: Fn(PluginContext) -> PluginFuture + Send + Sync + 'static,
    {
        self.register(name, factory);
        self
    }

    pub fn get(&self, name: &str) -> Option<PluginFactory> {
        self.factories.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    /// Registered names, sorted
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.factories.keys().map(String::as_str)
    }
}

impl fmt::Debug for PluginRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.names()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::PolicyTable;

    #[test]
    fn test_builtin_covers_policy_table() {
        let registry = PluginRegistry::builtin();

        for name in PolicyTable::builtin().names() {
            assert!(registry.contains(name), "no factory for approved plugin {name}");
        }
    }

    #[test]
    fn test_register_replaces() {
        let mut registry = PluginRegistry::new();
        registry.register("p1", gdpr_plugin::create);
        registry.register("p1", analytics_plugin::create);

        assert_eq!(registry.names().collect::<Vec<_>>(), vec!["p1"]);
        assert!(registry.get("p2").is_none());
        assert_eq!(format!("{:?}", registry), r#"{"p1"}"#);
    }
}
