//! Plugin trait and context types
//!
//! This module defines the [`Plugin`] trait every Warden plugin implements,
//! the [`PluginContext`] handed to a plugin's constructor, and the
//! [`HostHandle`] through which a plugin registers its endpoints.
//!
//! The host constructs a plugin through a [`PluginFactory`] looked up in a
//! compiled-in registry, never by name convention.

use crate::errors::PluginError;
use crate::permission::{Permission, PermissionSet};
use crate::types::Route;
use async_trait::async_trait;
use futures::future::BoxFuture;
use std::sync::Arc;

/// Trait that all plugins must implement
///
/// Every hook has a default so a plugin only overrides what it needs. The
/// host calls them in this order: `required_permissions`, `initialize`,
/// `register_routes` (only when `network` was granted), and finally
/// `cleanup` on unload.
#[async_trait]
pub trait Plugin: Send + Sync {
    /// Permissions the plugin's code needs to operate
    ///
    /// Checked against the manifest's approved set before `initialize` runs,
    /// which catches manifests that under-declare what the code uses.
    fn required_permissions(&self) -> PermissionSet {
        PermissionSet::new()
    }

    /// Called once after construction
    async fn initialize(&mut self) -> Result<(), PluginError> {
        Ok(())
    }

    /// Register externally visible routes with the host
    ///
    /// Must be idempotent.
    async fn register_routes(&mut self) -> Result<(), PluginError> {
        Ok(())
    }

    /// Release everything the plugin owns
    async fn cleanup(&mut self) -> Result<(), PluginError> {
        Ok(())
    }
}

/// Future returned by a plugin factory
pub type PluginFuture = BoxFuture<'static, Result<Box<dyn Plugin>, PluginError>>;

/// Constructor reference stored in the host's plugin registry
pub type PluginFactory = Arc<dyn Fn(PluginContext) -> PluginFuture + Send + Sync>;

/// Context provided to a plugin constructor
///
/// Carries the plugin's own name, the host handle (passed through
/// scoped to this plugin) and the permission set approved for this load.
#[derive(Clone)]
pub struct PluginContext {
    pub name: String,
    pub host: HostHandle,
    pub permissions: PermissionSet,
}

impl PluginContext {
    /// Create a new PluginContext
    pub fn new(name: impl Into<String>, host: HostHandle, permissions: PermissionSet) -> Self {
        Self {
            name: name.into(),
            host,
            permissions,
        }
    }

    /// Whether the permission was granted for this load
    pub fn has_permission(&self, permission: &Permission) -> bool {
        self.permissions.contains(permission)
    }

    /// Fail with `PermissionDenied` unless the permission was granted
    pub fn require(&self, permission: Permission) -> Result<(), PluginError> {
        if self.has_permission(&permission) {
            Ok(())
        } else {
            Err(PluginError::PermissionDenied(permission))
        }
    }
}

/// Handle to the host application
///
/// Opaque to plugins apart from route registration.
#[derive(Clone)]
pub struct HostHandle {
    inner: Arc<dyn HostHandleImpl>,
}

impl HostHandle {
    /// Create a new HostHandle with the given implementation
    pub fn new(inner: Arc<dyn HostHandleImpl>) -> Self {
        Self { inner }
    }

    /// Register a route with the host
    pub fn register_route(&self, route: Route) -> Result<(), PluginError> {
        self.inner.register_route(route)
    }

    /// All routes currently registered with the host
    pub fn routes(&self) -> Vec<Route> {
        self.inner.routes()
    }
}

/// Trait for host handle implementation (to be implemented by engine)
pub trait HostHandleImpl: Send + Sync {
    /// Register a route; same owner + method + path again is a no-op
    fn register_route(&self, route: Route) -> Result<(), PluginError>;

    /// List registered routes
    fn routes(&self) -> Vec<Route>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::HttpMethod;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingHost {
        routes: Mutex<Vec<Route>>,
    }

    impl HostHandleImpl for RecordingHost {
        fn register_route(&self, route: Route) -> Result<(), PluginError> {
            self.routes.lock().unwrap().push(route);
            Ok(())
        }

        fn routes(&self) -> Vec<Route> {
            self.routes.lock().unwrap().clone()
        }
    }

    struct Quiet;

    #[async_trait]
    impl Plugin for Quiet {}

    fn context(tokens: &[&str]) -> PluginContext {
        let host = HostHandle::new(Arc::new(RecordingHost::default()));
        PluginContext::new("quiet", host, Permission::set_of(tokens.iter().copied()))
    }

    #[test]
    fn test_context_require() {
        let ctx = context(&["database"]);

        assert!(ctx.require(Permission::Database).is_ok());
        assert_eq!(
            ctx.require(Permission::Network),
            Err(PluginError::PermissionDenied(Permission::Network))
        );
    }

    #[test]
    fn test_host_handle_delegates() {
        let ctx = context(&["network"]);
        ctx.host
            .register_route(Route::new(HttpMethod::Get, "/ping", "quiet"))
            .unwrap();

        assert_eq!(ctx.host.routes().len(), 1);
    }

    #[tokio::test]
    async fn test_default_hooks_are_noops() {
        let mut plugin = Quiet;

        assert!(plugin.required_permissions().is_empty());
        assert!(plugin.initialize().await.is_ok());
        assert!(plugin.register_routes().await.is_ok());
        assert!(plugin.cleanup().await.is_ok());
    }
}
