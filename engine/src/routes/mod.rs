//! Route table
//!
//! The host side of [`HostHandle`]: the set of endpoints plugins have
//! registered. Serving them is left to whatever web layer embeds the engine.
//!
//! Plugins never see the table itself. Each gets a handle scoped to its own
//! name and grants: registration is refused without `network`, and every
//! route is recorded under the registering plugin whatever owner it claims.

use std::sync::{Arc, RwLock};
use warden_sdk::{HostHandle, HostHandleImpl, Permission, PermissionSet, PluginError, Route};

/// Registered plugin routes, in registration order
#[derive(Debug, Default)]
pub struct RouteTable {
    routes: RwLock<Vec<Route>>,
}

impl RouteTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Handle given to one plugin, limited by its approved permissions
    pub fn handle_for(self: &Arc<Self>, owner: &str, permissions: &PermissionSet) -> HostHandle {
        HostHandle::new(Arc::new(PluginRoutes {
            table: Arc::clone(self),
            owner: owner.to_string(),
            network: permissions.contains(&Permission::Network),
        }))
    }

    /// Routes registered by one plugin
    pub fn owned_by(&self, owner: &str) -> Vec<Route> {
        self.read().into_iter().filter(|r| r.owner == owner).collect()
    }

    /// All routes ordered by path, then method
    pub fn sorted(&self) -> Vec<Route> {
        let mut routes = self.read();
        routes.sort_by(|a, b| a.path.cmp(&b.path).then(a.method.cmp(&b.method)));
        routes
    }

    /// Drop every route a plugin registered; returns how many were removed
    pub fn remove_owner(&self, owner: &str) -> usize {
        let mut routes = match self.routes.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let before = routes.len();
        routes.retain(|r| r.owner != owner);
        before - routes.len()
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    fn read(&self) -> Vec<Route> {
        match self.routes.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl HostHandleImpl for RouteTable {
    fn register_route(&self, route: Route) -> Result<(), PluginError> {
        let mut routes = match self.routes.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        if let Some(existing) = routes.iter().find(|r| r.collides_with(&route)) {
            if existing.owner == route.owner {
                return Ok(());
            }
            return Err(PluginError::RouteConflict {
                method: route.method.to_string(),
                path: route.path,
                owner: existing.owner.clone(),
            });
        }

        tracing::debug!("Route registered: {} {} ({})", route.method, route.path, route.owner);
        routes.push(route);
        Ok(())
    }

    fn routes(&self) -> Vec<Route> {
        self.read()
    }
}

/// A plugin's view of the shared table
struct PluginRoutes {
    table: Arc<RouteTable>,
    owner: String,
    network: bool,
}

impl HostHandleImpl for PluginRoutes {
    fn register_route(&self, mut route: Route) -> Result<(), PluginError> {
        if !self.network {
            tracing::warn!(
                "Plugin '{}' tried to register {} {} without network permission",
                self.owner,
                route.method,
                route.path
            );
            return Err(PluginError::PermissionDenied(Permission::Network));
        }

        if route.owner != self.owner {
            tracing::warn!(
                "Plugin '{}' registered {} {} as '{}', recording it as its own",
                self.owner,
                route.method,
                route.path,
                route.owner
            );
            route.owner = self.owner.clone();
        }
        self.table.register_route(route)
    }

    fn routes(&self) -> Vec<Route> {
        self.table.read()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use warden_sdk::HttpMethod;

    #[test]
    fn test_same_owner_reregistration_is_noop() {
        let table = RouteTable::new();
        let route = Route::new(HttpMethod::Get, "/health", "p1");

        table.register_route(route.clone()).unwrap();
        table.register_route(route).unwrap();

        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_conflict_names_existing_owner() {
        let table = RouteTable::new();
        table
            .register_route(Route::new(HttpMethod::Get, "/health", "p1"))
            .unwrap();

        assert_eq!(
            table.register_route(Route::new(HttpMethod::Get, "/health", "p2")),
            Err(PluginError::RouteConflict {
                method: "GET".to_string(),
                path: "/health".to_string(),
                owner: "p1".to_string(),
            })
        );
        // Different method on the same path is a different route
        assert!(table
            .register_route(Route::new(HttpMethod::Post, "/health", "p2"))
            .is_ok());
    }

    fn network() -> PermissionSet {
        Permission::set_of(["network"])
    }

    #[test]
    fn test_remove_owner() {
        let table = Arc::new(RouteTable::new());
        let p1 = table.handle_for("p1", &network());
        let p2 = table.handle_for("p2", &network());
        p1.register_route(Route::new(HttpMethod::Get, "/a", "p1")).unwrap();
        p1.register_route(Route::new(HttpMethod::Get, "/b", "p1")).unwrap();
        p2.register_route(Route::new(HttpMethod::Get, "/c", "p2")).unwrap();

        assert_eq!(table.remove_owner("p1"), 2);
        assert_eq!(table.owned_by("p2").len(), 1);
        assert_eq!(p1.routes().len(), 1);
        assert_eq!(table.remove_owner("p1"), 0);
    }

    #[test]
    fn test_handle_without_network_refuses() {
        let table = Arc::new(RouteTable::new());
        let handle = table.handle_for("p1", &Permission::set_of(["database"]));

        assert_eq!(
            handle.register_route(Route::new(HttpMethod::Get, "/a", "p1")),
            Err(PluginError::PermissionDenied(Permission::Network))
        );
        assert!(table.is_empty());
    }

    #[test]
    fn test_handle_records_real_owner() {
        let table = Arc::new(RouteTable::new());
        let handle = table.handle_for("p1", &network());

        handle
            .register_route(Route::new(HttpMethod::Get, "/p2/admin", "p2"))
            .unwrap();

        assert_eq!(table.owned_by("p1").len(), 1);
        assert!(table.owned_by("p2").is_empty());
        assert_eq!(table.remove_owner("p1"), 1);
    }
}
