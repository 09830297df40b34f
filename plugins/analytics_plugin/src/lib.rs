//! Analytics plugin
//!
//! Counts application events by type and user. Database access only, so on
//! a host following the approved policy its health route stays unregistered.

use serde::{Deserialize, Serialize};
use warden_sdk::collections::{BTreeMap, BTreeSet};
use warden_sdk::prelude::*;

/// One tracked event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalyticsEvent {
    pub event_type: String,
    pub user_id: Option<u64>,
    #[serde(default)]
    pub data: serde_json::Value,
}

/// Aggregated event counts
#[derive(Debug, Default)]
pub struct EventStore {
    events: Vec<AnalyticsEvent>,
}

impl EventStore {
    pub fn track(&mut self, event: AnalyticsEvent) {
        self.events.push(event);
    }

    pub fn total(&self) -> usize {
        self.events.len()
    }

    /// Event count per type, sorted by type
    pub fn counts_by_type(&self) -> BTreeMap<String, usize> {
        let mut counts = BTreeMap::new();
        for event in &self.events {
            *counts.entry(event.event_type.clone()).or_insert(0) += 1;
        }
        counts
    }

    /// Distinct identified users seen
    pub fn unique_users(&self) -> usize {
        self.events
            .iter()
            .filter_map(|e| e.user_id)
            .collect::<BTreeSet<u64>>()
            .len()
    }
}

/// Analytics plugin instance
pub struct AnalyticsPlugin {
    ctx: PluginContext,
    store: EventStore,
}

impl AnalyticsPlugin {
    pub fn new(ctx: PluginContext) -> Self {
        Self {
            ctx,
            store: EventStore::default(),
        }
    }

    pub fn store(&self) -> &EventStore {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut EventStore {
        &mut self.store
    }

    /// Health payload served at `/analytics/health`
    pub fn health(&self) -> serde_json::Value {
        serde_json::json!({ "status": "ok", "plugin": self.ctx.name })
    }
}

#[async_trait]
impl Plugin for AnalyticsPlugin {
    fn required_permissions(&self) -> PermissionSet {
        PermissionSet::from([Permission::Database])
    }

    async fn initialize(&mut self) -> Result<(), PluginError> {
        self.ctx.require(Permission::Database)
    }

    async fn register_routes(&mut self) -> Result<(), PluginError> {
        self.ctx.require(Permission::Network)?;
        self.ctx.host.register_route(
            Route::new(HttpMethod::Get, "/analytics/health", self.ctx.name.as_str())
                .with_summary("Analytics plugin health check"),
        )
    }

    async fn cleanup(&mut self) -> Result<(), PluginError> {
        self.store = EventStore::default();
        Ok(())
    }
}

/// Registry factory
pub fn create(ctx: PluginContext) -> PluginFuture {
    Box::pin(async move { Ok(Box::new(AnalyticsPlugin::new(ctx)) as Box<dyn Plugin>) })
}
