use analytics_plugin::{AnalyticsEvent, AnalyticsPlugin, EventStore};
use std::sync::{Arc, Mutex};
use warden_sdk::prelude::*;
use warden_sdk::HostHandleImpl;

#[derive(Default)]
struct TestHost {
    routes: Mutex<Vec<Route>>,
}

impl HostHandleImpl for TestHost {
    fn register_route(&self, route: Route) -> Result<(), PluginError> {
        self.routes.lock().unwrap().push(route);
        Ok(())
    }

    fn routes(&self) -> Vec<Route> {
        self.routes.lock().unwrap().clone()
    }
}

fn event(event_type: &str, user_id: Option<u64>) -> AnalyticsEvent {
    AnalyticsEvent {
        event_type: event_type.to_string(),
        user_id,
        data: serde_json::Value::Null,
    }
}

#[test]
fn test_event_aggregation() {
    let mut store = EventStore::default();
    store.track(event("page_view", Some(1)));
    store.track(event("page_view", Some(2)));
    store.track(event("signup", Some(1)));
    store.track(event("page_view", None));

    assert_eq!(store.total(), 4);
    assert_eq!(store.counts_by_type()["page_view"], 3);
    assert_eq!(store.unique_users(), 2);
}

#[tokio::test]
async fn test_lifecycle() {
    let host = Arc::new(TestHost::default());
    let ctx = PluginContext::new(
        "analytics_plugin",
        HostHandle::new(host.clone()),
        Permission::set_of(["database"]),
    );
    let mut plugin = AnalyticsPlugin::new(ctx);

    plugin.initialize().await.unwrap();
    plugin.store_mut().track(event("click", Some(7)));
    assert_eq!(plugin.health()["plugin"], "analytics_plugin");

    assert!(plugin.register_routes().await.is_err());
    assert!(host.routes().is_empty());

    plugin.cleanup().await.unwrap();
    assert_eq!(plugin.store().total(), 0);
}
