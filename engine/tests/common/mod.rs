//! Shared fixtures: throwaway plugin trees and instrumented test plugins

#![allow(dead_code)]

use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use warden_engine::checksum::ChecksumVerifier;
use warden_engine::policy::{ApprovedPlugin, PolicyTable};
use warden_engine::runtime::{PluginManager, PluginRegistry};
use warden_sdk::prelude::*;

/// Minimal source that passes the static validator
pub const CLEAN_SOURCE: &str = "use warden_sdk::prelude::*;\n\npub struct Plugin;\n";

/// Write `<root>/<name>/src/lib.rs` and a manifest carrying the real checksum
///
/// Returns the checksum so the caller can approve it in a policy table.
pub fn write_plugin(root: &Path, name: &str, permissions: &[&str], source: &str) -> String {
    write_plugin_with(root, name, permissions, source, |_| {})
}

/// Like [`write_plugin`], with a hook to adjust the manifest JSON
pub fn write_plugin_with(
    root: &Path,
    name: &str,
    permissions: &[&str],
    source: &str,
    edit: impl FnOnce(&mut serde_json::Value),
) -> String {
    let dir = root.join(name);
    fs::create_dir_all(dir.join("src")).unwrap();
    fs::write(dir.join("src/lib.rs"), source).unwrap();

    let checksum = ChecksumVerifier::new(root).compute(name).unwrap();
    write_manifest(root, name, permissions, &checksum, edit);
    checksum
}

/// Write `<root>/<name>/manifest.json` for whatever sources are already there
pub fn write_manifest(
    root: &Path,
    name: &str,
    permissions: &[&str],
    checksum: &str,
    edit: impl FnOnce(&mut serde_json::Value),
) {
    let mut manifest = serde_json::json!({
        "name": name,
        "version": "1.0.0",
        "description": "test plugin",
        "author": "tests",
        "permissions": permissions,
        "checksum": checksum,
    });
    edit(&mut manifest);
    fs::write(root.join(name).join("manifest.json"), manifest.to_string()).unwrap();
}

/// Policy entry approving exactly `permissions` up to 1.0.0
pub fn approve(table: &mut PolicyTable, name: &str, permissions: &[&str], checksum: &str) {
    table.insert(
        name,
        ApprovedPlugin::new(permissions.iter().copied(), "1.0.0", checksum),
    );
}

/// Call counters shared between a test and its recording plugins
#[derive(Default)]
pub struct Counters {
    pub constructed: AtomicUsize,
    pub initialized: AtomicUsize,
    pub routes: AtomicUsize,
    pub cleaned: AtomicUsize,
}

/// Current value of one counter
pub fn count(counter: &AtomicUsize) -> usize {
    counter.load(Ordering::SeqCst)
}

/// What a recording plugin does in each hook
#[derive(Clone, Default)]
pub struct Behavior {
    pub needs: Vec<&'static str>,
    pub fail_init: bool,
    pub route: Option<&'static str>,
    /// Route registered from `initialize`, before any failure it reports
    pub init_route: Option<&'static str>,
    /// Owner written into registered routes instead of the plugin's name
    pub claim_owner: Option<&'static str>,
    pub fail_cleanup: bool,
}

pub struct Recorder {
    ctx: PluginContext,
    behavior: Behavior,
    counters: Arc<Counters>,
}

impl Recorder {
    fn route(&self, path: &str) -> Route {
        let owner = match self.behavior.claim_owner {
            Some(claimed) => claimed.to_string(),
            None => self.ctx.name.clone(),
        };
        Route::new(HttpMethod::Get, path, owner)
    }
}

#[async_trait]
impl Plugin for Recorder {
    fn required_permissions(&self) -> PermissionSet {
        Permission::set_of(self.behavior.needs.iter().copied())
    }

    async fn initialize(&mut self) -> Result<(), PluginError> {
        self.counters.initialized.fetch_add(1, Ordering::SeqCst);
        if let Some(path) = self.behavior.init_route {
            self.ctx.host.register_route(self.route(path))?;
        }
        if self.behavior.fail_init {
            return Err(PluginError::Initialization("refused to start".to_string()));
        }
        Ok(())
    }

    async fn register_routes(&mut self) -> Result<(), PluginError> {
        self.counters.routes.fetch_add(1, Ordering::SeqCst);
        if let Some(path) = self.behavior.route {
            self.ctx.host.register_route(self.route(path))?;
        }
        Ok(())
    }

    async fn cleanup(&mut self) -> Result<(), PluginError> {
        self.counters.cleaned.fetch_add(1, Ordering::SeqCst);
        if self.behavior.fail_cleanup {
            return Err(PluginError::Cleanup("cleanup failed".to_string()));
        }
        Ok(())
    }
}

/// Factory building recorders with the given behavior
pub fn recorder(
    behavior: Behavior,
    counters: Arc<Counters>,
) -> impl Fn(PluginContext) -> PluginFuture + Send + Sync + 'static {
    move |ctx: PluginContext| -> PluginFuture {
        let behavior = behavior.clone();
        let counters = counters.clone();
        Box::pin(async move {
            counters.constructed.fetch_add(1, Ordering::SeqCst);
            Ok::<_, PluginError>(Box::new(Recorder {
                ctx,
                behavior,
                counters,
            }) as Box<dyn Plugin>)
        })
    }
}

/// Factory whose construction never completes
pub fn hanging(ctx: PluginContext) -> PluginFuture {
    Box::pin(async move {
        let _ctx = ctx;
        std::future::pending::<()>().await;
        Err::<Box<dyn Plugin>, _>(PluginError::Other("unreachable".to_string()))
    })
}

/// Factory that panics while constructing
pub fn panicking(_ctx: PluginContext) -> PluginFuture {
    Box::pin(async move {
        if true {
            panic!("constructor exploded");
        }
        Err::<Box<dyn Plugin>, _>(PluginError::Other("unreachable".to_string()))
    })
}

/// Test fixture: a temp plugin dir plus the policy and registry built up for it
pub struct Fixture {
    pub dir: TempDir,
    pub policy: PolicyTable,
    pub registry: PluginRegistry,
    pub counters: Arc<Counters>,
}

impl Fixture {
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().unwrap(),
            policy: PolicyTable::new(),
            registry: PluginRegistry::new(),
            counters: Arc::new(Counters::default()),
        }
    }

    /// Write, approve and register a recording plugin
    pub fn add_recorder(&mut self, name: &str, permissions: &[&str], behavior: Behavior) {
        let checksum = write_plugin(self.dir.path(), name, permissions, CLEAN_SOURCE);
        approve(&mut self.policy, name, permissions, &checksum);
        self.registry
            .register(name, recorder(behavior, self.counters.clone()));
    }

    pub fn manager(&self) -> PluginManager {
        PluginManager::new(self.dir.path(), self.policy.clone(), self.registry.clone())
            .with_timeout(Duration::from_millis(200))
    }
}
