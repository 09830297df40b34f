//! Plugin manager
//!
//! Drives each enabled plugin through the verification pipeline, owns the
//! live instances and tracks the lifecycle of every plugin it has seen.
//!
//! # Load Pipeline
//!
//! Every plugin passes five gates before any of its code runs:
//!
//! 1. **Gate 1: Manifest** - `manifest.json` exists and is well formed
//! 2. **Gate 2: Policy** - name, permissions, version and checksum are approved
//! 3. **Gate 3: Runtime** - the host is new enough for the plugin
//! 4. **Gate 4: Checksum** - the source tree hashes to the declared checksum
//! 5. **Gate 5: Static validation** - `src/lib.rs` passes the code validator
//!
//! After the gates the plugin is constructed through its registry factory
//! under a timeout, its declared needs are checked against the approved
//! permissions, it is initialized, and it may register routes if `network`
//! was approved. The host handle a plugin receives refuses registration
//! without `network` at any stage, and a plugin that fails to load loses
//! whatever routes it managed to register.
//!
//! # Failure Isolation
//!
//! A failure at any step marks only that plugin `Failed` and keeps the error
//! for [`PluginManager::failure`]. [`PluginManager::load_enabled_plugins`]
//! never returns an error. Nothing is retried.
//!
//! # Concurrency
//!
//! All state sits behind one async mutex held for a whole load, unload or
//! cleanup pass, so the manager can be shared through an `Arc` with a
//! shutdown task without a plugin ever being cleaned up twice.

use crate::checksum::ChecksumVerifier;
use crate::code_validator::CodeValidator;
use crate::config::Config;
use crate::manifest_loader::ManifestLoader;
use crate::policy::{version_exceeds, PolicyTable, SecurityValidator};
use crate::routes::RouteTable;
use crate::runtime::registry::PluginRegistry;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use warden_sdk::errors::{LoadError, SecurityError};
use warden_sdk::{Permission, PermissionSet, Plugin, PluginContext, PluginManifest};

/// Version plugins' `min_required_runtime_version` is checked against
pub const RUNTIME_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default bound on constructing one plugin
pub const DEFAULT_INSTANTIATE_TIMEOUT: Duration = Duration::from_secs(5);

/// Lifecycle state of a plugin
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PluginStatus {
    Unknown,
    Loading,
    Loaded,
    Failed,
    Disabled,
}

impl PluginStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unknown => "unknown",
            Self::Loading => "loading",
            Self::Loaded => "loaded",
            Self::Failed => "failed",
            Self::Disabled => "disabled",
        }
    }
}

impl fmt::Display for PluginStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A plugin that failed during a batch load
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluginFailure {
    pub name: String,
    pub error: LoadError,
}

/// A loaded plugin whose declared dependency is not loaded
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MissingDependency {
    pub plugin: String,
    pub dependency: String,
}

/// Outcome of [`PluginManager::load_enabled_plugins`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadReport {
    /// Plugins loaded by this batch, in order
    pub loaded: Vec<String>,
    pub failed: Vec<PluginFailure>,
    /// Advisory only; these plugins stay loaded
    pub missing_dependencies: Vec<MissingDependency>,
}

impl LoadReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty() && self.missing_dependencies.is_empty()
    }
}

#[derive(Default)]
struct ManagerState {
    instances: HashMap<String, Box<dyn Plugin>>,
    statuses: HashMap<String, PluginStatus>,
    manifests: HashMap<String, PluginManifest>,
    failures: HashMap<String, LoadError>,
    /// Live instances in registration order
    load_order: Vec<String>,
}

/// Loads, tracks and tears down plugins
pub struct PluginManager {
    plugins_dir: PathBuf,
    manifests: ManifestLoader,
    security: SecurityValidator,
    checksums: ChecksumVerifier,
    code_validator: CodeValidator,
    registry: PluginRegistry,
    routes: Arc<RouteTable>,
    instantiate_timeout: Duration,
    runtime_version: String,
    state: Mutex<ManagerState>,
}

impl PluginManager {
    /// Create a manager over `plugins_dir` with the given policy and registry
    pub fn new(plugins_dir: impl Into<PathBuf>, policy: PolicyTable, registry: PluginRegistry) -> Self {
        let plugins_dir = plugins_dir.into();
        tracing::info!("Initializing PluginManager for {:?}", plugins_dir);

        Self {
            manifests: ManifestLoader::new(&plugins_dir),
            security: SecurityValidator::new(policy, &plugins_dir),
            checksums: ChecksumVerifier::new(&plugins_dir),
            code_validator: CodeValidator::default(),
            registry,
            routes: Arc::new(RouteTable::new()),
            instantiate_timeout: DEFAULT_INSTANTIATE_TIMEOUT,
            runtime_version: RUNTIME_VERSION.to_string(),
            plugins_dir,
            state: Mutex::new(ManagerState::default()),
        }
    }

    /// Manager with the built-in policy and registry, configured from `config`
    pub fn from_config(config: &Config) -> Self {
        Self::new(
            &config.core.plugins_dir,
            PolicyTable::builtin(),
            PluginRegistry::builtin(),
        )
        .with_timeout(config.instantiate_timeout())
        .with_code_validator(CodeValidator::from(&config.validator))
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.instantiate_timeout = timeout;
        self
    }

    pub fn with_code_validator(mut self, validator: CodeValidator) -> Self {
        self.code_validator = validator;
        self
    }

    /// Share an existing route table instead of a private one
    pub fn with_routes(mut self, routes: Arc<RouteTable>) -> Self {
        self.routes = routes;
        self
    }

    /// Pretend to be a different host version
    pub fn with_runtime_version(mut self, version: impl Into<String>) -> Self {
        self.runtime_version = version.into();
        self
    }

    pub fn routes(&self) -> &Arc<RouteTable> {
        &self.routes
    }

    pub fn policy(&self) -> &PolicyTable {
        self.security.policy()
    }

    /// Load every named plugin, isolating failures
    ///
    /// Names are attempted in order; a repeated name is skipped with a
    /// warning. Afterwards every loaded plugin's dependencies are checked
    /// and missing ones are reported without unloading anything.
    pub async fn load_enabled_plugins<S: AsRef<str>>(&self, names: &[S]) -> LoadReport {
        tracing::info!("Loading {} enabled plugins", names.len());

        let mut report = LoadReport::default();
        let mut seen = HashSet::new();

        for name in names.iter().map(AsRef::as_ref) {
            if !seen.insert(name) {
                tracing::warn!("Plugin '{}' listed more than once, skipping duplicate", name);
                continue;
            }

            match self.load_plugin(name).await {
                Ok(()) => report.loaded.push(name.to_string()),
                Err(LoadError::AlreadyLoaded(_)) => {
                    tracing::info!("Plugin '{}' already loaded", name);
                }
                Err(error) => report.failed.push(PluginFailure {
                    name: name.to_string(),
                    error,
                }),
            }
        }

        report.missing_dependencies = self.check_dependencies().await;

        tracing::info!(
            "Plugin loading finished: {} loaded, {} failed",
            report.loaded.len(),
            report.failed.len()
        );
        report
    }

    /// Load a single plugin through the full pipeline
    ///
    /// # Errors
    ///
    /// Returns the cause of the failure, which is also kept for
    /// [`failure`](Self::failure). `AlreadyLoaded` leaves the running
    /// instance and its status untouched.
    pub async fn load_plugin(&self, name: &str) -> Result<(), LoadError> {
        let mut state = self.state.lock().await;

        if state.instances.contains_key(name) {
            tracing::warn!("Plugin '{}' is already loaded", name);
            return Err(LoadError::AlreadyLoaded(name.to_string()));
        }

        tracing::info!("Loading plugin: {}", name);
        state.statuses.insert(name.to_string(), PluginStatus::Loading);
        state.failures.remove(name);
        state.manifests.remove(name);

        match self.run_pipeline(&mut state, name).await {
            Ok(instance) => {
                state.instances.insert(name.to_string(), instance);
                state.load_order.push(name.to_string());
                state.statuses.insert(name.to_string(), PluginStatus::Loaded);
                tracing::info!("Plugin '{}' loaded successfully", name);
                Ok(())
            }
            Err(error) => {
                tracing::error!("Plugin '{}' failed to load: {}", name, error);
                let dropped = self.routes.remove_owner(name);
                if dropped > 0 {
                    tracing::warn!("Dropped {} routes registered by failed plugin '{}'", dropped, name);
                }
                state.statuses.insert(name.to_string(), PluginStatus::Failed);
                state.failures.insert(name.to_string(), error.clone());
                Err(error)
            }
        }
    }

    async fn run_pipeline(
        &self,
        state: &mut ManagerState,
        name: &str,
    ) -> Result<Box<dyn Plugin>, LoadError> {
        // Gate 1: Manifest
        let manifest = self.manifests.load(name).map_err(|e| {
            tracing::error!("Gate 1 FAILED: Manifest for '{}': {}", name, e);
            e
        })?;
        tracing::info!("Gate 1 PASSED: Manifest loaded for '{}' v{}", name, manifest.version);
        state.manifests.insert(name.to_string(), manifest.clone());

        // Gate 2: Policy
        self.security.validate(name, &manifest).map_err(|e| {
            tracing::error!("Gate 2 FAILED: Policy check for '{}': {}", name, e);
            e
        })?;
        tracing::info!("Gate 2 PASSED: '{}' approved by policy", name);

        // Gate 3: Runtime compatibility
        self.check_runtime(&manifest).map_err(|e| {
            tracing::error!("Gate 3 FAILED: {}", e);
            e
        })?;
        tracing::info!("Gate 3 PASSED: Runtime {} satisfies '{}'", self.runtime_version, name);

        // Gate 4: Checksum, before any plugin code is looked at or run
        self.checksums.verify(name, &manifest.checksum).map_err(|e| {
            tracing::error!("Gate 4 FAILED: Checksum for '{}': {}", name, e);
            e
        })?;
        tracing::info!("Gate 4 PASSED: Checksum verified for '{}'", name);

        // Gate 5: Static validation of the primary source
        let source = self.read_primary_source(name).await?;
        self.code_validator.validate(&source).map_err(|e| {
            tracing::error!("Gate 5 FAILED: Static validation of '{}': {}", name, e);
            e
        })?;
        tracing::info!("Gate 5 PASSED: Source of '{}' validated", name);

        let approved = manifest.permissions.clone();
        let mut instance = self.instantiate(name, approved.clone()).await?;

        if let Some(permission) = instance
            .required_permissions()
            .into_iter()
            .find(|p| !approved.contains(p))
        {
            tracing::error!("Plugin '{}' needs undeclared permission '{}'", name, permission);
            return Err(SecurityError::UndeclaredPermission(permission).into());
        }

        instance.initialize().await.map_err(LoadError::Initialization)?;
        tracing::debug!("Plugin '{}' initialized", name);

        if approved.contains(&Permission::Network) {
            if let Err(e) = instance.register_routes().await {
                tracing::error!("Route registration failed for '{}': {}", name, e);
                if let Err(cleanup_err) = instance.cleanup().await {
                    tracing::error!("Cleanup after failed registration of '{}': {}", name, cleanup_err);
                }
                return Err(LoadError::Initialization(e));
            }
            tracing::info!(
                "Plugin '{}' registered {} routes",
                name,
                self.routes.owned_by(name).len()
            );
        } else {
            tracing::debug!("Skipping route registration for '{}': network not granted", name);
        }

        Ok(instance)
    }

    fn check_runtime(&self, manifest: &PluginManifest) -> Result<(), LoadError> {
        match &manifest.min_required_runtime_version {
            Some(required) if version_exceeds(required, &self.runtime_version) => {
                Err(LoadError::IncompatibleRuntime {
                    required: required.clone(),
                    current: self.runtime_version.clone(),
                })
            }
            _ => Ok(()),
        }
    }

    async fn read_primary_source(&self, name: &str) -> Result<String, SecurityError> {
        let path = self.plugins_dir.join(name).join("src").join("lib.rs");

        tokio::fs::read_to_string(&path).await.map_err(|e| {
            tracing::error!("Gate 5 FAILED: Cannot read {:?}: {}", path, e);
            match e.kind() {
                io::ErrorKind::NotFound => SecurityError::MissingPrimarySource(path.clone()),
                _ => SecurityError::UnparseableSource(e.to_string()),
            }
        })
    }

    /// Construct the plugin in its own task, bounded by the timeout
    async fn instantiate(&self, name: &str, permissions: PermissionSet) -> Result<Box<dyn Plugin>, LoadError> {
        let factory = self.registry.get(name).ok_or_else(|| {
            LoadError::Instantiation(format!("no implementation registered for '{}'", name))
        })?;
        let host = self.routes.handle_for(name, &permissions);
        let ctx = PluginContext::new(name, host, permissions);

        // The factory call itself runs inside the task so that a panic while
        // building the future is contained too.
        let mut task = tokio::spawn(async move { factory(ctx).await });

        match tokio::time::timeout(self.instantiate_timeout, &mut task).await {
            Ok(Ok(Ok(instance))) => {
                tracing::debug!("Plugin '{}' instantiated", name);
                Ok(instance)
            }
            Ok(Ok(Err(e))) => Err(LoadError::Instantiation(e.to_string())),
            Ok(Err(join_error)) if join_error.is_panic() => {
                Err(LoadError::Instantiation("plugin constructor panicked".to_string()))
            }
            Ok(Err(join_error)) => Err(LoadError::Instantiation(join_error.to_string())),
            Err(_) => {
                task.abort();
                tracing::error!(
                    "Plugin '{}' did not finish construction within {:?}",
                    name,
                    self.instantiate_timeout
                );
                Err(LoadError::Timeout(self.instantiate_timeout))
            }
        }
    }

    async fn check_dependencies(&self) -> Vec<MissingDependency> {
        let state = self.state.lock().await;
        let mut missing = Vec::new();

        for name in &state.load_order {
            let Some(manifest) = state.manifests.get(name) else {
                continue;
            };
            for dependency in &manifest.dependencies {
                if !state.instances.contains_key(dependency) {
                    tracing::warn!(
                        "Plugin '{}' depends on '{}', which is not loaded",
                        name,
                        dependency
                    );
                    missing.push(MissingDependency {
                        plugin: name.clone(),
                        dependency: dependency.clone(),
                    });
                }
            }
        }

        missing
    }

    /// Unload a plugin, running its cleanup
    ///
    /// Returns `false` and changes nothing if the plugin is not loaded.
    /// Cleanup errors are logged, never returned.
    pub async fn unload_plugin(&self, name: &str) -> bool {
        let mut state = self.state.lock().await;
        self.unload_locked(&mut state, name).await
    }

    async fn unload_locked(&self, state: &mut ManagerState, name: &str) -> bool {
        let Some(mut instance) = state.instances.remove(name) else {
            tracing::debug!("Plugin '{}' not loaded, nothing to unload", name);
            return false;
        };

        tracing::info!("Unloading plugin: {}", name);
        if let Err(e) = instance.cleanup().await {
            tracing::error!("Cleanup of plugin '{}' failed: {}", name, e);
        }

        self.routes.remove_owner(name);
        state.load_order.retain(|n| n != name);
        state.statuses.insert(name.to_string(), PluginStatus::Disabled);
        true
    }

    /// Unload every loaded plugin in registration order
    ///
    /// Returns the number of plugins unloaded; a second call returns 0.
    pub async fn cleanup_all(&self) -> usize {
        let mut state = self.state.lock().await;
        let order = state.load_order.clone();
        tracing::info!("Cleaning up {} plugins", order.len());

        let mut unloaded = 0;
        for name in &order {
            if self.unload_locked(&mut state, name).await {
                unloaded += 1;
            }
        }
        unloaded
    }

    /// Copy of every known plugin's status, sorted by name
    pub async fn status_snapshot(&self) -> BTreeMap<String, PluginStatus> {
        let state = self.state.lock().await;
        state
            .statuses
            .iter()
            .map(|(name, status)| (name.clone(), *status))
            .collect()
    }

    /// Status of one plugin; `Unknown` if never attempted
    pub async fn status(&self, name: &str) -> PluginStatus {
        let state = self.state.lock().await;
        state.statuses.get(name).copied().unwrap_or(PluginStatus::Unknown)
    }

    /// Why a plugin is `Failed`
    pub async fn failure(&self, name: &str) -> Option<LoadError> {
        self.state.lock().await.failures.get(name).cloned()
    }

    pub async fn manifest(&self, name: &str) -> Option<PluginManifest> {
        self.state.lock().await.manifests.get(name).cloned()
    }

    /// Loaded plugin names in registration order
    pub async fn loaded_plugins(&self) -> Vec<String> {
        self.state.lock().await.load_order.clone()
    }

    pub async fn is_loaded(&self, name: &str) -> bool {
        self.state.lock().await.instances.contains_key(name)
    }
}

impl Drop for PluginManager {
    fn drop(&mut self) {
        let state = self.state.get_mut();
        if !state.instances.is_empty() {
            tracing::warn!(
                "PluginManager dropped with {} plugins still loaded: {:?}",
                state.instances.len(),
                state.load_order
            );
        }
    }
}
