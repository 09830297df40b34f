//! Security plugin
//!
//! Audit logging and per-client request rate limiting. Needs `database` for
//! the audit trail and `network` to expose its endpoints through the host.

use serde::{Deserialize, Serialize};
use warden_sdk::collections::HashMap;
use warden_sdk::prelude::*;

/// Requests allowed per client per window
pub const DEFAULT_REQUESTS_PER_WINDOW: u32 = 60;

/// Window length in seconds
pub const DEFAULT_WINDOW_SECS: u64 = 60;

/// One audited action
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub actor: String,
    pub action: String,
    pub at: u64,
}

/// Append-only audit trail
#[derive(Debug, Default)]
pub struct AuditLog {
    entries: Vec<AuditEntry>,
}

impl AuditLog {
    pub fn append(&mut self, actor: impl Into<String>, action: impl Into<String>, at: u64) {
        self.entries.push(AuditEntry {
            actor: actor.into(),
            action: action.into(),
            at,
        });
    }

    /// Most recent entries first, at most `limit`
    pub fn recent(&self, limit: usize) -> Vec<&AuditEntry> {
        self.entries.iter().rev().take(limit).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Fixed-window rate limiter keyed by client id
#[derive(Debug)]
pub struct RateLimiter {
    limit: u32,
    window_secs: u64,
    windows: HashMap<String, (u64, u32)>,
}

impl RateLimiter {
    pub fn new(limit: u32, window_secs: u64) -> Self {
        Self {
            limit,
            window_secs: window_secs.max(1),
            windows: HashMap::new(),
        }
    }

    /// Count one request at `now` (seconds); false once the client is over the limit
    pub fn check(&mut self, client: &str, now: u64) -> bool {
        let window = now / self.window_secs;
        let slot = self.windows.entry(client.to_string()).or_insert((window, 0));

        if slot.0 != window {
            *slot = (window, 0);
        }
        if slot.1 >= self.limit {
            return false;
        }
        slot.1 += 1;
        true
    }

    /// Requests left for `client` in the window containing `now`
    pub fn remaining(&self, client: &str, now: u64) -> u32 {
        let window = now / self.window_secs;
        match self.windows.get(client) {
            Some((w, used)) if *w == window => self.limit.saturating_sub(*used),
            _ => self.limit,
        }
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(DEFAULT_REQUESTS_PER_WINDOW, DEFAULT_WINDOW_SECS)
    }
}

/// Security plugin instance
pub struct SecurityPlugin {
    ctx: PluginContext,
    audit: AuditLog,
    limiter: RateLimiter,
}

impl SecurityPlugin {
    pub fn new(ctx: PluginContext) -> Self {
        Self {
            ctx,
            audit: AuditLog::default(),
            limiter: RateLimiter::default(),
        }
    }

    pub fn audit(&self) -> &AuditLog {
        &self.audit
    }

    /// Rate-limit a request and audit rejections
    pub fn admit(&mut self, client: &str, now: u64) -> bool {
        let allowed = self.limiter.check(client, now);
        if !allowed {
            self.audit.append(client, "rate_limited", now);
        }
        allowed
    }

    pub fn routes(&self) -> Vec<Route> {
        let owner = self.ctx.name.as_str();
        vec![
            Route::new(HttpMethod::Get, "/api/security/health", owner)
                .with_summary("Security plugin health check"),
            Route::new(HttpMethod::Get, "/api/security/audit", owner)
                .with_summary("Recent audit entries"),
            Route::new(HttpMethod::Post, "/api/security/rate-limit/check", owner)
                .with_summary("Check a client against the rate limit"),
        ]
    }
}

#[async_trait]
impl Plugin for SecurityPlugin {
    fn required_permissions(&self) -> PermissionSet {
        PermissionSet::from([Permission::Database, Permission::Network])
    }

    async fn initialize(&mut self) -> Result<(), PluginError> {
        self.ctx.require(Permission::Database)?;
        self.audit.append(self.ctx.name.clone(), "initialized", 0);
        Ok(())
    }

    async fn register_routes(&mut self) -> Result<(), PluginError> {
        self.ctx.require(Permission::Network)?;
        for route in self.routes() {
            self.ctx.host.register_route(route)?;
        }
        Ok(())
    }

    async fn cleanup(&mut self) -> Result<(), PluginError> {
        self.limiter = RateLimiter::default();
        Ok(())
    }
}

/// Registry factory
pub fn create(ctx: PluginContext) -> PluginFuture {
    Box::pin(async move { Ok(Box::new(SecurityPlugin::new(ctx)) as Box<dyn Plugin>) })
}
