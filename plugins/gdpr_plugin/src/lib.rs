//! GDPR compliance plugin
//!
//! Keeps a ledger of per-purpose user consent and of data-subject requests
//! (export and erasure). Works with the `database` capability only; the
//! compliance endpoints are registered only on hosts that also grant
//! `network`.

use serde::{Deserialize, Serialize};
use warden_sdk::prelude::*;

/// Purposes a user can give or withdraw consent for
pub const CONSENT_PURPOSES: &[&str] = &["essential", "analytics", "marketing"];

/// One user's decision for one purpose
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsentRecord {
    pub user_id: u64,
    pub purpose: String,
    pub accepted: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestKind {
    Export,
    Erasure,
}

/// A data-subject request waiting for (or done with) processing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubjectRequest {
    pub user_id: u64,
    pub kind: RequestKind,
    pub completed: bool,
}

/// Counters shown on the compliance dashboard
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComplianceMetrics {
    pub active_consents: usize,
    pub withdrawn_consents: usize,
    pub pending_requests: usize,
    pub completed_requests: usize,
}

/// In-memory consent and request ledger
#[derive(Debug, Default)]
pub struct ConsentLedger {
    consents: Vec<ConsentRecord>,
    requests: Vec<SubjectRequest>,
}

impl ConsentLedger {
    /// Record or update a consent decision
    pub fn record(&mut self, user_id: u64, purpose: &str, accepted: bool) -> Result<(), PluginError> {
        if !CONSENT_PURPOSES.contains(&purpose) {
            return Err(PluginError::Other(format!("unknown consent purpose '{}'", purpose)));
        }

        match self
            .consents
            .iter_mut()
            .find(|c| c.user_id == user_id && c.purpose == purpose)
        {
            Some(existing) => existing.accepted = accepted,
            None => self.consents.push(ConsentRecord {
                user_id,
                purpose: purpose.to_string(),
                accepted,
            }),
        }
        Ok(())
    }

    pub fn has_consent(&self, user_id: u64, purpose: &str) -> bool {
        self.consents
            .iter()
            .any(|c| c.user_id == user_id && c.purpose == purpose && c.accepted)
    }

    /// Queue an export or erasure request
    pub fn request(&mut self, user_id: u64, kind: RequestKind) {
        self.requests.push(SubjectRequest {
            user_id,
            kind,
            completed: false,
        });
    }

    /// Complete every pending request and return how many were processed
    ///
    /// Erasure removes all consent records of the user.
    pub fn process_pending(&mut self) -> usize {
        let mut erased = Vec::new();
        let mut processed = 0;

        for request in self.requests.iter_mut().filter(|r| !r.completed) {
            if request.kind == RequestKind::Erasure {
                erased.push(request.user_id);
            }
            request.completed = true;
            processed += 1;
        }

        self.consents.retain(|c| !erased.contains(&c.user_id));
        processed
    }

    /// Everything held about one user, as JSON
    pub fn export(&self, user_id: u64) -> serde_json::Value {
        let consents: Vec<&ConsentRecord> = self
            .consents
            .iter()
            .filter(|c| c.user_id == user_id)
            .collect();
        let requests: Vec<&SubjectRequest> = self
            .requests
            .iter()
            .filter(|r| r.user_id == user_id)
            .collect();

        serde_json::json!({
            "user_id": user_id,
            "consents": consents,
            "requests": requests,
        })
    }

    pub fn metrics(&self) -> ComplianceMetrics {
        let active = self.consents.iter().filter(|c| c.accepted).count();
        let pending = self.requests.iter().filter(|r| !r.completed).count();

        ComplianceMetrics {
            active_consents: active,
            withdrawn_consents: self.consents.len() - active,
            pending_requests: pending,
            completed_requests: self.requests.len() - pending,
        }
    }
}

/// GDPR plugin instance
pub struct GdprPlugin {
    ctx: PluginContext,
    ledger: ConsentLedger,
    ready: bool,
}

impl GdprPlugin {
    pub fn new(ctx: PluginContext) -> Self {
        Self {
            ctx,
            ledger: ConsentLedger::default(),
            ready: false,
        }
    }

    pub fn is_ready(&self) -> bool {
        self.ready
    }

    pub fn ledger(&self) -> &ConsentLedger {
        &self.ledger
    }

    pub fn ledger_mut(&mut self) -> &mut ConsentLedger {
        &mut self.ledger
    }

    /// Endpoints exposed when the host grants `network`
    pub fn routes(&self) -> Vec<Route> {
        let owner = self.ctx.name.as_str();
        vec![
            Route::new(HttpMethod::Get, "/api/gdpr/metrics", owner)
                .with_summary("Compliance counters"),
            Route::new(HttpMethod::Post, "/api/gdpr/consent", owner)
                .with_summary("Record a consent decision"),
            Route::new(HttpMethod::Post, "/api/gdpr/requests", owner)
                .with_summary("File an export or erasure request"),
        ]
    }
}

#[async_trait]
impl Plugin for GdprPlugin {
    fn required_permissions(&self) -> PermissionSet {
        PermissionSet::from([Permission::Database])
    }

    async fn initialize(&mut self) -> Result<(), PluginError> {
        self.ctx.require(Permission::Database)?;
        self.ready = true;
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
        self.ledger = ConsentLedger::default();
        self.ready = false;
        Ok(())
    }
}

/// Registry factory
pub fn create(ctx: PluginContext) -> PluginFuture {
    Box::pin(async move { Ok(Box::new(GdprPlugin::new(ctx)) as Box<dyn Plugin>) })
}
