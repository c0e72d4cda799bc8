//! MCP Gatekeeper Library
//!
//! Access control and session telemetry for tool-calling clients: scoped API
//! keys, live session tracking, and bounded audit/usage logs with analytics.
//!
//! [`Gatekeeper`] is the transport-agnostic surface. It is cheap to clone and
//! is meant to be shared by whatever request layer sits in front of it.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use uuid::Uuid;

pub mod config;
pub mod db;
pub mod models;
pub mod services;
pub mod utils;

pub use config::AppConfig;
pub use db::{CredentialStore, DbPool, MemoryStore, SqliteStore};
pub use utils::{GatekeeperError, GatekeeperResult};

use models::{
    ActiveSession, ApiKey, AuditLogPage, AuditLogQuery, AuthDecision, IssueKeyRequest, IssuedKey,
    NewAuditEntry, RegisterSessionRequest, UsageAnalytics,
};
use services::{
    AnalyticsAggregator, AnalyticsExport, AuditExport, ExportFormat, KeyAuthority,
    KeyRateLimiter, SessionRegistry, SessionSweeper, TelemetryRecorder, ToolCallReport,
};

/// Gatekeeper state shared across callers
#[derive(Clone)]
pub struct Gatekeeper {
    /// Injected credential store
    store: Arc<dyn CredentialStore>,
    keys: Arc<KeyAuthority>,
    sessions: Arc<SessionRegistry>,
    telemetry: Arc<TelemetryRecorder>,
    analytics: Arc<AnalyticsAggregator>,
    rate_limiter: KeyRateLimiter,
    sweeper: SessionSweeper,
}

impl Gatekeeper {
    pub fn new(store: Arc<dyn CredentialStore>, config: &AppConfig) -> Self {
        let sessions = Arc::new(SessionRegistry::new(store.clone()));
        Self {
            keys: Arc::new(KeyAuthority::new(store.clone(), config.keys.clone())),
            telemetry: Arc::new(TelemetryRecorder::new(
                store.clone(),
                config.telemetry.clone(),
            )),
            analytics: Arc::new(AnalyticsAggregator::new(store.clone())),
            rate_limiter: KeyRateLimiter::new(),
            sweeper: SessionSweeper::new(sessions.clone(), &config.sessions),
            sessions,
            store,
        }
    }

    /// Open the configured store and build a gatekeeper over it
    pub async fn from_config(config: &AppConfig) -> anyhow::Result<Self> {
        let store = db::open_store(config).await?;
        Ok(Self::new(store, config))
    }

    pub fn store(&self) -> &Arc<dyn CredentialStore> {
        &self.store
    }

    pub fn sweeper(&self) -> &SessionSweeper {
        &self.sweeper
    }

    // Key Authority

    pub async fn issue_key(&self, request: IssueKeyRequest) -> GatekeeperResult<IssuedKey> {
        self.keys.issue(request).await
    }

    pub async fn rotate_key(&self, key_id: Uuid) -> GatekeeperResult<IssuedKey> {
        let issued = self.keys.rotate(key_id).await?;
        self.rate_limiter.forget(key_id).await;
        Ok(issued)
    }

    pub async fn revoke_key(&self, key_id: Uuid) -> GatekeeperResult<()> {
        self.keys.revoke(key_id).await?;
        self.rate_limiter.forget(key_id).await;
        Ok(())
    }

    pub async fn validate_key(
        &self,
        secret: &str,
        required_scope: &str,
    ) -> GatekeeperResult<AuthDecision> {
        self.keys.validate(secret, required_scope).await
    }

    pub async fn list_keys(&self, organization_id: Uuid) -> GatekeeperResult<Vec<ApiKey>> {
        self.keys.list(organization_id).await
    }

    /// Consume one request from the decision's key quotas
    pub async fn check_rate_limit(&self, decision: &AuthDecision) -> GatekeeperResult<()> {
        self.rate_limiter.check(decision).await
    }

    // Session Registry

    pub async fn register_session(&self, request: RegisterSessionRequest) -> GatekeeperResult<Uuid> {
        self.sessions.register(request).await
    }

    pub async fn heartbeat_session(&self, session_id: Uuid) -> GatekeeperResult<()> {
        self.sessions.heartbeat(session_id).await
    }

    pub async fn unregister_session(&self, session_id: Uuid) -> GatekeeperResult<()> {
        self.sessions.unregister(session_id).await
    }

    pub async fn list_active_sessions(
        &self,
        organization_id: Uuid,
    ) -> GatekeeperResult<Vec<ActiveSession>> {
        self.sessions.list(organization_id).await
    }

    pub async fn sweep_stale_sessions(
        &self,
        threshold: std::time::Duration,
    ) -> GatekeeperResult<u64> {
        self.sessions.sweep_stale(threshold).await
    }

    // Telemetry

    pub async fn record_tool_call(&self, report: ToolCallReport) {
        self.telemetry.record_tool_call(report).await
    }

    pub async fn record_audit_entry(&self, entry: NewAuditEntry) {
        self.telemetry.record_audit(entry).await
    }

    pub async fn query_audit_log(
        &self,
        organization_id: Uuid,
        query: AuditLogQuery,
    ) -> GatekeeperResult<AuditLogPage> {
        self.telemetry.query_audit(organization_id, query).await
    }

    pub async fn get_analytics(
        &self,
        organization_id: Uuid,
        since: Option<DateTime<Utc>>,
    ) -> GatekeeperResult<UsageAnalytics> {
        self.analytics.usage(organization_id, since).await
    }

    pub async fn export_analytics(
        &self,
        organization_id: Uuid,
        since: Option<DateTime<Utc>>,
        format: ExportFormat,
    ) -> GatekeeperResult<Vec<u8>> {
        let analytics = self.get_analytics(organization_id, since).await?;
        AnalyticsExport::new(&analytics).render(format)
    }

    pub async fn export_audit_log(
        &self,
        organization_id: Uuid,
        query: AuditLogQuery,
        format: ExportFormat,
    ) -> GatekeeperResult<Vec<u8>> {
        let page = self.query_audit_log(organization_id, query).await?;
        AuditExport::new(&page.entries).render(format)
    }

    // Lifecycle

    /// Start the background stale-session sweep. Returns `false` if already running.
    pub async fn start(&self) -> bool {
        self.sweeper.start().await
    }

    pub async fn stop(&self) {
        self.sweeper.stop().await
    }
}
