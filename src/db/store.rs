//! Credential store contract consumed by the gatekeeper core

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::models::{
    ApiKey, AuditLogEntry, AuditLogPage, AuditLogQuery, Session, ToolCallRecord,
};

/// Durable keyed repository for keys, sessions and telemetry.
///
/// Each operation is atomic with respect to the key, session or organization
/// it touches. In particular `append_tool_call` and `append_audit_entry` insert
/// and trim as one step, and `touch_session` never resurrects a session that a
/// concurrent `delete_stale_sessions` removed.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Insert a new key. Fails if another non-revoked key has the same hash.
    async fn create_key(&self, key: &ApiKey) -> Result<()>;

    async fn get_key_by_id(&self, id: Uuid) -> Result<Option<ApiKey>>;

    /// Look up a non-revoked key by its hash.
    async fn get_key_by_hash(&self, key_hash: &str) -> Result<Option<ApiKey>>;

    /// All keys of an organization, newest first, revoked ones included.
    async fn list_keys_by_org(&self, organization_id: Uuid) -> Result<Vec<ApiKey>>;

    /// Stamp `last_used_at`. Returns false if the key does not exist.
    async fn touch_key(&self, id: Uuid, used_at: DateTime<Utc>) -> Result<bool>;

    /// Returns true only if this call moved the key to revoked.
    async fn revoke_key(&self, id: Uuid, revoked_at: DateTime<Utc>) -> Result<bool>;

    /// Revoke `old_id` and insert `new_key` as one step. Returns false, and
    /// inserts nothing, if `old_id` is missing or already revoked.
    async fn replace_key(
        &self,
        old_id: Uuid,
        new_key: &ApiKey,
        revoked_at: DateTime<Utc>,
    ) -> Result<bool>;

    async fn create_session(&self, session: &Session) -> Result<()>;

    async fn get_session(&self, id: Uuid) -> Result<Option<Session>>;

    /// Set `last_activity_at`. Returns false if the session does not exist.
    async fn touch_session(&self, id: Uuid, at: DateTime<Utc>) -> Result<bool>;

    /// Returns false if the session did not exist.
    async fn delete_session(&self, id: Uuid) -> Result<bool>;

    /// Remove sessions whose last activity is strictly before `cutoff`.
    async fn delete_stale_sessions(&self, cutoff: DateTime<Utc>) -> Result<u64>;

    async fn list_sessions(&self, organization_id: Uuid) -> Result<Vec<Session>>;

    /// Append then keep only the `cap` most recent calls of the organization.
    async fn append_tool_call(&self, record: &ToolCallRecord, cap: usize) -> Result<()>;

    /// Calls at or after `since`, oldest first.
    async fn list_tool_calls(
        &self,
        organization_id: Uuid,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<ToolCallRecord>>;

    /// Append then keep only the `cap` most recent entries of the organization.
    async fn append_audit_entry(&self, entry: &AuditLogEntry, cap: usize) -> Result<()>;

    /// Filtered, newest-first page with the pre-pagination total.
    async fn query_audit_entries(
        &self,
        organization_id: Uuid,
        query: &AuditLogQuery,
    ) -> Result<AuditLogPage>;
}
