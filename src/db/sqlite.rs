//! SQLite-backed credential store

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::{
    ApiKeyRepository, AuditRepository, CredentialStore, DbPool, SessionRepository,
    ToolCallRepository,
};
use crate::models::{
    ApiKey, AuditLogEntry, AuditLogPage, AuditLogQuery, Session, ToolCallRecord,
};

/// [`CredentialStore`] over a migrated SQLite pool
#[derive(Clone)]
pub struct SqliteStore {
    pool: DbPool,
}

impl SqliteStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }
}

#[async_trait]
impl CredentialStore for SqliteStore {
    async fn create_key(&self, key: &ApiKey) -> Result<()> {
        ApiKeyRepository::new(&self.pool).insert(key).await
    }

    async fn get_key_by_id(&self, id: Uuid) -> Result<Option<ApiKey>> {
        ApiKeyRepository::new(&self.pool).get_by_id(id).await
    }

    async fn get_key_by_hash(&self, key_hash: &str) -> Result<Option<ApiKey>> {
        ApiKeyRepository::new(&self.pool)
            .get_active_by_hash(key_hash)
            .await
    }

    async fn list_keys_by_org(&self, organization_id: Uuid) -> Result<Vec<ApiKey>> {
        ApiKeyRepository::new(&self.pool)
            .list_for_org(organization_id)
            .await
    }

    async fn touch_key(&self, id: Uuid, used_at: DateTime<Utc>) -> Result<bool> {
        ApiKeyRepository::new(&self.pool).touch(id, used_at).await
    }

    async fn revoke_key(&self, id: Uuid, revoked_at: DateTime<Utc>) -> Result<bool> {
        ApiKeyRepository::new(&self.pool).revoke(id, revoked_at).await
    }

    async fn replace_key(
        &self,
        old_id: Uuid,
        new_key: &ApiKey,
        revoked_at: DateTime<Utc>,
    ) -> Result<bool> {
        ApiKeyRepository::new(&self.pool)
            .replace(old_id, new_key, revoked_at)
            .await
    }

    async fn create_session(&self, session: &Session) -> Result<()> {
        SessionRepository::new(&self.pool).insert(session).await
    }

    async fn get_session(&self, id: Uuid) -> Result<Option<Session>> {
        SessionRepository::new(&self.pool).get_by_id(id).await
    }

    async fn touch_session(&self, id: Uuid, at: DateTime<Utc>) -> Result<bool> {
        SessionRepository::new(&self.pool).touch(id, at).await
    }

    async fn delete_session(&self, id: Uuid) -> Result<bool> {
        SessionRepository::new(&self.pool).delete(id).await
    }

    async fn delete_stale_sessions(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        SessionRepository::new(&self.pool)
            .delete_idle_before(cutoff)
            .await
    }

    async fn list_sessions(&self, organization_id: Uuid) -> Result<Vec<Session>> {
        SessionRepository::new(&self.pool)
            .list_for_org(organization_id)
            .await
    }

    async fn append_tool_call(&self, record: &ToolCallRecord, cap: usize) -> Result<()> {
        ToolCallRepository::new(&self.pool)
            .insert_with_cap(record, cap)
            .await
    }

    async fn list_tool_calls(
        &self,
        organization_id: Uuid,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<ToolCallRecord>> {
        ToolCallRepository::new(&self.pool)
            .list_for_org(organization_id, since)
            .await
    }

    async fn append_audit_entry(&self, entry: &AuditLogEntry, cap: usize) -> Result<()> {
        AuditRepository::new(&self.pool)
            .insert_with_cap(entry, cap)
            .await
    }

    async fn query_audit_entries(
        &self,
        organization_id: Uuid,
        query: &AuditLogQuery,
    ) -> Result<AuditLogPage> {
        AuditRepository::new(&self.pool)
            .query(organization_id, query)
            .await
    }
}
