//! In-memory credential store
//!
//! Keys and sessions live in single maps. Telemetry is partitioned per
//! organization, each partition behind its own mutex, so append+trim and
//! snapshot reads for one organization never interleave while different
//! organizations proceed independently.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{bail, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

use super::CredentialStore;
use crate::models::{
    ApiKey, AuditLogEntry, AuditLogPage, AuditLogQuery, Session, ToolCallRecord,
};

trait Timestamped {
    fn timestamp(&self) -> DateTime<Utc>;
}

impl Timestamped for ToolCallRecord {
    fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}

impl Timestamped for AuditLogEntry {
    fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}

/// Per-organization bounded lists
struct OrgPartitions<T> {
    partitions: RwLock<HashMap<Uuid, Arc<Mutex<Vec<T>>>>>,
}

impl<T: Timestamped + Clone> OrgPartitions<T> {
    fn new() -> Self {
        Self {
            partitions: RwLock::new(HashMap::new()),
        }
    }

    async fn partition(&self, organization_id: Uuid) -> Arc<Mutex<Vec<T>>> {
        {
            let partitions = self.partitions.read().await;
            if let Some(partition) = partitions.get(&organization_id) {
                return partition.clone();
            }
        }

        let mut partitions = self.partitions.write().await;
        partitions
            .entry(organization_id)
            .or_insert_with(|| Arc::new(Mutex::new(Vec::new())))
            .clone()
    }

    async fn append(&self, organization_id: Uuid, item: T, cap: usize) {
        let partition = self.partition(organization_id).await;
        let mut items = partition.lock().await;
        items.push(item);
        if items.len() > cap {
            // Stable sort keeps insertion order among equal timestamps
            items.sort_by_key(|i| i.timestamp());
            let excess = items.len() - cap;
            items.drain(..excess);
        }
    }

    /// Consistent copy of one organization's list, oldest first
    async fn snapshot(&self, organization_id: Uuid) -> Vec<T> {
        let partition = {
            let partitions = self.partitions.read().await;
            match partitions.get(&organization_id) {
                Some(partition) => partition.clone(),
                None => return Vec::new(),
            }
        };
        let items = partition.lock().await;
        let mut snapshot = items.clone();
        snapshot.sort_by_key(|i| i.timestamp());
        snapshot
    }
}

/// Process-local [`CredentialStore`]
pub struct MemoryStore {
    keys: RwLock<HashMap<Uuid, ApiKey>>,
    sessions: RwLock<HashMap<Uuid, Session>>,
    tool_calls: OrgPartitions<ToolCallRecord>,
    audit_entries: OrgPartitions<AuditLogEntry>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            keys: RwLock::new(HashMap::new()),
            sessions: RwLock::new(HashMap::new()),
            tool_calls: OrgPartitions::new(),
            audit_entries: OrgPartitions::new(),
        }
    }
}

fn has_active_hash(keys: &HashMap<Uuid, ApiKey>, key_hash: &str) -> bool {
    keys.values()
        .any(|k| k.revoked_at.is_none() && k.key_hash == key_hash)
}

#[async_trait]
impl CredentialStore for MemoryStore {
    async fn create_key(&self, key: &ApiKey) -> Result<()> {
        let mut keys = self.keys.write().await;
        if keys.contains_key(&key.id) {
            bail!("API key {} already exists", key.id);
        }
        if has_active_hash(&keys, &key.key_hash) {
            bail!("An active API key with the same hash already exists");
        }
        keys.insert(key.id, key.clone());
        Ok(())
    }

    async fn get_key_by_id(&self, id: Uuid) -> Result<Option<ApiKey>> {
        Ok(self.keys.read().await.get(&id).cloned())
    }

    async fn get_key_by_hash(&self, key_hash: &str) -> Result<Option<ApiKey>> {
        let keys = self.keys.read().await;
        Ok(keys
            .values()
            .find(|k| k.revoked_at.is_none() && k.key_hash == key_hash)
            .cloned())
    }

    async fn list_keys_by_org(&self, organization_id: Uuid) -> Result<Vec<ApiKey>> {
        let keys = self.keys.read().await;
        let mut list: Vec<ApiKey> = keys
            .values()
            .filter(|k| k.organization_id == organization_id)
            .cloned()
            .collect();
        list.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(list)
    }

    async fn touch_key(&self, id: Uuid, used_at: DateTime<Utc>) -> Result<bool> {
        let mut keys = self.keys.write().await;
        match keys.get_mut(&id) {
            Some(key) => {
                key.last_used_at = Some(used_at);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn revoke_key(&self, id: Uuid, revoked_at: DateTime<Utc>) -> Result<bool> {
        let mut keys = self.keys.write().await;
        match keys.get_mut(&id) {
            Some(key) if key.revoked_at.is_none() => {
                key.revoked_at = Some(revoked_at);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn replace_key(
        &self,
        old_id: Uuid,
        new_key: &ApiKey,
        revoked_at: DateTime<Utc>,
    ) -> Result<bool> {
        let mut keys = self.keys.write().await;
        match keys.get(&old_id) {
            Some(old) if old.revoked_at.is_none() => {}
            _ => return Ok(false),
        }
        if keys.contains_key(&new_key.id) {
            bail!("API key {} already exists", new_key.id);
        }
        if has_active_hash(&keys, &new_key.key_hash) {
            bail!("An active API key with the same hash already exists");
        }

        if let Some(old) = keys.get_mut(&old_id) {
            old.revoked_at = Some(revoked_at);
        }
        keys.insert(new_key.id, new_key.clone());
        Ok(true)
    }

    async fn create_session(&self, session: &Session) -> Result<()> {
        let mut sessions = self.sessions.write().await;
        if sessions.contains_key(&session.id) {
            bail!("Session {} already exists", session.id);
        }
        sessions.insert(session.id, session.clone());
        Ok(())
    }

    async fn get_session(&self, id: Uuid) -> Result<Option<Session>> {
        Ok(self.sessions.read().await.get(&id).cloned())
    }

    async fn touch_session(&self, id: Uuid, at: DateTime<Utc>) -> Result<bool> {
        let mut sessions = self.sessions.write().await;
        match sessions.get_mut(&id) {
            Some(session) => {
                if at > session.last_activity_at {
                    session.last_activity_at = at;
                }
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_session(&self, id: Uuid) -> Result<bool> {
        Ok(self.sessions.write().await.remove(&id).is_some())
    }

    async fn delete_stale_sessions(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, s| s.last_activity_at >= cutoff);
        Ok((before - sessions.len()) as u64)
    }

    async fn list_sessions(&self, organization_id: Uuid) -> Result<Vec<Session>> {
        let sessions = self.sessions.read().await;
        Ok(sessions
            .values()
            .filter(|s| s.organization_id == organization_id)
            .cloned()
            .collect())
    }

    async fn append_tool_call(&self, record: &ToolCallRecord, cap: usize) -> Result<()> {
        self.tool_calls
            .append(record.organization_id, record.clone(), cap)
            .await;
        Ok(())
    }

    async fn list_tool_calls(
        &self,
        organization_id: Uuid,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<ToolCallRecord>> {
        let mut calls = self.tool_calls.snapshot(organization_id).await;
        if let Some(since) = since {
            calls.retain(|c| c.timestamp >= since);
        }
        Ok(calls)
    }

    async fn append_audit_entry(&self, entry: &AuditLogEntry, cap: usize) -> Result<()> {
        self.audit_entries
            .append(entry.organization_id, entry.clone(), cap)
            .await;
        Ok(())
    }

    async fn query_audit_entries(
        &self,
        organization_id: Uuid,
        query: &AuditLogQuery,
    ) -> Result<AuditLogPage> {
        let mut matching: Vec<AuditLogEntry> = self
            .audit_entries
            .snapshot(organization_id)
            .await
            .into_iter()
            .filter(|e| query.matches(e))
            .collect();
        matching.reverse();

        let total = matching.len() as u64;
        let offset = query.offset.unwrap_or(0) as usize;
        let limit = query.limit.unwrap_or(AuditLogQuery::DEFAULT_LIMIT) as usize;
        let entries = matching.into_iter().skip(offset).take(limit).collect();

        Ok(AuditLogPage { entries, total })
    }
}
