//! Session Registry
//!
//! Sessions move `registered -> (heartbeat)* -> {unregistered | swept}` and
//! are never resurrected. Heartbeat and sweep are each a single store
//! operation, so a sweep cannot evict a session between a heartbeat's check
//! and its write.

use std::sync::Arc;

use chrono::{Duration, Utc};
use tracing::{debug, info, instrument};
use uuid::Uuid;

use crate::db::CredentialStore;
use crate::models::{ActiveSession, RegisterSessionRequest, Session};
use crate::utils::{GatekeeperError, GatekeeperResult};

pub struct SessionRegistry {
    store: Arc<dyn CredentialStore>,
}

impl SessionRegistry {
    pub fn new(store: Arc<dyn CredentialStore>) -> Self {
        Self { store }
    }

    #[instrument(skip(self, request), fields(key_id = %request.api_key_id, org_id = %request.organization_id))]
    pub async fn register(&self, request: RegisterSessionRequest) -> GatekeeperResult<Uuid> {
        let now = Utc::now();
        let session = Session {
            id: Uuid::new_v4(),
            api_key_id: request.api_key_id,
            api_key_name: request.api_key_name,
            organization_id: request.organization_id,
            connected_at: now,
            last_activity_at: now,
            client_info: request.client_info,
            ip_address: request.ip_address,
        };

        self.store.create_session(&session).await?;
        info!(session_id = %session.id, "Session registered");
        Ok(session.id)
    }

    /// Extend a session; `NotFound` once it has been removed or swept
    #[instrument(skip(self), fields(session_id = %session_id))]
    pub async fn heartbeat(&self, session_id: Uuid) -> GatekeeperResult<()> {
        if self.store.touch_session(session_id, Utc::now()).await? {
            Ok(())
        } else {
            debug!("Heartbeat for unknown session");
            Err(GatekeeperError::NotFound("Session not found".to_string()))
        }
    }

    #[instrument(skip(self), fields(session_id = %session_id))]
    pub async fn unregister(&self, session_id: Uuid) -> GatekeeperResult<()> {
        if self.store.delete_session(session_id).await? {
            info!("Session unregistered");
        }
        Ok(())
    }

    pub async fn get(&self, session_id: Uuid) -> GatekeeperResult<Option<Session>> {
        Ok(self.store.get_session(session_id).await?)
    }

    /// Remove sessions idle strictly longer than `threshold`
    pub async fn sweep_stale(&self, threshold: std::time::Duration) -> GatekeeperResult<u64> {
        let threshold = Duration::from_std(threshold)
            .map_err(|e| GatekeeperError::InvalidInput(format!("Invalid stale threshold: {}", e)))?;
        let cutoff = Utc::now().checked_sub_signed(threshold).ok_or_else(|| {
            GatekeeperError::InvalidInput("Stale threshold is out of range".to_string())
        })?;

        let removed = self.store.delete_stale_sessions(cutoff).await?;
        if removed > 0 {
            info!(removed = removed, "Swept stale sessions");
        } else {
            debug!("No stale sessions");
        }
        Ok(removed)
    }

    /// Sessions for an organization, newest connection first
    pub async fn list(&self, organization_id: Uuid) -> GatekeeperResult<Vec<ActiveSession>> {
        let mut sessions = self.store.list_sessions(organization_id).await?;
        sessions.sort_by(|a, b| b.connected_at.cmp(&a.connected_at));

        let now = Utc::now();
        Ok(sessions
            .into_iter()
            .map(|s| ActiveSession::annotate(s, now))
            .collect())
    }
}
