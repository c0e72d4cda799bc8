//! Session (connection) models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Client identification supplied at registration
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ClientInfo {
    pub name: Option<String>,
    pub version: Option<String>,
    pub user_agent: Option<String>,
}

/// A live use of one API key by one client
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Session {
    pub id: Uuid,
    pub api_key_id: Uuid,
    pub api_key_name: String,
    pub organization_id: Uuid,
    pub connected_at: DateTime<Utc>,
    pub last_activity_at: DateTime<Utc>,
    pub client_info: Option<ClientInfo>,
    pub ip_address: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RegisterSessionRequest {
    pub api_key_id: Uuid,
    pub api_key_name: String,
    pub organization_id: Uuid,
    pub client_info: Option<ClientInfo>,
    pub ip_address: Option<String>,
}

/// Session annotated at query time for display; durations are not persisted.
#[derive(Debug, Clone, Serialize)]
pub struct ActiveSession {
    #[serde(flatten)]
    pub session: Session,
    pub connected_duration_ms: i64,
    pub idle_ms: i64,
}

impl ActiveSession {
    pub fn annotate(session: Session, now: DateTime<Utc>) -> Self {
        let connected_duration_ms = (now - session.connected_at).num_milliseconds().max(0);
        let idle_ms = (now - session.last_activity_at).num_milliseconds().max(0);
        Self {
            session,
            connected_duration_ms,
            idle_ms,
        }
    }
}
