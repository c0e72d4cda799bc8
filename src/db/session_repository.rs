//! Session repository

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use uuid::Uuid;

use super::{format_db_timestamp, parse_db_timestamp, parse_db_uuid};
use crate::models::Session;

#[derive(Debug, sqlx::FromRow)]
struct SessionRow {
    id: String,
    api_key_id: String,
    api_key_name: String,
    organization_id: String,
    connected_at: String,
    last_activity_at: String,
    client_info: Option<String>,
    ip_address: Option<String>,
}

pub struct SessionRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> SessionRepository<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn insert(&self, session: &Session) -> Result<()> {
        let client_info = session
            .client_info
            .as_ref()
            .map(serde_json::to_string)
            .transpose()
            .context("Failed to encode client info")?;

        sqlx::query(
            r#"
            INSERT INTO sessions (id, api_key_id, api_key_name, organization_id,
                                  connected_at, last_activity_at, client_info, ip_address)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(session.id.to_string())
        .bind(session.api_key_id.to_string())
        .bind(&session.api_key_name)
        .bind(session.organization_id.to_string())
        .bind(format_db_timestamp(session.connected_at))
        .bind(format_db_timestamp(session.last_activity_at))
        .bind(client_info)
        .bind(session.ip_address.as_deref())
        .execute(self.pool)
        .await
        .context("Failed to create session")?;

        Ok(())
    }

    pub async fn get_by_id(&self, id: Uuid) -> Result<Option<Session>> {
        let row = sqlx::query_as::<_, SessionRow>(
            r#"
            SELECT id, api_key_id, api_key_name, organization_id, connected_at,
                   last_activity_at, client_info, ip_address
            FROM sessions
            WHERE id = ?
            "#,
        )
        .bind(id.to_string())
        .fetch_optional(self.pool)
        .await
        .context("Failed to get session")?;

        row.map(row_to_session).transpose()
    }

    /// Single conditional update; a session already swept stays gone.
    pub async fn touch(&self, id: Uuid, at: DateTime<Utc>) -> Result<bool> {
        let at = format_db_timestamp(at);
        let result = sqlx::query(
            r#"
            UPDATE sessions
            SET last_activity_at = CASE WHEN last_activity_at < ? THEN ? ELSE last_activity_at END
            WHERE id = ?
            "#,
        )
        .bind(&at)
        .bind(&at)
        .bind(id.to_string())
        .execute(self.pool)
        .await
        .context("Failed to touch session")?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn delete(&self, id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM sessions WHERE id = ?")
            .bind(id.to_string())
            .execute(self.pool)
            .await
            .context("Failed to delete session")?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn delete_idle_before(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        let result = sqlx::query("DELETE FROM sessions WHERE last_activity_at < ?")
            .bind(format_db_timestamp(cutoff))
            .execute(self.pool)
            .await
            .context("Failed to delete stale sessions")?;

        Ok(result.rows_affected())
    }

    pub async fn list_for_org(&self, organization_id: Uuid) -> Result<Vec<Session>> {
        let rows = sqlx::query_as::<_, SessionRow>(
            r#"
            SELECT id, api_key_id, api_key_name, organization_id, connected_at,
                   last_activity_at, client_info, ip_address
            FROM sessions
            WHERE organization_id = ?
            ORDER BY connected_at DESC
            "#,
        )
        .bind(organization_id.to_string())
        .fetch_all(self.pool)
        .await
        .context("Failed to list sessions")?;

        rows.into_iter().map(row_to_session).collect()
    }
}

fn row_to_session(row: SessionRow) -> Result<Session> {
    Ok(Session {
        id: parse_db_uuid(&row.id, "session id")?,
        api_key_id: parse_db_uuid(&row.api_key_id, "api key id")?,
        api_key_name: row.api_key_name,
        organization_id: parse_db_uuid(&row.organization_id, "organization id")?,
        connected_at: parse_db_timestamp(&row.connected_at)?,
        last_activity_at: parse_db_timestamp(&row.last_activity_at)?,
        client_info: row
            .client_info
            .as_deref()
            .and_then(|s| serde_json::from_str(s).ok()),
        ip_address: row.ip_address,
    })
}
