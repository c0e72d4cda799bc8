//! Tool call repository

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use uuid::Uuid;

use super::{format_db_timestamp, parse_db_timestamp, parse_db_uuid};
use crate::models::ToolCallRecord;

#[derive(Debug, sqlx::FromRow)]
struct ToolCallRow {
    id: String,
    connection_id: String,
    organization_id: String,
    api_key_id: String,
    tool_name: String,
    timestamp: String,
    duration_ms: Option<i64>,
    success: bool,
    error: Option<String>,
}

pub struct ToolCallRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> ToolCallRepository<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert and trim the organization to `cap` rows in one transaction
    pub async fn insert_with_cap(&self, record: &ToolCallRecord, cap: usize) -> Result<()> {
        let org_id = record.organization_id.to_string();
        let mut tx = self.pool.begin().await.context("Failed to begin transaction")?;

        sqlx::query(
            r#"
            INSERT INTO tool_calls (id, connection_id, organization_id, api_key_id, tool_name,
                                    timestamp, duration_ms, success, error)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(record.id.to_string())
        .bind(record.connection_id.to_string())
        .bind(&org_id)
        .bind(record.api_key_id.to_string())
        .bind(&record.tool_name)
        .bind(format_db_timestamp(record.timestamp))
        .bind(record.duration_ms.map(|d| i64::try_from(d).unwrap_or(i64::MAX)))
        .bind(record.success)
        .bind(record.error.as_deref())
        .execute(&mut *tx)
        .await
        .context("Failed to insert tool call")?;

        sqlx::query(
            r#"
            DELETE FROM tool_calls
            WHERE organization_id = ?
              AND seq NOT IN (
                SELECT seq FROM tool_calls
                WHERE organization_id = ?
                ORDER BY timestamp DESC, seq DESC
                LIMIT ?
              )
            "#,
        )
        .bind(&org_id)
        .bind(&org_id)
        .bind(cap as i64)
        .execute(&mut *tx)
        .await
        .context("Failed to trim tool calls")?;

        tx.commit().await.context("Failed to commit tool call")?;
        Ok(())
    }

    pub async fn list_for_org(
        &self,
        organization_id: Uuid,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<ToolCallRecord>> {
        let mut sql = String::from(
            "SELECT id, connection_id, organization_id, api_key_id, tool_name, timestamp, duration_ms, success, error FROM tool_calls WHERE organization_id = ?",
        );
        if since.is_some() {
            sql.push_str(" AND timestamp >= ?");
        }
        sql.push_str(" ORDER BY timestamp ASC, seq ASC");

        let mut q = sqlx::query_as::<_, ToolCallRow>(&sql).bind(organization_id.to_string());
        if let Some(since) = since {
            q = q.bind(format_db_timestamp(since));
        }

        let rows = q
            .fetch_all(self.pool)
            .await
            .context("Failed to list tool calls")?;

        rows.into_iter().map(row_to_tool_call).collect()
    }
}

fn row_to_tool_call(row: ToolCallRow) -> Result<ToolCallRecord> {
    Ok(ToolCallRecord {
        id: parse_db_uuid(&row.id, "tool call id")?,
        connection_id: parse_db_uuid(&row.connection_id, "connection id")?,
        organization_id: parse_db_uuid(&row.organization_id, "organization id")?,
        api_key_id: parse_db_uuid(&row.api_key_id, "api key id")?,
        tool_name: row.tool_name,
        timestamp: parse_db_timestamp(&row.timestamp)?,
        duration_ms: row.duration_ms.and_then(|d| u64::try_from(d).ok()),
        success: row.success,
        error: row.error,
    })
}
