//! Audit log repository

use anyhow::{Context, Result};
use sqlx::SqlitePool;
use uuid::Uuid;

use super::{format_db_timestamp, parse_db_timestamp, parse_db_uuid};
use crate::models::{AuditLogEntry, AuditLogPage, AuditLogQuery, ResponseType};

#[derive(Debug, sqlx::FromRow)]
struct AuditRow {
    id: String,
    timestamp: String,
    organization_id: String,
    api_key_id: String,
    api_key_name: String,
    connection_id: Option<String>,
    client_name: Option<String>,
    client_version: Option<String>,
    method: String,
    tool_name: Option<String>,
    resource_uri: Option<String>,
    request_params: Option<String>,
    response_type: String,
    response_error_code: Option<i64>,
    response_error_message: Option<String>,
    response_data_preview: Option<String>,
    duration_ms: Option<i64>,
    ip_address: Option<String>,
    user_agent: Option<String>,
}

pub struct AuditRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> AuditRepository<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert and trim the organization to `cap` rows in one transaction
    pub async fn insert_with_cap(&self, entry: &AuditLogEntry, cap: usize) -> Result<()> {
        let org_id = entry.organization_id.to_string();
        let request_params = entry.request_params.as_ref().map(|p| p.to_string());
        let mut tx = self.pool.begin().await.context("Failed to begin transaction")?;

        sqlx::query(
            r#"
            INSERT INTO audit_log (id, timestamp, organization_id, api_key_id, api_key_name,
                                   connection_id, client_name, client_version, method, tool_name,
                                   resource_uri, request_params, response_type, response_error_code,
                                   response_error_message, response_data_preview, duration_ms,
                                   ip_address, user_agent)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(entry.id.to_string())
        .bind(format_db_timestamp(entry.timestamp))
        .bind(&org_id)
        .bind(entry.api_key_id.to_string())
        .bind(&entry.api_key_name)
        .bind(entry.connection_id.map(|c| c.to_string()))
        .bind(entry.client_name.as_deref())
        .bind(entry.client_version.as_deref())
        .bind(&entry.method)
        .bind(entry.tool_name.as_deref())
        .bind(entry.resource_uri.as_deref())
        .bind(request_params)
        .bind(entry.response_type.as_str())
        .bind(entry.response_error_code)
        .bind(entry.response_error_message.as_deref())
        .bind(entry.response_data_preview.as_deref())
        .bind(entry.duration_ms.map(|d| i64::try_from(d).unwrap_or(i64::MAX)))
        .bind(entry.ip_address.as_deref())
        .bind(entry.user_agent.as_deref())
        .execute(&mut *tx)
        .await
        .context("Failed to insert audit log entry")?;

        sqlx::query(
            r#"
            DELETE FROM audit_log
            WHERE organization_id = ?
              AND seq NOT IN (
                SELECT seq FROM audit_log
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
        .context("Failed to trim audit log")?;

        tx.commit().await.context("Failed to commit audit log entry")?;
        Ok(())
    }

    pub async fn query(&self, organization_id: Uuid, query: &AuditLogQuery) -> Result<AuditLogPage> {
        let mut filter = String::from(" FROM audit_log WHERE organization_id = ?");
        if query.method.is_some() {
            filter.push_str(" AND method = ?");
        }
        if query.api_key_id.is_some() {
            filter.push_str(" AND api_key_id = ?");
        }
        if query.response_type.is_some() {
            filter.push_str(" AND response_type = ?");
        }
        if query.since.is_some() {
            filter.push_str(" AND timestamp >= ?");
        }
        if query.until.is_some() {
            filter.push_str(" AND timestamp <= ?");
        }

        let binds = FilterBinds::from_query(organization_id, query);

        // Count and page read inside one transaction so a concurrent trim is
        // observed by both or neither.
        let mut tx = self.pool.begin().await.context("Failed to begin transaction")?;

        let count_sql = format!("SELECT COUNT(*){}", filter);
        let mut count_q = sqlx::query_scalar::<_, i64>(&count_sql);
        for value in &binds.values {
            count_q = count_q.bind(value.as_str());
        }
        let total = count_q
            .fetch_one(&mut *tx)
            .await
            .context("Failed to count audit log entries")?;

        let page_sql = format!(
            "SELECT id, timestamp, organization_id, api_key_id, api_key_name, connection_id, \
             client_name, client_version, method, tool_name, resource_uri, request_params, \
             response_type, response_error_code, response_error_message, response_data_preview, \
             duration_ms, ip_address, user_agent{} ORDER BY timestamp DESC, seq DESC LIMIT ? OFFSET ?",
            filter
        );
        let mut page_q = sqlx::query_as::<_, AuditRow>(&page_sql);
        for value in &binds.values {
            page_q = page_q.bind(value.as_str());
        }
        let rows = page_q
            .bind(i64::from(query.limit.unwrap_or(AuditLogQuery::DEFAULT_LIMIT)))
            .bind(i64::from(query.offset.unwrap_or(0)))
            .fetch_all(&mut *tx)
            .await
            .context("Failed to list audit logs")?;

        tx.commit().await.context("Failed to finish audit log query")?;

        let entries = rows.into_iter().map(row_to_audit).collect::<Result<Vec<_>>>()?;
        Ok(AuditLogPage {
            entries,
            total: total.max(0) as u64,
        })
    }
}

/// Positional text binds shared by the count and page queries
struct FilterBinds {
    values: Vec<String>,
}

impl FilterBinds {
    fn from_query(organization_id: Uuid, query: &AuditLogQuery) -> Self {
        let mut values = vec![organization_id.to_string()];
        if let Some(ref method) = query.method {
            values.push(method.clone());
        }
        if let Some(api_key_id) = query.api_key_id {
            values.push(api_key_id.to_string());
        }
        if let Some(response_type) = query.response_type {
            values.push(response_type.as_str().to_string());
        }
        if let Some(since) = query.since {
            values.push(format_db_timestamp(since));
        }
        if let Some(until) = query.until {
            values.push(format_db_timestamp(until));
        }
        Self { values }
    }
}

fn row_to_audit(row: AuditRow) -> Result<AuditLogEntry> {
    Ok(AuditLogEntry {
        id: parse_db_uuid(&row.id, "audit entry id")?,
        timestamp: parse_db_timestamp(&row.timestamp)?,
        organization_id: parse_db_uuid(&row.organization_id, "organization id")?,
        api_key_id: parse_db_uuid(&row.api_key_id, "api key id")?,
        api_key_name: row.api_key_name,
        connection_id: row.connection_id.as_deref().and_then(|s| Uuid::parse_str(s).ok()),
        client_name: row.client_name,
        client_version: row.client_version,
        method: row.method,
        tool_name: row.tool_name,
        resource_uri: row.resource_uri,
        request_params: row.request_params.and_then(|s| serde_json::from_str(&s).ok()),
        response_type: ResponseType::from_str(&row.response_type)
            .with_context(|| format!("Invalid response type: {}", row.response_type))?,
        response_error_code: row.response_error_code,
        response_error_message: row.response_error_message,
        response_data_preview: row.response_data_preview,
        duration_ms: row.duration_ms.and_then(|d| u64::try_from(d).ok()),
        ip_address: row.ip_address,
        user_agent: row.user_agent,
    })
}
