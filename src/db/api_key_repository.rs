//! API key repository

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use uuid::Uuid;

use super::{format_db_timestamp, parse_db_timestamp, parse_db_uuid};
use crate::models::ApiKey;

const API_KEY_COLUMNS: &str = "id, organization_id, name, key_hash, key_prefix, scopes, \
     last_used_at, expires_at, created_by, created_at, revoked_at, \
     rate_limit_requests, rate_limit_burst";

#[derive(Debug, sqlx::FromRow)]
struct ApiKeyRow {
    id: String,
    organization_id: String,
    name: String,
    key_hash: String,
    key_prefix: String,
    scopes: String,
    last_used_at: Option<String>,
    expires_at: Option<String>,
    created_by: String,
    created_at: String,
    revoked_at: Option<String>,
    rate_limit_requests: Option<i64>,
    rate_limit_burst: Option<i64>,
}

pub struct ApiKeyRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> ApiKeyRepository<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn insert(&self, key: &ApiKey) -> Result<()> {
        insert_key(self.pool, key).await
    }

    pub async fn get_by_id(&self, id: Uuid) -> Result<Option<ApiKey>> {
        let sql = format!("SELECT {} FROM api_keys WHERE id = ?", API_KEY_COLUMNS);
        let row = sqlx::query_as::<_, ApiKeyRow>(&sql)
            .bind(id.to_string())
            .fetch_optional(self.pool)
            .await
            .context("Failed to get api key")?;

        row.map(row_to_api_key).transpose()
    }

    pub async fn get_active_by_hash(&self, key_hash: &str) -> Result<Option<ApiKey>> {
        let sql = format!(
            "SELECT {} FROM api_keys WHERE key_hash = ? AND revoked_at IS NULL",
            API_KEY_COLUMNS
        );
        let row = sqlx::query_as::<_, ApiKeyRow>(&sql)
            .bind(key_hash)
            .fetch_optional(self.pool)
            .await
            .context("Failed to look up api key by hash")?;

        row.map(row_to_api_key).transpose()
    }

    pub async fn list_for_org(&self, organization_id: Uuid) -> Result<Vec<ApiKey>> {
        let sql = format!(
            "SELECT {} FROM api_keys WHERE organization_id = ? ORDER BY created_at DESC",
            API_KEY_COLUMNS
        );
        let rows = sqlx::query_as::<_, ApiKeyRow>(&sql)
            .bind(organization_id.to_string())
            .fetch_all(self.pool)
            .await
            .context("Failed to list api keys")?;

        rows.into_iter().map(row_to_api_key).collect()
    }

    pub async fn touch(&self, id: Uuid, used_at: DateTime<Utc>) -> Result<bool> {
        let result = sqlx::query("UPDATE api_keys SET last_used_at = ? WHERE id = ?")
            .bind(format_db_timestamp(used_at))
            .bind(id.to_string())
            .execute(self.pool)
            .await
            .context("Failed to update api key last_used_at")?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn revoke(&self, id: Uuid, revoked_at: DateTime<Utc>) -> Result<bool> {
        let result =
            sqlx::query("UPDATE api_keys SET revoked_at = ? WHERE id = ? AND revoked_at IS NULL")
                .bind(format_db_timestamp(revoked_at))
                .bind(id.to_string())
                .execute(self.pool)
                .await
                .context("Failed to revoke api key")?;

        Ok(result.rows_affected() > 0)
    }

    /// Revoke `old_id` and insert `new_key` in one transaction
    pub async fn replace(
        &self,
        old_id: Uuid,
        new_key: &ApiKey,
        revoked_at: DateTime<Utc>,
    ) -> Result<bool> {
        let mut tx = self.pool.begin().await.context("Failed to begin transaction")?;

        let result =
            sqlx::query("UPDATE api_keys SET revoked_at = ? WHERE id = ? AND revoked_at IS NULL")
                .bind(format_db_timestamp(revoked_at))
                .bind(old_id.to_string())
                .execute(&mut *tx)
                .await
                .context("Failed to revoke rotated api key")?;

        if result.rows_affected() == 0 {
            tx.rollback().await.context("Failed to roll back rotation")?;
            return Ok(false);
        }

        insert_key(&mut *tx, new_key).await?;
        tx.commit().await.context("Failed to commit rotation")?;
        Ok(true)
    }
}

async fn insert_key<'e, E>(executor: E, key: &ApiKey) -> Result<()>
where
    E: sqlx::Executor<'e, Database = sqlx::Sqlite>,
{
    let scopes = serde_json::to_string(&key.scopes).context("Failed to encode scopes")?;

    sqlx::query(
        r#"
        INSERT INTO api_keys (id, organization_id, name, key_hash, key_prefix, scopes,
                              last_used_at, expires_at, created_by, created_at, revoked_at,
                              rate_limit_requests, rate_limit_burst)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(key.id.to_string())
    .bind(key.organization_id.to_string())
    .bind(&key.name)
    .bind(&key.key_hash)
    .bind(&key.key_prefix)
    .bind(scopes)
    .bind(key.last_used_at.map(format_db_timestamp))
    .bind(key.expires_at.map(format_db_timestamp))
    .bind(&key.created_by)
    .bind(format_db_timestamp(key.created_at))
    .bind(key.revoked_at.map(format_db_timestamp))
    .bind(key.rate_limit_requests.map(i64::from))
    .bind(key.rate_limit_burst.map(i64::from))
    .execute(executor)
    .await
    .context("Failed to create api key")?;

    Ok(())
}

fn row_to_api_key(row: ApiKeyRow) -> Result<ApiKey> {
    Ok(ApiKey {
        id: parse_db_uuid(&row.id, "api key id")?,
        organization_id: parse_db_uuid(&row.organization_id, "organization id")?,
        name: row.name,
        key_hash: row.key_hash,
        key_prefix: row.key_prefix,
        scopes: serde_json::from_str(&row.scopes).context("Invalid api key scopes")?,
        last_used_at: row.last_used_at.as_deref().map(parse_db_timestamp).transpose()?,
        expires_at: row.expires_at.as_deref().map(parse_db_timestamp).transpose()?,
        created_by: row.created_by,
        created_at: parse_db_timestamp(&row.created_at)?,
        revoked_at: row.revoked_at.as_deref().map(parse_db_timestamp).transpose()?,
        rate_limit_requests: row.rate_limit_requests.and_then(|v| u32::try_from(v).ok()),
        rate_limit_burst: row.rate_limit_burst.and_then(|v| u32::try_from(v).ok()),
    })
}
