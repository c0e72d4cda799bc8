//! Database layer
//!
//! The gatekeeper core talks to an injected [`CredentialStore`]. Two backends
//! are provided:
//! - [`MemoryStore`] for single-process deployments and tests
//! - [`SqliteStore`] backed by the repositories in this module

pub mod api_key_repository;
pub mod audit_repository;
pub mod memory;
pub mod session_repository;
pub mod sqlite;
pub mod store;
pub mod tool_call_repository;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::{Pool, Sqlite};
use tracing::info;

pub use api_key_repository::ApiKeyRepository;
pub use audit_repository::AuditRepository;
pub use memory::MemoryStore;
pub use session_repository::SessionRepository;
pub use sqlite::SqliteStore;
pub use store::CredentialStore;
pub use tool_call_repository::ToolCallRepository;

use crate::config::{AppConfig, DatabaseConfig, StoreBackend};

/// Database connection pool type
pub type DbPool = Pool<Sqlite>;

/// Initialize the database connection pool and run migrations
pub async fn init_pool(config: &DatabaseConfig) -> Result<DbPool> {
    let options: sqlx::sqlite::SqliteConnectOptions = config
        .url
        .parse()
        .with_context(|| format!("Invalid database url: {}", config.url))?;

    let pool = sqlx::sqlite::SqlitePoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(Duration::from_secs(config.connect_timeout_secs))
        .idle_timeout(Duration::from_secs(config.idle_timeout_secs))
        .connect_with(options.create_if_missing(true))
        .await
        .context("Failed to connect to database")?;

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .context("Failed to run database migrations")?;

    Ok(pool)
}

/// Open the store selected by configuration
pub async fn open_store(config: &AppConfig) -> Result<Arc<dyn CredentialStore>> {
    match config.store {
        StoreBackend::Memory => {
            info!("Using in-memory credential store");
            Ok(Arc::new(MemoryStore::new()))
        }
        StoreBackend::Sqlite => {
            info!("Using SQLite credential store: {}", config.database.url);
            let pool = init_pool(&config.database).await?;
            Ok(Arc::new(SqliteStore::new(pool)))
        }
    }
}

/// Fixed-precision RFC 3339 so lexical order matches chronological order
pub(crate) fn format_db_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn parse_db_timestamp(ts: &str) -> Result<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(ts) {
        return Ok(dt.with_timezone(&Utc));
    }
    let naive = chrono::NaiveDateTime::parse_from_str(ts, "%Y-%m-%d %H:%M:%S")
        .with_context(|| format!("Invalid timestamp: {}", ts))?;
    Ok(DateTime::<Utc>::from_naive_utc_and_offset(naive, Utc))
}

pub(crate) fn parse_db_uuid(value: &str, what: &str) -> Result<uuid::Uuid> {
    uuid::Uuid::parse_str(value).with_context(|| format!("Invalid {}: {}", what, value))
}
