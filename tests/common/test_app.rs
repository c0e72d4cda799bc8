//! Test gatekeeper setup utilities
//!
//! Builds a [`Gatekeeper`] over either store backend with test-friendly
//! configuration.

use std::sync::Arc;

use once_cell::sync::Lazy;
use tokio::sync::Mutex;
use mcp_gatekeeper::{
    config::{AppConfig, DatabaseConfig, StoreBackend},
    db, CredentialStore, Gatekeeper, MemoryStore, SqliteStore,
};

/// Held by tests that start a sweeper, since only one runs per process
pub static SWEEPER_SLOT: Lazy<Mutex<()>> = Lazy::new(|| Mutex::new(()));

/// Store backend under test
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    Memory,
    Sqlite,
}

/// Test gatekeeper wrapper
pub struct TestApp {
    pub gatekeeper: Gatekeeper,
    pub store: Arc<dyn CredentialStore>,
    pub config: AppConfig,
}

impl TestApp {
    pub async fn new(backend: Backend) -> Self {
        Self::with_config(backend, test_config(backend)).await
    }

    pub async fn with_config(backend: Backend, config: AppConfig) -> Self {
        let store: Arc<dyn CredentialStore> = match backend {
            Backend::Memory => Arc::new(MemoryStore::new()),
            Backend::Sqlite => {
                let pool = db::init_pool(&config.database)
                    .await
                    .expect("Failed to create test database");
                Arc::new(SqliteStore::new(pool))
            }
        };

        Self {
            gatekeeper: Gatekeeper::new(store.clone(), &config),
            store,
            config,
        }
    }
}

/// Create a test configuration
pub fn test_config(backend: Backend) -> AppConfig {
    let mut config = AppConfig::default();
    config.store = match backend {
        Backend::Memory => StoreBackend::Memory,
        Backend::Sqlite => StoreBackend::Sqlite,
    };
    // A single connection keeps the in-memory database alive and shared
    config.database = DatabaseConfig {
        url: "sqlite::memory:".to_string(),
        max_connections: 1,
        min_connections: 1,
        ..Default::default()
    };
    config.keys.hash_secret = "integration-test-hash-secret-0123456789".to_string();
    config
}
