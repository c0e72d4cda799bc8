//! Test world for Cucumber scenarios

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use cucumber::World;
use uuid::Uuid;

use mcp_gatekeeper::config::AppConfig;
use mcp_gatekeeper::models::{AuthDecision, IssuedKey, UsageAnalytics};
use mcp_gatekeeper::{CredentialStore, Gatekeeper, GatekeeperError, MemoryStore};

/// Organization every scenario runs under unless a step names another
pub const SCENARIO_ORG: Uuid = Uuid::from_u128(0x5ce4a210_0000_4000_8000_000000000001);

/// Test world that maintains state across scenario steps
#[derive(World)]
#[world(init = Self::new)]
pub struct TestWorld {
    pub gatekeeper: Gatekeeper,
    pub store: Arc<dyn CredentialStore>,

    /// Issued keys by scenario name
    pub keys: HashMap<String, IssuedKey>,

    /// Secrets that were valid before a rotation, by scenario name
    pub retired_secrets: HashMap<String, String>,

    /// Open sessions by scenario name
    pub sessions: HashMap<String, Uuid>,

    /// Outcome of the last validation or issuance attempt
    pub last_decision: Option<Result<AuthDecision, GatekeeperError>>,
    pub last_error: Option<GatekeeperError>,

    pub analytics: Option<UsageAnalytics>,
    pub swept: Option<u64>,
}

impl fmt::Debug for TestWorld {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TestWorld")
            .field("keys", &self.keys.keys().collect::<Vec<_>>())
            .field("sessions", &self.sessions)
            .field("last_decision", &self.last_decision)
            .field("last_error", &self.last_error)
            .field("swept", &self.swept)
            .finish()
    }
}

impl TestWorld {
    pub fn new() -> Self {
        let mut config = AppConfig::default();
        config.keys.hash_secret = "cucumber-hash-secret-0123456789abcdef".to_string();

        let store: Arc<dyn CredentialStore> = Arc::new(MemoryStore::new());
        Self {
            gatekeeper: Gatekeeper::new(store.clone(), &config),
            store,
            keys: HashMap::new(),
            retired_secrets: HashMap::new(),
            sessions: HashMap::new(),
            last_decision: None,
            last_error: None,
            analytics: None,
            swept: None,
        }
    }

    pub fn key(&self, name: &str) -> &IssuedKey {
        self.keys
            .get(name)
            .unwrap_or_else(|| panic!("No key named '{}' in this scenario", name))
    }

    pub fn session(&self, name: &str) -> Uuid {
        *self
            .sessions
            .get(name)
            .unwrap_or_else(|| panic!("No session named '{}' in this scenario", name))
    }

    /// Validate a secret and keep the outcome for later assertions
    pub async fn validate(&mut self, secret: &str, required_scope: &str) {
        self.last_decision = Some(self.gatekeeper.validate_key(secret, required_scope).await);
    }

    pub fn denial(&self) -> &GatekeeperError {
        match &self.last_decision {
            Some(Err(e)) => e,
            Some(Ok(decision)) => panic!("Expected a denial, got a grant for {}", decision.key_name),
            None => panic!("No validation has been attempted"),
        }
    }
}

/// Split a comma separated scope list from a step argument
pub fn parse_scopes(scopes: &str) -> Vec<String> {
    scopes
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}
