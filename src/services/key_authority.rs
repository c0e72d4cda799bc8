//! Key Authority
//!
//! Issues, rotates, revokes and validates API keys. Plaintext secrets leave
//! this module exactly once, in the [`IssuedKey`] returned by issue/rotate.

use std::sync::Arc;

use chrono::{Duration, Utc};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;
use validator::Validate;

use crate::config::KeyConfig;
use crate::db::CredentialStore;
use crate::models::{ApiKey, AuthDecision, IssueKeyRequest, IssuedKey, RateLimits};
use crate::services::key_material::{generate_secret, hash_secret, key_prefix};
use crate::services::scope::{invalid_scopes, scope_grants};
use crate::utils::{GatekeeperError, GatekeeperResult};

pub struct KeyAuthority {
    store: Arc<dyn CredentialStore>,
    config: KeyConfig,
}

impl KeyAuthority {
    pub fn new(store: Arc<dyn CredentialStore>, config: KeyConfig) -> Self {
        Self { store, config }
    }

    /// Create a new key and return its plaintext secret
    #[instrument(skip(self, request), fields(org_id = %request.organization_id, name = %request.name))]
    pub async fn issue(&self, request: IssueKeyRequest) -> GatekeeperResult<IssuedKey> {
        request.validate()?;
        let scopes = normalize_scopes(&request.scopes)?;

        let expires_at = match request.expires_in_days {
            Some(days) if days <= 0 => {
                return Err(GatekeeperError::InvalidInput(
                    "expires_in_days must be positive".to_string(),
                ));
            }
            Some(days) => {
                let expires_at = Duration::try_days(days)
                    .and_then(|lifetime| Utc::now().checked_add_signed(lifetime))
                    .ok_or_else(|| {
                        GatekeeperError::InvalidInput(format!(
                            "expires_in_days {} is out of range",
                            days
                        ))
                    })?;
                Some(expires_at)
            }
            None => None,
        };

        if request.rate_limit_requests == Some(0) || request.rate_limit_burst == Some(0) {
            return Err(GatekeeperError::InvalidInput(
                "rate limit overrides must be positive".to_string(),
            ));
        }

        let secret = generate_secret(&self.config.secret_prefix);
        let api_key = ApiKey {
            id: Uuid::new_v4(),
            organization_id: request.organization_id,
            name: request.name,
            key_hash: hash_secret(&self.config.hash_secret, &secret)?,
            key_prefix: key_prefix(&secret),
            scopes,
            last_used_at: None,
            expires_at,
            created_by: request.created_by,
            created_at: Utc::now(),
            revoked_at: None,
            rate_limit_requests: request.rate_limit_requests,
            rate_limit_burst: request.rate_limit_burst,
        };

        self.store.create_key(&api_key).await?;

        info!(key_id = %api_key.id, prefix = %api_key.key_prefix, "API key issued");
        Ok(IssuedKey { api_key, secret })
    }

    /// Revoke `key_id` and issue a replacement with the same grant
    #[instrument(skip(self), fields(key_id = %key_id))]
    pub async fn rotate(&self, key_id: Uuid) -> GatekeeperResult<IssuedKey> {
        let old = match self.store.get_key_by_id(key_id).await? {
            Some(key) if !key.is_revoked() => key,
            _ => return Err(GatekeeperError::NotFound("API key not found".to_string())),
        };

        let secret = generate_secret(&self.config.secret_prefix);
        let now = Utc::now();
        let api_key = ApiKey {
            id: Uuid::new_v4(),
            organization_id: old.organization_id,
            name: old.name.clone(),
            key_hash: hash_secret(&self.config.hash_secret, &secret)?,
            key_prefix: key_prefix(&secret),
            scopes: old.scopes.clone(),
            last_used_at: None,
            expires_at: old.expires_at,
            created_by: old.created_by.clone(),
            created_at: now,
            revoked_at: None,
            rate_limit_requests: old.rate_limit_requests,
            rate_limit_burst: old.rate_limit_burst,
        };

        // A concurrent revoke between the lookup and here wins
        if !self.store.replace_key(old.id, &api_key, now).await? {
            return Err(GatekeeperError::NotFound("API key not found".to_string()));
        }

        info!(old_key_id = %old.id, new_key_id = %api_key.id, "API key rotated");
        Ok(IssuedKey { api_key, secret })
    }

    /// Revoke a key. Revoking an already revoked key succeeds.
    #[instrument(skip(self), fields(key_id = %key_id))]
    pub async fn revoke(&self, key_id: Uuid) -> GatekeeperResult<()> {
        let key = self
            .store
            .get_key_by_id(key_id)
            .await?
            .ok_or_else(|| GatekeeperError::NotFound("API key not found".to_string()))?;

        if key.is_revoked() {
            debug!("API key already revoked");
            return Ok(());
        }

        if self.store.revoke_key(key_id, Utc::now()).await? {
            info!("API key revoked");
        }
        Ok(())
    }

    /// Authenticate a secret and authorize it for `required_scope`
    #[instrument(skip(self, secret), fields(required_scope = %required_scope))]
    pub async fn validate(&self, secret: &str, required_scope: &str) -> GatekeeperResult<AuthDecision> {
        let key_hash = hash_secret(&self.config.hash_secret, secret)?;

        let key = match self.store.get_key_by_hash(&key_hash).await? {
            Some(key) if !key.is_revoked() => key,
            _ => {
                debug!("No active key matches presented secret");
                return Err(GatekeeperError::InvalidCredential);
            }
        };

        let now = Utc::now();
        if key.is_expired_at(now) {
            debug!(key_id = %key.id, "API key expired");
            return Err(GatekeeperError::Expired);
        }

        if !scope_grants(&key.scopes, required_scope) {
            debug!(key_id = %key.id, "API key lacks required scope");
            return Err(GatekeeperError::InsufficientScope {
                required: required_scope.to_string(),
                scopes: key.scopes,
            });
        }

        self.stamp_last_used(key.id, now);

        Ok(AuthDecision {
            api_key_id: key.id,
            organization_id: key.organization_id,
            rate_limits: self.effective_rate_limits(&key),
            key_name: key.name,
            scopes: key.scopes,
        })
    }

    pub async fn list(&self, organization_id: Uuid) -> GatekeeperResult<Vec<ApiKey>> {
        Ok(self.store.list_keys_by_org(organization_id).await?)
    }

    pub async fn get(&self, key_id: Uuid) -> GatekeeperResult<Option<ApiKey>> {
        Ok(self.store.get_key_by_id(key_id).await?)
    }

    /// Key-level overrides on top of the configured defaults
    pub fn effective_rate_limits(&self, key: &ApiKey) -> RateLimits {
        let defaults = self.config.default_rate_limit;
        RateLimits {
            requests: key.rate_limit_requests.unwrap_or(defaults.requests),
            burst: key.rate_limit_burst.unwrap_or(defaults.burst),
            ..defaults
        }
    }

    /// Fire-and-forget; the decision never waits on this write
    fn stamp_last_used(&self, key_id: Uuid, at: chrono::DateTime<Utc>) {
        let store = self.store.clone();
        tokio::spawn(async move {
            if let Err(e) = store.touch_key(key_id, at).await {
                warn!(key_id = %key_id, "Failed to update key last_used_at: {:#}", e);
            }
        });
    }
}

/// Reject empty or unknown scopes; drop duplicates keeping first occurrence
fn normalize_scopes(scopes: &[String]) -> GatekeeperResult<Vec<String>> {
    if scopes.is_empty() {
        return Err(GatekeeperError::InvalidScope { invalid: Vec::new() });
    }

    let invalid = invalid_scopes(scopes);
    if !invalid.is_empty() {
        return Err(GatekeeperError::InvalidScope { invalid });
    }

    let mut normalized: Vec<String> = Vec::with_capacity(scopes.len());
    for scope in scopes {
        if !normalized.contains(scope) {
            normalized.push(scope.clone());
        }
    }
    Ok(normalized)
}
