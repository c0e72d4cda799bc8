//! API key models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// A credential grant held by a machine client.
///
/// The plaintext secret is never part of this record; only its keyed digest
/// (`key_hash`) and a short display fragment (`key_prefix`) are kept.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ApiKey {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub name: String,
    #[serde(skip_serializing, default)]
    pub key_hash: String,
    pub key_prefix: String,
    pub scopes: Vec<String>,
    pub last_used_at: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub revoked_at: Option<DateTime<Utc>>,
    /// Per-key override of the sustained request quota
    pub rate_limit_requests: Option<u32>,
    /// Per-key override of the burst quota
    pub rate_limit_burst: Option<u32>,
}

impl ApiKey {
    pub fn is_revoked(&self) -> bool {
        self.revoked_at.is_some()
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|exp| exp <= now)
    }

    /// Usable keys are neither revoked nor past their expiry.
    pub fn is_usable_at(&self, now: DateTime<Utc>) -> bool {
        !self.is_revoked() && !self.is_expired_at(now)
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct IssueKeyRequest {
    pub organization_id: Uuid,
    #[validate(length(min = 1, max = 100, message = "name must be 1-100 characters"))]
    pub name: String,
    pub scopes: Vec<String>,
    /// Optional lifetime in days from issuance
    pub expires_in_days: Option<i64>,
    /// Actor recorded as `created_by`
    #[validate(length(min = 1, max = 255))]
    pub created_by: String,
    pub rate_limit_requests: Option<u32>,
    pub rate_limit_burst: Option<u32>,
}

impl IssueKeyRequest {
    pub fn new(
        organization_id: Uuid,
        name: impl Into<String>,
        scopes: Vec<String>,
        created_by: impl Into<String>,
    ) -> Self {
        Self {
            organization_id,
            name: name.into(),
            scopes,
            expires_in_days: None,
            created_by: created_by.into(),
            rate_limit_requests: None,
            rate_limit_burst: None,
        }
    }

    pub fn expires_in_days(mut self, days: i64) -> Self {
        self.expires_in_days = Some(days);
        self
    }
}

/// Returned once at issuance or rotation; `secret` is never retrievable again.
#[derive(Debug, Clone, Serialize)]
pub struct IssuedKey {
    #[serde(flatten)]
    pub api_key: ApiKey,
    /// Plaintext API key (only returned on creation)
    pub secret: String,
}

/// Effective request quotas for a key.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct RateLimits {
    pub requests: u32,
    pub window_secs: u64,
    pub burst: u32,
    pub burst_window_secs: u64,
}

impl Default for RateLimits {
    fn default() -> Self {
        Self {
            requests: 100,
            window_secs: 60,
            burst: 20,
            burst_window_secs: 10,
        }
    }
}

/// Outcome of a successful validation.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct AuthDecision {
    pub api_key_id: Uuid,
    pub organization_id: Uuid,
    pub key_name: String,
    pub scopes: Vec<String>,
    pub rate_limits: RateLimits,
}
