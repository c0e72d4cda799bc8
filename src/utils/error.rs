//! Error types and handling
//!
//! Authorization failures are structured denials the caller branches on; they
//! are never collapsed into a generic fault. Every error can be rendered as a
//! consistent JSON body for whatever transport sits in front of the gatekeeper.

use serde::Serialize;
use thiserror::Error;
use tracing::error;

/// Gatekeeper error types
#[derive(Debug, Error)]
pub enum GatekeeperError {
    /// No usable key matches the presented secret
    #[error("Invalid credential")]
    InvalidCredential,

    /// Key matched but is past its expiry
    #[error("API key has expired")]
    Expired,

    /// Key is usable but its scopes do not satisfy the required scope
    #[error("Insufficient scope: requires '{required}', key has [{}]", scopes.join(", "))]
    InsufficientScope {
        required: String,
        scopes: Vec<String>,
    },

    /// Issuance requested scopes outside the fixed vocabulary
    #[error("Invalid scope(s): [{}]", invalid.join(", "))]
    InvalidScope { invalid: Vec<String> },

    /// Key or session does not exist, or is already revoked/removed
    #[error("Not found: {0}")]
    NotFound(String),

    /// Request failed validation
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Key exceeded one of its request quotas
    #[error("Rate limit exceeded, retry after {retry_after_ms}ms")]
    RateLimited { retry_after_ms: u64 },

    /// Credential store failure
    #[error("Store error: {0}")]
    Store(String),
}

impl GatekeeperError {
    /// Stable identifier for programmatic handling
    pub fn error_type(&self) -> &'static str {
        match self {
            GatekeeperError::InvalidCredential => "invalid_credential",
            GatekeeperError::Expired => "expired",
            GatekeeperError::InsufficientScope { .. } => "insufficient_scope",
            GatekeeperError::InvalidScope { .. } => "invalid_scope",
            GatekeeperError::NotFound(_) => "not_found",
            GatekeeperError::InvalidInput(_) => "invalid_input",
            GatekeeperError::RateLimited { .. } => "rate_limited",
            GatekeeperError::Store(_) => "store_error",
        }
    }

    /// True for the denials produced by validation
    pub fn is_auth_denial(&self) -> bool {
        matches!(
            self,
            GatekeeperError::InvalidCredential
                | GatekeeperError::Expired
                | GatekeeperError::InsufficientScope { .. }
        )
    }

    /// Build the response body; server-side failures are logged here.
    pub fn to_response(&self) -> ErrorResponse {
        let error_type = self.error_type();
        if matches!(self, GatekeeperError::Store(_)) {
            error!(error = %self, error_type = error_type, "Request error");
        }

        let response = ErrorResponse::new(error_type, self.to_string());
        match self {
            GatekeeperError::InsufficientScope { required, scopes } => response
                .with_details(serde_json::json!({
                    "required_scope": required,
                    "scopes": scopes,
                })),
            GatekeeperError::InvalidScope { invalid } => {
                response.with_details(serde_json::json!({ "invalid_scopes": invalid }))
            }
            GatekeeperError::RateLimited { retry_after_ms } => {
                response.with_details(serde_json::json!({ "retry_after_ms": retry_after_ms }))
            }
            _ => response,
        }
    }
}

/// Error response body
#[derive(Serialize, Debug)]
pub struct ErrorResponse {
    /// Error type identifier
    pub error: String,
    /// Human-readable error message
    pub message: String,
    /// Additional error details (optional)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ErrorResponse {
    /// Create a new error response
    pub fn new(error: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            message: message.into(),
            details: None,
        }
    }

    /// Add details to the error response
    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }
}

impl From<anyhow::Error> for GatekeeperError {
    fn from(err: anyhow::Error) -> Self {
        GatekeeperError::Store(format!("{:#}", err))
    }
}

impl From<sqlx::Error> for GatekeeperError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => GatekeeperError::NotFound("Record not found".to_string()),
            _ => GatekeeperError::Store(err.to_string()),
        }
    }
}

impl From<validator::ValidationErrors> for GatekeeperError {
    fn from(err: validator::ValidationErrors) -> Self {
        GatekeeperError::InvalidInput(err.to_string())
    }
}

/// Result type alias for gatekeeper operations
pub type GatekeeperResult<T> = Result<T, GatekeeperError>;
