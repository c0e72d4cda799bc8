//! Tool-call and audit log models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One invocation of a named tool
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolCallRecord {
    pub id: Uuid,
    pub connection_id: Uuid,
    pub organization_id: Uuid,
    pub api_key_id: Uuid,
    pub tool_name: String,
    pub timestamp: DateTime<Utc>,
    pub duration_ms: Option<u64>,
    pub success: bool,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseType {
    Success,
    Error,
}

impl ResponseType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResponseType::Success => "success",
            ResponseType::Error => "error",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "success" => Some(ResponseType::Success),
            "error" => Some(ResponseType::Error),
            _ => None,
        }
    }
}

/// One full protocol exchange
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AuditLogEntry {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub organization_id: Uuid,
    pub api_key_id: Uuid,
    pub api_key_name: String,
    pub connection_id: Option<Uuid>,
    pub client_name: Option<String>,
    pub client_version: Option<String>,
    pub method: String,
    pub tool_name: Option<String>,
    pub resource_uri: Option<String>,
    pub request_params: Option<serde_json::Value>,
    pub response_type: ResponseType,
    pub response_error_code: Option<i64>,
    pub response_error_message: Option<String>,
    pub response_data_preview: Option<String>,
    pub duration_ms: Option<u64>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

/// Audit entry as submitted by callers; id and timestamp are assigned on record.
#[derive(Debug, Clone, Deserialize)]
pub struct NewAuditEntry {
    pub organization_id: Uuid,
    pub api_key_id: Uuid,
    pub api_key_name: String,
    #[serde(default)]
    pub connection_id: Option<Uuid>,
    #[serde(default)]
    pub client_name: Option<String>,
    #[serde(default)]
    pub client_version: Option<String>,
    pub method: String,
    #[serde(default)]
    pub tool_name: Option<String>,
    #[serde(default)]
    pub resource_uri: Option<String>,
    #[serde(default)]
    pub request_params: Option<serde_json::Value>,
    pub response_type: ResponseType,
    #[serde(default)]
    pub response_error_code: Option<i64>,
    #[serde(default)]
    pub response_error_message: Option<String>,
    #[serde(default)]
    pub response_data_preview: Option<String>,
    #[serde(default)]
    pub duration_ms: Option<u64>,
    #[serde(default)]
    pub ip_address: Option<String>,
    #[serde(default)]
    pub user_agent: Option<String>,
}

impl NewAuditEntry {
    pub fn new(
        organization_id: Uuid,
        api_key_id: Uuid,
        api_key_name: impl Into<String>,
        method: impl Into<String>,
        response_type: ResponseType,
    ) -> Self {
        Self {
            organization_id,
            api_key_id,
            api_key_name: api_key_name.into(),
            connection_id: None,
            client_name: None,
            client_version: None,
            method: method.into(),
            tool_name: None,
            resource_uri: None,
            request_params: None,
            response_type,
            response_error_code: None,
            response_error_message: None,
            response_data_preview: None,
            duration_ms: None,
            ip_address: None,
            user_agent: None,
        }
    }

    pub fn into_entry(self, id: Uuid, timestamp: DateTime<Utc>) -> AuditLogEntry {
        AuditLogEntry {
            id,
            timestamp,
            organization_id: self.organization_id,
            api_key_id: self.api_key_id,
            api_key_name: self.api_key_name,
            connection_id: self.connection_id,
            client_name: self.client_name,
            client_version: self.client_version,
            method: self.method,
            tool_name: self.tool_name,
            resource_uri: self.resource_uri,
            request_params: self.request_params,
            response_type: self.response_type,
            response_error_code: self.response_error_code,
            response_error_message: self.response_error_message,
            response_data_preview: self.response_data_preview,
            duration_ms: self.duration_ms,
            ip_address: self.ip_address,
            user_agent: self.user_agent,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct AuditLogQuery {
    pub limit: Option<u32>,
    pub offset: Option<u32>,
    pub method: Option<String>,
    pub api_key_id: Option<Uuid>,
    pub response_type: Option<ResponseType>,
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
}

impl AuditLogQuery {
    pub const DEFAULT_LIMIT: u32 = 50;

    pub fn matches(&self, entry: &AuditLogEntry) -> bool {
        if let Some(ref method) = self.method {
            if &entry.method != method {
                return false;
            }
        }
        if let Some(api_key_id) = self.api_key_id {
            if entry.api_key_id != api_key_id {
                return false;
            }
        }
        if let Some(response_type) = self.response_type {
            if entry.response_type != response_type {
                return false;
            }
        }
        if let Some(since) = self.since {
            if entry.timestamp < since {
                return false;
            }
        }
        if let Some(until) = self.until {
            if entry.timestamp > until {
                return false;
            }
        }
        true
    }
}

/// A page of audit entries; `total` counts every filtered match.
#[derive(Debug, Clone, Serialize, Default)]
pub struct AuditLogPage {
    pub entries: Vec<AuditLogEntry>,
    pub total: u64,
}
