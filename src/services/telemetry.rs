//! Telemetry Recorder
//!
//! Recording never fails the caller. Unknown sessions, invalid names and
//! store errors are logged and the record is dropped.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, error, warn};
use uuid::Uuid;

use crate::config::TelemetryConfig;
use crate::db::CredentialStore;
use crate::models::{AuditLogPage, AuditLogQuery, NewAuditEntry, ToolCallRecord};
use crate::utils::validation::{truncate_chars, validate_method, validate_tool_name};
use crate::utils::GatekeeperResult;

/// Largest duration both stores can hold (SQLite integers are signed 64-bit)
pub const MAX_DURATION_MS: u64 = i64::MAX as u64;

fn clamp_duration(duration_ms: u64) -> u64 {
    duration_ms.min(MAX_DURATION_MS)
}

/// Details of one tool invocation as reported by the caller
#[derive(Debug, Clone)]
pub struct ToolCallReport {
    pub connection_id: Uuid,
    pub tool_name: String,
    pub duration_ms: Option<u64>,
    pub success: bool,
    pub error: Option<String>,
}

impl ToolCallReport {
    pub fn success(connection_id: Uuid, tool_name: impl Into<String>) -> Self {
        Self {
            connection_id,
            tool_name: tool_name.into(),
            duration_ms: None,
            success: true,
            error: None,
        }
    }

    pub fn failure(
        connection_id: Uuid,
        tool_name: impl Into<String>,
        error: impl Into<String>,
    ) -> Self {
        Self {
            connection_id,
            tool_name: tool_name.into(),
            duration_ms: None,
            success: false,
            error: Some(error.into()),
        }
    }

    pub fn with_duration(mut self, duration_ms: u64) -> Self {
        self.duration_ms = Some(duration_ms);
        self
    }
}

pub struct TelemetryRecorder {
    store: Arc<dyn CredentialStore>,
    config: TelemetryConfig,
}

impl TelemetryRecorder {
    pub fn new(store: Arc<dyn CredentialStore>, config: TelemetryConfig) -> Self {
        Self { store, config }
    }

    /// Append a tool call for the session's organization
    pub async fn record_tool_call(&self, report: ToolCallReport) {
        if !validate_tool_name(&report.tool_name) {
            warn!(tool = %report.tool_name, "Dropping tool call with invalid tool name");
            return;
        }

        let session = match self.store.get_session(report.connection_id).await {
            Ok(Some(session)) => session,
            Ok(None) => {
                warn!(
                    session_id = %report.connection_id,
                    tool = %report.tool_name,
                    "Dropping tool call for unknown session"
                );
                return;
            }
            Err(e) => {
                error!(session_id = %report.connection_id, "Failed to resolve session for tool call: {:#}", e);
                return;
            }
        };

        let record = ToolCallRecord {
            id: Uuid::new_v4(),
            connection_id: session.id,
            organization_id: session.organization_id,
            api_key_id: session.api_key_id,
            tool_name: report.tool_name,
            timestamp: Utc::now(),
            duration_ms: report.duration_ms.map(clamp_duration),
            success: report.success,
            error: report.error,
        };

        match self
            .store
            .append_tool_call(&record, self.config.max_tool_calls_per_org)
            .await
        {
            Ok(()) => debug!(org_id = %record.organization_id, tool = %record.tool_name, "Tool call recorded"),
            Err(e) => error!(org_id = %record.organization_id, "Failed to record tool call: {:#}", e),
        }
    }

    /// Assign id and timestamp, then append to the organization's audit log
    pub async fn record_audit(&self, mut entry: NewAuditEntry) {
        if !validate_method(&entry.method) {
            warn!(method = %entry.method, "Dropping audit entry with invalid method");
            return;
        }

        entry.duration_ms = entry.duration_ms.map(clamp_duration);
        entry.response_data_preview = entry
            .response_data_preview
            .map(|preview| truncate_chars(&preview, self.config.response_preview_chars));

        let entry = entry.into_entry(Uuid::new_v4(), Utc::now());
        match self
            .store
            .append_audit_entry(&entry, self.config.max_audit_entries_per_org)
            .await
        {
            Ok(()) => debug!(org_id = %entry.organization_id, method = %entry.method, "Audit entry recorded"),
            Err(e) => error!(org_id = %entry.organization_id, "Failed to record audit entry: {:#}", e),
        }
    }

    /// Filtered, newest-first page of an organization's audit log
    pub async fn query_audit(
        &self,
        organization_id: Uuid,
        query: AuditLogQuery,
    ) -> GatekeeperResult<AuditLogPage> {
        let query = self.normalize_query(query);
        Ok(self
            .store
            .query_audit_entries(organization_id, &query)
            .await?)
    }

    fn normalize_query(&self, mut query: AuditLogQuery) -> AuditLogQuery {
        let max_limit = u32::try_from(self.config.max_audit_entries_per_org)
            .unwrap_or(u32::MAX)
            .max(1);
        query.limit = Some(
            query
                .limit
                .unwrap_or(AuditLogQuery::DEFAULT_LIMIT)
                .clamp(1, max_limit),
        );
        query.offset = Some(query.offset.unwrap_or(0));
        query
    }
}
