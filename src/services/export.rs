//! Analytics and audit export
//!
//! JSON output is the nested serde representation. CSV output flattens the
//! same data into titled tables separated by a blank line.

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::models::{AuditLogEntry, UsageAnalytics};
use crate::utils::GatekeeperResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    #[default]
    Json,
    Csv,
}

impl ExportFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExportFormat::Json => "json",
            ExportFormat::Csv => "csv",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Some(ExportFormat::Json),
            "csv" => Some(ExportFormat::Csv),
            _ => None,
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            ExportFormat::Json => "application/json",
            ExportFormat::Csv => "text/csv",
        }
    }

    pub fn extension(&self) -> &'static str {
        self.as_str()
    }
}

/// A flat table of string cells
#[derive(Debug, Clone, PartialEq)]
pub struct ExportTable {
    pub title: String,
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl ExportTable {
    fn new(title: &str, headers: &[&str]) -> Self {
        Self {
            title: title.to_string(),
            headers: headers.iter().map(|h| h.to_string()).collect(),
            rows: Vec::new(),
        }
    }

    fn push(&mut self, row: Vec<String>) {
        self.rows.push(row);
    }

    pub fn to_csv(&self) -> String {
        let mut csv = String::new();
        push_csv_line(&mut csv, &self.headers);
        for row in &self.rows {
            push_csv_line(&mut csv, row);
        }
        csv
    }
}

fn push_csv_line(out: &mut String, cells: &[String]) {
    let line: Vec<String> = cells.iter().map(|c| escape_csv(c)).collect();
    out.push_str(&line.join(","));
    out.push_str("\r\n");
}

/// Quote a cell when it contains a delimiter, quote or line break
pub fn escape_csv(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

fn opt<T: ToString>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

pub struct AnalyticsExport<'a> {
    analytics: &'a UsageAnalytics,
}

impl<'a> AnalyticsExport<'a> {
    pub fn new(analytics: &'a UsageAnalytics) -> Self {
        Self { analytics }
    }

    pub fn tables(&self) -> Vec<ExportTable> {
        let a = self.analytics;

        let mut summary = ExportTable::new("Summary", &["Metric", "Value"]);
        summary.push(vec!["Total Calls".into(), a.total_calls.to_string()]);
        summary.push(vec!["Successful Calls".into(), a.successful_calls.to_string()]);
        summary.push(vec!["Failed Calls".into(), a.failed_calls.to_string()]);
        summary.push(vec!["Avg Response Time (ms)".into(), a.avg_response_time_ms.to_string()]);

        let mut by_tool = ExportTable::new(
            "By Tool",
            &["Tool", "Count", "Success Rate", "Avg Duration (ms)"],
        );
        for (name, usage) in &a.by_tool {
            by_tool.push(vec![
                name.clone(),
                usage.count.to_string(),
                format!("{:.2}", usage.success_rate),
                opt(usage.avg_duration_ms),
            ]);
        }

        let mut by_key = ExportTable::new("By API Key", &["API Key ID", "Name", "Count"]);
        for (id, usage) in &a.by_api_key {
            by_key.push(vec![id.to_string(), usage.name.clone(), usage.count.to_string()]);
        }

        let mut by_day = ExportTable::new("By Day", &["Date", "Total", "Success", "Failed"]);
        for day in &a.by_day {
            by_day.push(vec![
                day.date.to_string(),
                day.total.to_string(),
                day.success.to_string(),
                day.failed.to_string(),
            ]);
        }

        let mut recent = ExportTable::new(
            "Recent Calls",
            &["Timestamp", "Tool", "API Key ID", "Success", "Duration (ms)", "Error"],
        );
        for call in &a.recent_calls {
            recent.push(vec![
                call.timestamp.to_rfc3339(),
                call.tool_name.clone(),
                call.api_key_id.to_string(),
                call.success.to_string(),
                opt(call.duration_ms),
                call.error.clone().unwrap_or_default(),
            ]);
        }

        vec![summary, by_tool, by_key, by_day, recent]
    }

    pub fn render(&self, format: ExportFormat) -> GatekeeperResult<Vec<u8>> {
        match format {
            ExportFormat::Json => Ok(serde_json::to_vec_pretty(self.analytics)
                .context("Failed to serialize analytics to JSON")?),
            ExportFormat::Csv => {
                let sections: Vec<String> = self
                    .tables()
                    .iter()
                    .map(|t| format!("{}\r\n{}", escape_csv(&t.title), t.to_csv()))
                    .collect();
                Ok(sections.join("\r\n").into_bytes())
            }
        }
    }
}

pub struct AuditExport<'a> {
    entries: &'a [AuditLogEntry],
}

impl<'a> AuditExport<'a> {
    pub fn new(entries: &'a [AuditLogEntry]) -> Self {
        Self { entries }
    }

    pub fn table(&self) -> ExportTable {
        let mut table = ExportTable::new(
            "Audit Log",
            &[
                "ID",
                "Timestamp",
                "API Key ID",
                "API Key Name",
                "Connection ID",
                "Client",
                "Client Version",
                "Method",
                "Tool",
                "Resource URI",
                "Response Type",
                "Error Code",
                "Error Message",
                "Duration (ms)",
                "IP Address",
                "User Agent",
            ],
        );

        for e in self.entries {
            table.push(vec![
                e.id.to_string(),
                e.timestamp.to_rfc3339(),
                e.api_key_id.to_string(),
                e.api_key_name.clone(),
                opt(e.connection_id),
                e.client_name.clone().unwrap_or_default(),
                e.client_version.clone().unwrap_or_default(),
                e.method.clone(),
                e.tool_name.clone().unwrap_or_default(),
                e.resource_uri.clone().unwrap_or_default(),
                e.response_type.as_str().to_string(),
                opt(e.response_error_code),
                e.response_error_message.clone().unwrap_or_default(),
                opt(e.duration_ms),
                e.ip_address.clone().unwrap_or_default(),
                e.user_agent.clone().unwrap_or_default(),
            ]);
        }
        table
    }

    pub fn render(&self, format: ExportFormat) -> GatekeeperResult<Vec<u8>> {
        match format {
            ExportFormat::Json => Ok(serde_json::to_vec_pretty(self.entries)
                .context("Failed to serialize audit log to JSON")?),
            ExportFormat::Csv => Ok(self.table().to_csv().into_bytes()),
        }
    }
}
