//! Usage analytics models

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::ToolCallRecord;

/// Per-tool breakdown
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolUsage {
    pub count: u64,
    /// Mean over calls that recorded a duration
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avg_duration_ms: Option<u64>,
    /// Rounded to two decimals
    pub success_rate: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct KeyUsage {
    pub name: String,
    pub count: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DailyUsage {
    pub date: NaiveDate,
    pub total: u64,
    pub success: u64,
    pub failed: u64,
}

/// Summary of an organization's recorded tool calls
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct UsageAnalytics {
    pub total_calls: u64,
    pub successful_calls: u64,
    pub failed_calls: u64,
    pub by_tool: BTreeMap<String, ToolUsage>,
    pub by_api_key: BTreeMap<Uuid, KeyUsage>,
    /// Ascending by date
    pub by_day: Vec<DailyUsage>,
    pub avg_response_time_ms: u64,
    /// Newest first
    pub recent_calls: Vec<ToolCallRecord>,
}
