//! Analytics Aggregator
//!
//! Derived fresh on every call from the organization's retained tool calls;
//! nothing here is cached.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use tracing::{instrument, warn};
use uuid::Uuid;

use crate::db::CredentialStore;
use crate::models::{DailyUsage, KeyUsage, ToolCallRecord, ToolUsage, UsageAnalytics};
use crate::utils::GatekeeperResult;

/// Calls reported in `recent_calls`
pub const RECENT_CALLS_LIMIT: usize = 20;

const UNKNOWN_KEY_NAME: &str = "Unknown";

pub struct AnalyticsAggregator {
    store: Arc<dyn CredentialStore>,
}

impl AnalyticsAggregator {
    pub fn new(store: Arc<dyn CredentialStore>) -> Self {
        Self { store }
    }

    #[instrument(skip(self), fields(org_id = %organization_id))]
    pub async fn usage(
        &self,
        organization_id: Uuid,
        since: Option<DateTime<Utc>>,
    ) -> GatekeeperResult<UsageAnalytics> {
        let calls = self.store.list_tool_calls(organization_id, since).await?;

        let mut key_names: HashMap<Uuid, String> = HashMap::new();
        for call in &calls {
            if key_names.contains_key(&call.api_key_id) {
                continue;
            }
            let name = match self.store.get_key_by_id(call.api_key_id).await {
                Ok(Some(key)) => key.name,
                Ok(None) => UNKNOWN_KEY_NAME.to_string(),
                Err(e) => {
                    warn!(key_id = %call.api_key_id, "Failed to resolve key name: {:#}", e);
                    UNKNOWN_KEY_NAME.to_string()
                }
            };
            key_names.insert(call.api_key_id, name);
        }

        Ok(summarize(&calls, &key_names))
    }
}

#[derive(Default)]
struct ToolAccumulator {
    count: u64,
    success: u64,
    duration_total: u128,
    duration_count: u64,
}

/// Reduce tool calls (oldest first) into usage analytics
pub fn summarize(calls: &[ToolCallRecord], key_names: &HashMap<Uuid, String>) -> UsageAnalytics {
    let mut tools: BTreeMap<String, ToolAccumulator> = BTreeMap::new();
    let mut by_api_key: BTreeMap<Uuid, KeyUsage> = BTreeMap::new();
    let mut days: BTreeMap<NaiveDate, DailyUsage> = BTreeMap::new();
    let mut successful_calls = 0u64;
    let mut duration_total = 0u128;
    let mut duration_count = 0u64;

    for call in calls {
        if call.success {
            successful_calls += 1;
        }

        let tool = tools.entry(call.tool_name.clone()).or_default();
        tool.count += 1;
        if call.success {
            tool.success += 1;
        }
        if let Some(duration) = call.duration_ms {
            tool.duration_total += u128::from(duration);
            tool.duration_count += 1;
            duration_total += u128::from(duration);
            duration_count += 1;
        }

        by_api_key
            .entry(call.api_key_id)
            .or_insert_with(|| KeyUsage {
                name: key_names
                    .get(&call.api_key_id)
                    .cloned()
                    .unwrap_or_else(|| UNKNOWN_KEY_NAME.to_string()),
                count: 0,
            })
            .count += 1;

        let date = call.timestamp.date_naive();
        let day = days.entry(date).or_insert_with(|| DailyUsage {
            date,
            total: 0,
            success: 0,
            failed: 0,
        });
        day.total += 1;
        if call.success {
            day.success += 1;
        } else {
            day.failed += 1;
        }
    }

    let by_tool = tools
        .into_iter()
        .map(|(name, acc)| {
            let usage = ToolUsage {
                count: acc.count,
                avg_duration_ms: (acc.duration_count > 0)
                    .then(|| rounded_mean(acc.duration_total, acc.duration_count)),
                success_rate: round2(acc.success as f64 / acc.count as f64),
            };
            (name, usage)
        })
        .collect();

    let mut recent_calls: Vec<ToolCallRecord> = calls.to_vec();
    recent_calls.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    recent_calls.truncate(RECENT_CALLS_LIMIT);

    let total_calls = calls.len() as u64;
    UsageAnalytics {
        total_calls,
        successful_calls,
        failed_calls: total_calls - successful_calls,
        by_tool,
        by_api_key,
        by_day: days.into_values().collect(),
        avg_response_time_ms: if duration_count > 0 {
            rounded_mean(duration_total, duration_count)
        } else {
            0
        },
        recent_calls,
    }
}

/// Integer mean rounded half up; callers guarantee `count > 0`
fn rounded_mean(total: u128, count: u64) -> u64 {
    let count = u128::from(count);
    u64::try_from((total + count / 2) / count).unwrap_or(u64::MAX)
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
