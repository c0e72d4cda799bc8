//! Step definitions for telemetry and analytics

use cucumber::{gherkin::Step, then, when};

use mcp_gatekeeper::services::ToolCallReport;

use crate::features::support::world::SCENARIO_ORG;
use crate::features::support::TestWorld;

/// Records one call per table row: | tool | success | duration_ms |
#[when(expr = "session {string} records the tool calls:")]
async fn record_calls(world: &mut TestWorld, name: String, step: &Step) {
    let session_id = world.session(&name);
    let table = step.table.as_ref().expect("Step requires a table");

    for row in table.rows.iter().skip(1) {
        let tool = row[0].as_str();
        let mut report = match row[1].as_str() {
            "yes" | "true" => ToolCallReport::success(session_id, tool),
            _ => ToolCallReport::failure(session_id, tool, "tool failed"),
        };
        if let Ok(duration) = row[2].parse::<u64>() {
            report = report.with_duration(duration);
        }
        world.gatekeeper.record_tool_call(report).await;
    }
}

#[when("analytics are requested")]
async fn request_analytics(world: &mut TestWorld) {
    let analytics = world
        .gatekeeper
        .get_analytics(SCENARIO_ORG, None)
        .await
        .expect("Failed to compute analytics");
    world.analytics = Some(analytics);
}

fn analytics(world: &TestWorld) -> &mcp_gatekeeper::models::UsageAnalytics {
    world.analytics.as_ref().expect("Analytics were not requested")
}

#[then(expr = "total calls is {int}")]
async fn total_calls(world: &mut TestWorld, total: u64) {
    let a = analytics(world);
    assert_eq!(a.total_calls, total);
    assert_eq!(a.total_calls, a.successful_calls + a.failed_calls);
}

#[then(expr = "the average response time is {int} ms")]
async fn avg_response(world: &mut TestWorld, ms: u64) {
    assert_eq!(analytics(world).avg_response_time_ms, ms);
}

#[then(expr = "tool {string} has {int} calls with success rate {float}")]
async fn tool_rate(world: &mut TestWorld, tool: String, count: u64, rate: f64) {
    let usage = analytics(world)
        .by_tool
        .get(&tool)
        .unwrap_or_else(|| panic!("No usage for tool '{}'", tool));
    assert_eq!(usage.count, count);
    assert!((usage.success_rate - rate).abs() < f64::EPSILON);
}
