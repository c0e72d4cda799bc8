//! Tool-call and audit recording, retention caps and audit queries

use chrono::{Duration, Utc};
use rstest::rstest;
use uuid::Uuid;

use crate::common::{audit_entry, ids, register_request, test_config, Backend, TestApp};
use mcp_gatekeeper::models::{AuditLogQuery, ResponseType, ToolCallRecord};
use mcp_gatekeeper::services::ToolCallReport;
use mcp_gatekeeper::CredentialStore;

async fn session_for(app: &TestApp, organization_id: Uuid) -> Uuid {
    app.gatekeeper
        .register_session(register_request(organization_id, Uuid::new_v4(), "ci"))
        .await
        .unwrap()
}

#[rstest]
#[case::memory(Backend::Memory)]
#[case::sqlite(Backend::Sqlite)]
#[tokio::test]
async fn test_tool_call_cap_keeps_most_recent(#[case] backend: Backend) {
    let app = TestApp::new(backend).await;
    let cap = app.config.telemetry.max_tool_calls_per_org;
    let base = Utc::now() - Duration::hours(1);
    let key_id = Uuid::new_v4();

    // Insert out of order so eviction must go by timestamp, not arrival
    let mut offsets: Vec<i64> = (0..(cap as i64 + 7)).collect();
    offsets.reverse();
    offsets.swap(0, 3);
    for offset in &offsets {
        let record = ToolCallRecord {
            id: Uuid::new_v4(),
            connection_id: Uuid::new_v4(),
            organization_id: ids::ORG_A,
            api_key_id: key_id,
            tool_name: format!("tool_{}", offset),
            timestamp: base + Duration::milliseconds(*offset),
            duration_ms: None,
            success: true,
            error: None,
        };
        app.store.append_tool_call(&record, cap).await.unwrap();
    }

    let kept = app.store.list_tool_calls(ids::ORG_A, None).await.unwrap();
    assert_eq!(kept.len(), cap);
    assert_eq!(kept[0].tool_name, "tool_7");
    assert_eq!(kept[cap - 1].tool_name, format!("tool_{}", cap + 6));

    let analytics = app.gatekeeper.get_analytics(ids::ORG_A, None).await.unwrap();
    assert_eq!(analytics.total_calls, cap as u64);
}

#[rstest]
#[case::memory(Backend::Memory)]
#[case::sqlite(Backend::Sqlite)]
#[tokio::test]
async fn test_audit_cap_and_partitioning(#[case] backend: Backend) {
    let app = TestApp::new(backend).await;
    let cap = app.config.telemetry.max_audit_entries_per_org;
    let key_id = Uuid::new_v4();

    for _ in 0..(cap + 5) {
        app.gatekeeper
            .record_audit_entry(audit_entry(ids::ORG_A, key_id, "tools/call", ResponseType::Success))
            .await;
    }
    app.gatekeeper
        .record_audit_entry(audit_entry(ids::ORG_B, key_id, "initialize", ResponseType::Success))
        .await;

    let page_a = app
        .gatekeeper
        .query_audit_log(ids::ORG_A, AuditLogQuery::default())
        .await
        .unwrap();
    assert_eq!(page_a.total, cap as u64);
    assert_eq!(page_a.entries.len(), AuditLogQuery::DEFAULT_LIMIT as usize);
    assert!(page_a
        .entries
        .windows(2)
        .all(|w| w[0].timestamp >= w[1].timestamp));

    let page_b = app
        .gatekeeper
        .query_audit_log(ids::ORG_B, AuditLogQuery::default())
        .await
        .unwrap();
    assert_eq!(page_b.total, 1);
    assert_eq!(page_b.entries[0].method, "initialize");
}

#[rstest]
#[case::memory(Backend::Memory)]
#[case::sqlite(Backend::Sqlite)]
#[tokio::test]
async fn test_audit_filters_and_pagination(#[case] backend: Backend) {
    let app = TestApp::new(backend).await;
    let key_a = Uuid::new_v4();
    let key_b = Uuid::new_v4();
    let started = Utc::now();

    for i in 0..6 {
        let response_type = if i % 3 == 0 { ResponseType::Error } else { ResponseType::Success };
        let mut entry = audit_entry(ids::ORG_A, key_a, "tools/call", response_type);
        entry.tool_name = Some(format!("tool_{}", i));
        if response_type == ResponseType::Error {
            entry.response_error_code = Some(-32603);
            entry.response_error_message = Some("Internal error".to_string());
        }
        app.gatekeeper.record_audit_entry(entry).await;
    }
    app.gatekeeper
        .record_audit_entry(audit_entry(ids::ORG_A, key_b, "resources/read", ResponseType::Success))
        .await;

    let errors = app
        .gatekeeper
        .query_audit_log(
            ids::ORG_A,
            AuditLogQuery {
                response_type: Some(ResponseType::Error),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(errors.total, 2);
    assert!(errors.entries.iter().all(|e| e.response_error_code == Some(-32603)));

    let by_key_and_method = app
        .gatekeeper
        .query_audit_log(
            ids::ORG_A,
            AuditLogQuery {
                api_key_id: Some(key_a),
                method: Some("tools/call".to_string()),
                limit: Some(4),
                offset: Some(4),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(by_key_and_method.total, 6);
    assert_eq!(by_key_and_method.entries.len(), 2);
    assert_eq!(by_key_and_method.entries[1].tool_name.as_deref(), Some("tool_0"));

    let windowed = app
        .gatekeeper
        .query_audit_log(
            ids::ORG_A,
            AuditLogQuery {
                since: Some(started - Duration::seconds(1)),
                until: Some(Utc::now() + Duration::seconds(1)),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(windowed.total, 7);

    let future = app
        .gatekeeper
        .query_audit_log(
            ids::ORG_A,
            AuditLogQuery {
                since: Some(Utc::now() + Duration::hours(1)),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(future.total, 0);
    assert!(future.entries.is_empty());
}

#[rstest]
#[case::memory(Backend::Memory)]
#[case::sqlite(Backend::Sqlite)]
#[tokio::test]
async fn test_tool_calls_for_unknown_sessions_are_dropped(#[case] backend: Backend) {
    let app = TestApp::new(backend).await;
    let session_id = session_for(&app, ids::ORG_A).await;

    app.gatekeeper
        .record_tool_call(ToolCallReport::success(session_id, "run_test"))
        .await;
    app.gatekeeper
        .record_tool_call(ToolCallReport::success(Uuid::new_v4(), "run_test"))
        .await;

    app.gatekeeper.unregister_session(session_id).await.unwrap();
    app.gatekeeper
        .record_tool_call(ToolCallReport::success(session_id, "run_test"))
        .await;

    let analytics = app.gatekeeper.get_analytics(ids::ORG_A, None).await.unwrap();
    assert_eq!(analytics.total_calls, 1);
}

#[rstest]
#[case::memory(Backend::Memory)]
#[case::sqlite(Backend::Sqlite)]
#[tokio::test]
async fn test_concurrent_appends_respect_cap(#[case] backend: Backend) {
    let mut config = test_config(backend);
    config.telemetry.max_tool_calls_per_org = 25;
    let app = TestApp::with_config(backend, config).await;
    let session_id = session_for(&app, ids::ORG_A).await;

    let mut handles = Vec::new();
    for worker in 0..8 {
        let gatekeeper = app.gatekeeper.clone();
        handles.push(tokio::spawn(async move {
            for i in 0..10 {
                gatekeeper
                    .record_tool_call(
                        ToolCallReport::success(session_id, format!("tool_{}", worker))
                            .with_duration(i),
                    )
                    .await;
            }
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    let kept = app.store.list_tool_calls(ids::ORG_A, None).await.unwrap();
    assert_eq!(kept.len(), 25);
    let mut unique: Vec<Uuid> = kept.iter().map(|r| r.id).collect();
    unique.sort();
    unique.dedup();
    assert_eq!(unique.len(), 25);
}
