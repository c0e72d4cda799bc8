//! Key issuance, rotation, revocation and validation

use rstest::rstest;
use uuid::Uuid;

use crate::common::{ids, issue_request, Backend, TestApp};
use mcp_gatekeeper::{CredentialStore, GatekeeperError};

#[rstest]
#[case::memory(Backend::Memory)]
#[case::sqlite(Backend::Sqlite)]
#[tokio::test]
async fn test_issued_secret_validates_against_own_scopes(#[case] backend: Backend) {
    let app = TestApp::new(backend).await;
    let scope_sets: [&[&str]; 4] = [
        &["mcp"],
        &["admin"],
        &["mcp:read", "read"],
        &["mcp:execute", "mcp:write"],
    ];

    for scopes in scope_sets {
        let issued = app
            .gatekeeper
            .issue_key(issue_request(ids::ORG_A, scopes))
            .await
            .unwrap();

        for scope in scopes.iter().filter(|s| s.starts_with("mcp") || **s == "admin") {
            let decision = app.gatekeeper.validate_key(&issued.secret, scope).await.unwrap();
            assert_eq!(decision.organization_id, ids::ORG_A);
            assert_eq!(decision.key_name, "integration key");
        }
        assert!(app.gatekeeper.validate_key(&issued.secret, "mcp").await.is_ok());
    }

    let random = format!("mcp_{}", Uuid::new_v4().simple());
    assert!(matches!(
        app.gatekeeper.validate_key(&random, "mcp").await,
        Err(GatekeeperError::InvalidCredential)
    ));
}

#[rstest]
#[case::memory(Backend::Memory)]
#[case::sqlite(Backend::Sqlite)]
#[tokio::test]
async fn test_granular_scope_end_to_end(#[case] backend: Backend) {
    let app = TestApp::new(backend).await;
    let issued = app
        .gatekeeper
        .issue_key(issue_request(ids::ORG_A, &["mcp:execute"]))
        .await
        .unwrap();

    assert!(app
        .gatekeeper
        .validate_key(&issued.secret, "mcp:execute")
        .await
        .is_ok());

    let err = app
        .gatekeeper
        .validate_key(&issued.secret, "mcp:read")
        .await
        .unwrap_err();
    assert!(err.is_auth_denial());

    let body = serde_json::to_value(err.to_response()).unwrap();
    assert_eq!(body["error"], "insufficient_scope");
    assert_eq!(body["details"]["required_scope"], "mcp:read");
    assert_eq!(body["details"]["scopes"], serde_json::json!(["mcp:execute"]));
}

#[rstest]
#[case::memory(Backend::Memory)]
#[case::sqlite(Backend::Sqlite)]
#[tokio::test]
async fn test_rotation_replaces_secret(#[case] backend: Backend) {
    let app = TestApp::new(backend).await;
    let original = app
        .gatekeeper
        .issue_key(issue_request(ids::ORG_A, &["mcp:read", "read"]).expires_in_days(30))
        .await
        .unwrap();

    let rotated = app.gatekeeper.rotate_key(original.api_key.id).await.unwrap();
    assert_ne!(rotated.api_key.id, original.api_key.id);
    assert_eq!(rotated.api_key.name, original.api_key.name);
    assert_eq!(rotated.api_key.scopes, original.api_key.scopes);
    assert_eq!(rotated.api_key.expires_at, original.api_key.expires_at);

    assert!(matches!(
        app.gatekeeper.validate_key(&original.secret, "mcp").await,
        Err(GatekeeperError::InvalidCredential)
    ));

    let decision = app.gatekeeper.validate_key(&rotated.secret, "mcp").await.unwrap();
    assert_eq!(decision.organization_id, original.api_key.organization_id);
    assert_eq!(decision.scopes, original.api_key.scopes);

    let keys = app.gatekeeper.list_keys(ids::ORG_A).await.unwrap();
    assert_eq!(keys.len(), 2);
    assert_eq!(keys.iter().filter(|k| k.is_revoked()).count(), 1);
}

#[rstest]
#[case::memory(Backend::Memory)]
#[case::sqlite(Backend::Sqlite)]
#[tokio::test]
async fn test_revocation_is_terminal_and_idempotent(#[case] backend: Backend) {
    let app = TestApp::new(backend).await;
    let issued = app
        .gatekeeper
        .issue_key(issue_request(ids::ORG_B, &["admin"]))
        .await
        .unwrap();

    app.gatekeeper.revoke_key(issued.api_key.id).await.unwrap();
    app.gatekeeper.revoke_key(issued.api_key.id).await.unwrap();

    assert!(matches!(
        app.gatekeeper.validate_key(&issued.secret, "mcp").await,
        Err(GatekeeperError::InvalidCredential)
    ));
    assert!(matches!(
        app.gatekeeper.rotate_key(issued.api_key.id).await,
        Err(GatekeeperError::NotFound(_))
    ));
}

#[rstest]
#[case::memory(Backend::Memory)]
#[case::sqlite(Backend::Sqlite)]
#[tokio::test]
async fn test_expired_key_is_rejected(#[case] backend: Backend) {
    let app = TestApp::new(backend).await;
    let issued = app
        .gatekeeper
        .issue_key(issue_request(ids::ORG_A, &["mcp"]))
        .await
        .unwrap();

    let mut expired = issued.api_key.clone();
    expired.id = Uuid::new_v4();
    expired.expires_at = Some(chrono::Utc::now() - chrono::Duration::minutes(1));
    // Reuse the secret's hash on a fresh, already expired record
    app.gatekeeper.revoke_key(issued.api_key.id).await.unwrap();
    app.store.create_key(&expired).await.unwrap();

    assert!(matches!(
        app.gatekeeper.validate_key(&issued.secret, "mcp").await,
        Err(GatekeeperError::Expired)
    ));
}

#[rstest]
#[case::memory(Backend::Memory)]
#[case::sqlite(Backend::Sqlite)]
#[tokio::test]
async fn test_validation_stamps_last_used(#[case] backend: Backend) {
    let app = TestApp::new(backend).await;
    let issued = app
        .gatekeeper
        .issue_key(issue_request(ids::ORG_A, &["mcp"]))
        .await
        .unwrap();
    assert!(issued.api_key.last_used_at.is_none());

    app.gatekeeper.validate_key(&issued.secret, "mcp").await.unwrap();

    let mut stamped = None;
    for _ in 0..50 {
        let key = app.store.get_key_by_id(issued.api_key.id).await.unwrap().unwrap();
        if key.last_used_at.is_some() {
            stamped = key.last_used_at;
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    assert!(stamped.is_some());
}

#[rstest]
#[case::memory(Backend::Memory)]
#[case::sqlite(Backend::Sqlite)]
#[tokio::test]
async fn test_rate_limit_follows_key_overrides(#[case] backend: Backend) {
    let app = TestApp::new(backend).await;
    let mut request = issue_request(ids::ORG_A, &["mcp"]);
    request.rate_limit_burst = Some(2);
    let issued = app.gatekeeper.issue_key(request).await.unwrap();

    let decision = app.gatekeeper.validate_key(&issued.secret, "mcp").await.unwrap();
    assert_eq!(decision.rate_limits.burst, 2);
    assert_eq!(decision.rate_limits.requests, 100);

    assert!(app.gatekeeper.check_rate_limit(&decision).await.is_ok());
    assert!(app.gatekeeper.check_rate_limit(&decision).await.is_ok());
    assert!(matches!(
        app.gatekeeper.check_rate_limit(&decision).await,
        Err(GatekeeperError::RateLimited { .. })
    ));
}
