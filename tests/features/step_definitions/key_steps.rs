//! Step definitions for key issuance, rotation and validation

use cucumber::{given, then, when};
use uuid::Uuid;

use mcp_gatekeeper::models::IssueKeyRequest;

use crate::features::support::world::{parse_scopes, SCENARIO_ORG};
use crate::features::support::TestWorld;

#[given(expr = "an API key {string} with scopes {string}")]
async fn key_with_scopes(world: &mut TestWorld, name: String, scopes: String) {
    let request = IssueKeyRequest::new(SCENARIO_ORG, name.clone(), parse_scopes(&scopes), "cucumber");
    let issued = world
        .gatekeeper
        .issue_key(request)
        .await
        .expect("Failed to issue key");
    world.keys.insert(name, issued);
}

#[when(expr = "I request a key {string} with scopes {string}")]
async fn request_key(world: &mut TestWorld, name: String, scopes: String) {
    let request = IssueKeyRequest::new(SCENARIO_ORG, name.clone(), parse_scopes(&scopes), "cucumber");
    match world.gatekeeper.issue_key(request).await {
        Ok(issued) => {
            world.keys.insert(name, issued);
            world.last_error = None;
        }
        Err(e) => world.last_error = Some(e),
    }
}

#[when(expr = "key {string} is validated for scope {string}")]
async fn validate_key(world: &mut TestWorld, name: String, scope: String) {
    let secret = world.key(&name).secret.clone();
    world.validate(&secret, &scope).await;
}

#[when(expr = "the old secret of {string} is validated for scope {string}")]
async fn validate_retired(world: &mut TestWorld, name: String, scope: String) {
    let secret = world
        .retired_secrets
        .get(&name)
        .cloned()
        .expect("Key was never rotated");
    world.validate(&secret, &scope).await;
}

#[when(expr = "an unknown secret is validated for scope {string}")]
async fn validate_unknown(world: &mut TestWorld, scope: String) {
    let secret = format!("mcp_{}", Uuid::new_v4().simple());
    world.validate(&secret, &scope).await;
}

#[when(expr = "key {string} is rotated")]
async fn rotate_key(world: &mut TestWorld, name: String) {
    let previous = world.key(&name).clone();
    let rotated = world
        .gatekeeper
        .rotate_key(previous.api_key.id)
        .await
        .expect("Failed to rotate key");
    world.retired_secrets.insert(name.clone(), previous.secret);
    world.keys.insert(name, rotated);
}

#[when(expr = "key {string} is revoked")]
async fn revoke_key(world: &mut TestWorld, name: String) {
    let id = world.key(&name).api_key.id;
    world.gatekeeper.revoke_key(id).await.expect("Failed to revoke key");
}

#[then(expr = "the denial reports the key scopes {string}")]
async fn denial_reports_scopes(world: &mut TestWorld, scopes: String) {
    let body = serde_json::to_value(world.denial().to_response()).expect("serialize denial");
    assert_eq!(body["details"]["scopes"], serde_json::json!(parse_scopes(&scopes)));
}

#[then(expr = "the granted key belongs to the organization of {string}")]
async fn granted_same_org(world: &mut TestWorld, name: String) {
    let expected = world.key(&name).api_key.organization_id;
    match &world.last_decision {
        Some(Ok(decision)) => assert_eq!(decision.organization_id, expected),
        other => panic!("Expected a grant, got {:?}", other),
    }
}

#[then(expr = "key {string} has a secret starting with {string}")]
async fn secret_prefix(world: &mut TestWorld, name: String, prefix: String) {
    let issued = world.key(&name);
    assert!(issued.secret.starts_with(&prefix));
    assert!(issued.secret.starts_with(&issued.api_key.key_prefix));
}
