//! Step definitions for session tracking

use std::time::Duration as StdDuration;

use chrono::{Duration, Utc};
use cucumber::{given, then, when};
use uuid::Uuid;

use mcp_gatekeeper::models::{RegisterSessionRequest, Session};
use mcp_gatekeeper::CredentialStore;

use crate::features::support::world::SCENARIO_ORG;
use crate::features::support::TestWorld;

#[given(expr = "a session {string} is registered")]
async fn session_registered(world: &mut TestWorld, name: String) {
    let request = RegisterSessionRequest {
        api_key_id: Uuid::new_v4(),
        api_key_name: name.clone(),
        organization_id: SCENARIO_ORG,
        client_info: None,
        ip_address: None,
    };
    let id = world
        .gatekeeper
        .register_session(request)
        .await
        .expect("Failed to register session");
    world.sessions.insert(name, id);
}

#[given(expr = "a session {string} idle for {int} minutes")]
async fn session_idle(world: &mut TestWorld, name: String, minutes: i64) {
    let last_activity_at = Utc::now() - Duration::minutes(minutes);
    let session = Session {
        id: Uuid::new_v4(),
        api_key_id: Uuid::new_v4(),
        api_key_name: name.clone(),
        organization_id: SCENARIO_ORG,
        connected_at: last_activity_at,
        last_activity_at,
        client_info: None,
        ip_address: None,
    };
    world
        .store
        .create_session(&session)
        .await
        .expect("Failed to seed session");
    world.sessions.insert(name, session.id);
}

#[when(expr = "session {string} sends a heartbeat")]
async fn heartbeat(world: &mut TestWorld, name: String) {
    let id = world.session(&name);
    world.last_error = world.gatekeeper.heartbeat_session(id).await.err();
}

#[when(expr = "stale sessions older than {int} minutes are swept")]
async fn sweep(world: &mut TestWorld, minutes: u64) {
    let removed = world
        .gatekeeper
        .sweep_stale_sessions(StdDuration::from_secs(minutes * 60))
        .await
        .expect("Sweep failed");
    world.swept = Some(removed);
}

#[then(expr = "{int} session(s) was/were removed")]
async fn removed_count(world: &mut TestWorld, count: u64) {
    assert_eq!(world.swept, Some(count));
}

#[then(expr = "session {string} is active")]
async fn session_active(world: &mut TestWorld, name: String) {
    let id = world.session(&name);
    let active = world
        .gatekeeper
        .list_active_sessions(SCENARIO_ORG)
        .await
        .expect("Failed to list sessions");
    assert!(active.iter().any(|s| s.session.id == id));
}

#[then(expr = "session {string} is not active")]
async fn session_inactive(world: &mut TestWorld, name: String) {
    let id = world.session(&name);
    let active = world
        .gatekeeper
        .list_active_sessions(SCENARIO_ORG)
        .await
        .expect("Failed to list sessions");
    assert!(active.iter().all(|s| s.session.id != id));
}
