//! Common step definitions used across features

use cucumber::then;

use crate::features::support::TestWorld;

#[then("the validation is granted")]
async fn validation_granted(world: &mut TestWorld) {
    match &world.last_decision {
        Some(Ok(_)) => {}
        Some(Err(e)) => panic!("Expected a grant, got {}", e),
        None => panic!("No validation has been attempted"),
    }
}

#[then(expr = "the validation is denied with {string}")]
async fn validation_denied(world: &mut TestWorld, error_type: String) {
    assert_eq!(world.denial().error_type(), error_type);
}

#[then(expr = "the request fails with {string}")]
async fn request_fails(world: &mut TestWorld, error_type: String) {
    let error = world
        .last_error
        .as_ref()
        .expect("Expected the last request to fail");
    assert_eq!(error.error_type(), error_type);
}
