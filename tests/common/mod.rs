//! Common test utilities and helpers
//!
//! This module provides shared test infrastructure including:
//! - Gatekeeper instances over each store backend
//! - Fixtures for sessions, keys and telemetry

pub mod test_app;

pub use fixtures::*;
pub use test_app::*;
