//! Integration tests for MCP Gatekeeper
//!
//! These tests drive the public [`Gatekeeper`](mcp_gatekeeper::Gatekeeper)
//! surface against each credential store backend.

mod key_authority_tests;
mod telemetry_tests;
