//! Step definitions for Cucumber scenarios

pub mod analytics_steps;
pub mod common_steps;
pub mod key_steps;
pub mod session_steps;
