//! Data models

pub mod analytics;
pub mod api_key;
pub mod audit;
pub mod session;

pub use analytics::*;
pub use api_key::*;
pub use audit::*;
pub use session::*;
