//! Business logic services

pub mod analytics;
pub mod export;
pub mod key_authority;
pub mod key_material;
pub mod rate_limit;
pub mod scope;
pub mod session_registry;
pub mod session_sweeper;
pub mod telemetry;

pub use analytics::AnalyticsAggregator;
pub use export::{AnalyticsExport, AuditExport, ExportFormat, ExportTable};
pub use key_authority::KeyAuthority;
pub use rate_limit::KeyRateLimiter;
pub use scope::{invalid_scopes, scope_grants, DEFAULT_REQUIRED_SCOPE, SCOPE_VOCABULARY};
pub use session_registry::SessionRegistry;
pub use session_sweeper::SessionSweeper;
pub use telemetry::{TelemetryRecorder, ToolCallReport, MAX_DURATION_MS};
