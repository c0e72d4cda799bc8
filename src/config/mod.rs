//! Configuration management
//!
//! This module provides YAML-based configuration management with support for:
//! - Environment variable overrides
//! - Multiple configuration file locations
//! - Default values for all settings

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::models::RateLimits;

/// Main application configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    #[serde(default)]
    pub store: StoreBackend,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    pub keys: KeyConfig,
    #[serde(default)]
    pub sessions: SessionConfig,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

/// Which credential store backs the gatekeeper
#[derive(Debug, Clone, Copy, Deserialize, Serialize, Default, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    /// Durable SQLite store
    #[default]
    Sqlite,
    /// Process-local store, lost on restart
    Memory,
}

/// Database configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_database_url")]
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_secs: u64,
}

fn default_database_url() -> String {
    "sqlite://./data/gatekeeper.db".to_string()
}

fn default_max_connections() -> u32 {
    10
}

fn default_min_connections() -> u32 {
    1
}

fn default_connect_timeout() -> u64 {
    30
}

fn default_idle_timeout() -> u64 {
    600
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: default_database_url(),
            max_connections: default_max_connections(),
            min_connections: default_min_connections(),
            connect_timeout_secs: default_connect_timeout(),
            idle_timeout_secs: default_idle_timeout(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_format")]
    pub format: LogFormat,
    /// Log output target (console or file)
    #[serde(default = "default_log_target")]
    pub target: LogTarget,
    /// Directory for log files (used when target is "file")
    #[serde(default = "default_log_dir")]
    pub log_dir: PathBuf,
    /// Log file name prefix (default: "mcp-gatekeeper")
    #[serde(default = "default_log_prefix")]
    pub log_prefix: String,
    /// Enable daily log rotation (default: true for production)
    #[serde(default = "default_log_rotation")]
    pub daily_rotation: bool,
}

/// Log output target
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum LogTarget {
    /// Log to console (stdout/stderr) - default for development
    #[default]
    Console,
    /// Log to file with optional rotation - recommended for production
    File,
    /// Log to both console and file
    Both,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
    Compact,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> LogFormat {
    LogFormat::Pretty
}

fn default_log_target() -> LogTarget {
    LogTarget::Console
}

fn default_log_dir() -> PathBuf {
    PathBuf::from("/var/log/mcp-gatekeeper")
}

fn default_log_prefix() -> String {
    "mcp-gatekeeper".to_string()
}

fn default_log_rotation() -> bool {
    true
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            target: default_log_target(),
            log_dir: default_log_dir(),
            log_prefix: default_log_prefix(),
            daily_rotation: default_log_rotation(),
        }
    }
}

/// API key issuance and hashing configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct KeyConfig {
    /// HMAC key used to derive `key_hash`; changing it invalidates every key
    pub hash_secret: String,
    #[serde(default = "default_secret_prefix")]
    pub secret_prefix: String,
    #[serde(default)]
    pub default_rate_limit: RateLimits,
}

fn default_secret_prefix() -> String {
    "mcp_".to_string()
}

/// Session liveness configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SessionConfig {
    /// Idle time after which a session is stale (default: 30 minutes)
    #[serde(default = "default_stale_threshold")]
    pub stale_threshold_secs: u64,
    /// Interval between background sweeps (default: 5 minutes)
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,
}

fn default_stale_threshold() -> u64 {
    30 * 60
}

fn default_sweep_interval() -> u64 {
    5 * 60
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            stale_threshold_secs: default_stale_threshold(),
            sweep_interval_secs: default_sweep_interval(),
        }
    }
}

/// Telemetry retention configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TelemetryConfig {
    #[serde(default = "default_max_tool_calls")]
    pub max_tool_calls_per_org: usize,
    #[serde(default = "default_max_audit_entries")]
    pub max_audit_entries_per_org: usize,
    /// Maximum characters kept from a response body preview
    #[serde(default = "default_preview_chars")]
    pub response_preview_chars: usize,
}

fn default_max_tool_calls() -> usize {
    1000
}

fn default_max_audit_entries() -> usize {
    500
}

fn default_preview_chars() -> usize {
    500
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            max_tool_calls_per_org: default_max_tool_calls(),
            max_audit_entries_per_org: default_max_audit_entries(),
            response_preview_chars: default_preview_chars(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            store: StoreBackend::default(),
            database: DatabaseConfig::default(),
            logging: LoggingConfig::default(),
            keys: KeyConfig {
                hash_secret: "change-me-in-production-minimum-32-characters-long".to_string(),
                secret_prefix: default_secret_prefix(),
                default_rate_limit: RateLimits::default(),
            },
            sessions: SessionConfig::default(),
            telemetry: TelemetryConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from file and environment variables
    ///
    /// Configuration is loaded in the following order (later overrides earlier):
    /// 1. Default values
    /// 2. Configuration file (YAML)
    /// 3. Environment variables (prefixed with GATEKEEPER_)
    pub fn load() -> Result<Self> {
        // Try to load .env file if it exists
        let _ = dotenvy::dotenv();

        let config_path = std::env::var("GATEKEEPER_CONFIG")
            .map(PathBuf::from)
            .ok()
            .or_else(Self::find_config_file);

        let mut config = match config_path {
            Some(ref path) if path.exists() => {
                eprintln!("[CONFIG] Loading configuration from: {:?}", path);
                Self::from_file(path)?
            }
            Some(ref path) => {
                eprintln!("[CONFIG] Config file not found: {:?}, using defaults", path);
                AppConfig::default()
            }
            None => {
                eprintln!("[CONFIG] No config file found, using defaults");
                AppConfig::default()
            }
        };

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    /// Load an explicit configuration file, then apply environment overrides
    pub fn load_from(path: &PathBuf) -> Result<Self> {
        let _ = dotenvy::dotenv();

        let mut config = Self::from_file(path)?;
        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    /// Parse a configuration file without applying overrides
    pub fn from_file(path: &PathBuf) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        serde_norway::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {:?}", path))
    }

    /// Find the configuration file in standard locations
    fn find_config_file() -> Option<PathBuf> {
        let paths = [
            // Current directory
            PathBuf::from("config.yaml"),
            PathBuf::from("config/config.yaml"),
            // System config directory
            PathBuf::from("/etc/mcp-gatekeeper/config.yaml"),
            // User config directory
            dirs::config_dir()
                .map(|p| p.join("mcp-gatekeeper/config.yaml"))
                .unwrap_or_default(),
        ];

        paths.into_iter().find(|p| p.exists())
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(&mut self) {
        if let Ok(backend) = std::env::var("GATEKEEPER_STORE") {
            self.store = match backend.to_lowercase().as_str() {
                "memory" => StoreBackend::Memory,
                _ => StoreBackend::Sqlite,
            };
        }

        // Database overrides
        if let Ok(url) = std::env::var("DATABASE_URL") {
            self.database.url = url;
        }

        // Key overrides
        if let Ok(secret) = std::env::var("GATEKEEPER_HASH_SECRET") {
            self.keys.hash_secret = secret;
        }
        if let Ok(prefix) = std::env::var("GATEKEEPER_SECRET_PREFIX") {
            self.keys.secret_prefix = prefix;
        }

        // Session overrides
        if let Ok(secs) = std::env::var("GATEKEEPER_STALE_THRESHOLD_SECS") {
            if let Ok(s) = secs.parse() {
                self.sessions.stale_threshold_secs = s;
            }
        }
        if let Ok(secs) = std::env::var("GATEKEEPER_SWEEP_INTERVAL_SECS") {
            if let Ok(s) = secs.parse() {
                self.sessions.sweep_interval_secs = s;
            }
        }

        // Telemetry overrides
        if let Ok(max) = std::env::var("GATEKEEPER_MAX_TOOL_CALLS") {
            if let Ok(m) = max.parse() {
                self.telemetry.max_tool_calls_per_org = m;
            }
        }
        if let Ok(max) = std::env::var("GATEKEEPER_MAX_AUDIT_ENTRIES") {
            if let Ok(m) = max.parse() {
                self.telemetry.max_audit_entries_per_org = m;
            }
        }

        // Logging overrides
        if let Ok(level) = std::env::var("RUST_LOG") {
            self.logging.level = level;
        }
        if let Ok(format) = std::env::var("GATEKEEPER_LOG_FORMAT") {
            self.logging.format = match format.to_lowercase().as_str() {
                "json" => LogFormat::Json,
                "compact" => LogFormat::Compact,
                _ => LogFormat::Pretty,
            };
        }
        if let Ok(target) = std::env::var("GATEKEEPER_LOG_TARGET") {
            self.logging.target = match target.to_lowercase().as_str() {
                "file" => LogTarget::File,
                "both" => LogTarget::Both,
                _ => LogTarget::Console,
            };
        }
        if let Ok(dir) = std::env::var("GATEKEEPER_LOG_DIR") {
            self.logging.log_dir = PathBuf::from(dir);
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.keys.hash_secret.len() < 32 {
            anyhow::bail!("Key hash secret must be at least 32 characters");
        }
        if self.keys.secret_prefix.is_empty() {
            anyhow::bail!("Key secret prefix cannot be empty");
        }
        if self.sessions.sweep_interval_secs == 0 {
            anyhow::bail!("Session sweep interval must be greater than zero");
        }
        if self.sessions.stale_threshold_secs == 0 {
            anyhow::bail!("Session stale threshold must be greater than zero");
        }
        if self.telemetry.max_tool_calls_per_org == 0 || self.telemetry.max_audit_entries_per_org == 0
        {
            anyhow::bail!("Telemetry retention caps must be greater than zero");
        }

        let limits = &self.keys.default_rate_limit;
        if limits.requests == 0 || limits.burst == 0 || limits.window_secs == 0 || limits.burst_window_secs == 0
        {
            anyhow::bail!("Default rate limits must be greater than zero");
        }

        Ok(())
    }
}
