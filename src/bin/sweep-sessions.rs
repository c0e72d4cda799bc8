//! CLI tool for sweeping stale sessions
//!
//! For deployments that prefer cron over the in-process sweeper. Performs a
//! single sweep and exits.
//!
//! Usage:
//!   sweep-sessions [--config <path>] [--threshold-secs <n>] [--verbose]
//!
//! Options:
//!   --config          Path to configuration file (default: standard locations)
//!   --threshold-secs  Idle time after which a session is stale (default: from config)
//!   --verbose         Enable verbose output
//!
//! Example cron entry (run every 5 minutes):
//!   */5 * * * * /usr/local/bin/sweep-sessions --config /etc/mcp-gatekeeper/config.yaml

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use mcp_gatekeeper::{AppConfig, Gatekeeper};
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    let args: Vec<String> = env::args().collect();
    let mut config_path: Option<PathBuf> = None;
    let mut threshold_secs: Option<u64> = None;
    let mut verbose = false;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--config" => {
                if i + 1 < args.len() {
                    config_path = Some(PathBuf::from(&args[i + 1]));
                    i += 1;
                }
            }
            "--threshold-secs" => {
                if i + 1 < args.len() {
                    threshold_secs = Some(
                        args[i + 1]
                            .parse()
                            .context("Invalid --threshold-secs value")?,
                    );
                    i += 1;
                }
            }
            "--verbose" | "-v" => {
                verbose = true;
            }
            "--help" | "-h" => {
                print_help();
                return Ok(());
            }
            _ => {
                eprintln!("Unknown argument: {}", args[i]);
                print_help();
                std::process::exit(1);
            }
        }
        i += 1;
    }

    let log_level = if verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!("MCP Gatekeeper - Stale Session Sweep");

    let config = match config_path {
        Some(path) => {
            info!("Config file: {}", path.display());
            AppConfig::load_from(&path)?
        }
        None => AppConfig::load()?,
    };

    let threshold =
        Duration::from_secs(threshold_secs.unwrap_or(config.sessions.stale_threshold_secs));

    let gatekeeper = Gatekeeper::from_config(&config)
        .await
        .context("Failed to open credential store")?;

    match gatekeeper.sweep_stale_sessions(threshold).await {
        Ok(removed) => {
            info!("Removed {} stale session(s)", removed);
            Ok(())
        }
        Err(e) => {
            error!("Sweep failed: {}", e);
            std::process::exit(1);
        }
    }
}

fn print_help() {
    println!(
        r#"sweep-sessions - remove stale MCP Gatekeeper sessions

USAGE:
    sweep-sessions [OPTIONS]

OPTIONS:
    --config <path>         Path to configuration file
    --threshold-secs <n>    Idle seconds after which a session is stale
    -v, --verbose           Enable verbose output
    -h, --help              Print this help message

EXAMPLE:
    # Cron entry to sweep every 5 minutes
    */5 * * * * /usr/local/bin/sweep-sessions --config /etc/mcp-gatekeeper/config.yaml
"#
    );
}
