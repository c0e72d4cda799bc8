//! MCP Gatekeeper - API key authority and session telemetry service
//!
//! Runs the stale-session sweeper against the configured store until
//! interrupted, and offers a handful of key administration commands.

use std::env;

use anyhow::{bail, Context, Result};
use tracing::{info, warn};
use uuid::Uuid;

use config::LogFormat;
use mcp_gatekeeper::services::DEFAULT_REQUIRED_SCOPE;
use mcp_gatekeeper::{config, models::IssueKeyRequest, AppConfig, Gatekeeper};

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let args: Vec<String> = env::args().collect();

    // Check for --help flag
    if args.iter().any(|arg| arg == "--help" || arg == "-h") {
        print_help();
        return Ok(());
    }

    // Check for --version flag
    if args.iter().any(|arg| arg == "--version" || arg == "-V") {
        println!("MCP Gatekeeper {}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    // Load configuration first (before logging, so we know log format)
    let config = AppConfig::load().context("Failed to load configuration")?;

    // The guard must be kept alive for the duration of the program
    // to ensure log messages are flushed to files
    let _log_guard = init_logging(&config);

    ensure_data_directory(&config)?;

    let gatekeeper = Gatekeeper::from_config(&config)
        .await
        .context("Failed to open credential store")?;

    if let Some(command) = AdminCommand::parse(&args[1..])? {
        return command.run(&gatekeeper).await;
    }

    info!("MCP Gatekeeper starting up");
    gatekeeper.start().await;

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for shutdown signal")?;

    info!("Shutdown signal received");
    gatekeeper.stop().await;
    info!("MCP Gatekeeper stopped");
    Ok(())
}

/// One-shot key administration commands
enum AdminCommand {
    Issue {
        organization_id: Uuid,
        name: String,
        scopes: Vec<String>,
        expires_in_days: Option<i64>,
    },
    Rotate(Uuid),
    Revoke(Uuid),
    List(Uuid),
    Check {
        secret: String,
        required_scope: String,
    },
}

impl AdminCommand {
    fn parse(args: &[String]) -> Result<Option<Self>> {
        let Some(flag) = args.first() else {
            return Ok(None);
        };

        let command = match flag.as_str() {
            "--issue-key" => {
                if args.len() < 4 {
                    bail!("Usage: --issue-key <org-id> <name> <scope,scope,...> [days]");
                }
                let expires_in_days = args
                    .get(4)
                    .map(|d| d.parse::<i64>().context("Invalid expiry days"))
                    .transpose()?;
                AdminCommand::Issue {
                    organization_id: parse_uuid(&args[1])?,
                    name: args[2].clone(),
                    scopes: args[3]
                        .split(',')
                        .map(|s| s.trim().to_string())
                        .filter(|s| !s.is_empty())
                        .collect(),
                    expires_in_days,
                }
            }
            "--rotate-key" => AdminCommand::Rotate(parse_uuid(required_arg(args, "key-id")?)?),
            "--revoke-key" => AdminCommand::Revoke(parse_uuid(required_arg(args, "key-id")?)?),
            "--list-keys" => AdminCommand::List(parse_uuid(required_arg(args, "org-id")?)?),
            "--check-key" => AdminCommand::Check {
                secret: required_arg(args, "secret")?.to_string(),
                required_scope: args
                    .get(2)
                    .cloned()
                    .unwrap_or_else(|| DEFAULT_REQUIRED_SCOPE.to_string()),
            },
            other => bail!("Unknown argument: {}", other),
        };
        Ok(Some(command))
    }

    async fn run(self, gatekeeper: &Gatekeeper) -> Result<()> {
        match self {
            AdminCommand::Issue {
                organization_id,
                name,
                scopes,
                expires_in_days,
            } => {
                let mut request = IssueKeyRequest::new(organization_id, name, scopes, "cli");
                request.expires_in_days = expires_in_days;
                let issued = gatekeeper.issue_key(request).await?;
                println!("Key ID:  {}", issued.api_key.id);
                println!("Scopes:  {}", issued.api_key.scopes.join(","));
                println!("Secret:  {}", issued.secret);
                println!();
                println!("Store this secret now; it cannot be shown again.");
            }
            AdminCommand::Rotate(key_id) => {
                let issued = gatekeeper.rotate_key(key_id).await?;
                println!("Rotated {} -> {}", key_id, issued.api_key.id);
                println!("Secret:  {}", issued.secret);
            }
            AdminCommand::Revoke(key_id) => {
                gatekeeper.revoke_key(key_id).await?;
                println!("Revoked {}", key_id);
            }
            AdminCommand::List(organization_id) => {
                let keys = gatekeeper.list_keys(organization_id).await?;
                if keys.is_empty() {
                    warn!(org_id = %organization_id, "No API keys found");
                }
                for key in keys {
                    let status = if key.is_revoked() {
                        "revoked"
                    } else if key.is_expired_at(chrono::Utc::now()) {
                        "expired"
                    } else {
                        "active"
                    };
                    println!(
                        "{}  {:<12}  {:<8}  {:<24}  {}",
                        key.id,
                        key.key_prefix,
                        status,
                        key.name,
                        key.scopes.join(",")
                    );
                }
            }
            AdminCommand::Check {
                secret,
                required_scope,
            } => match gatekeeper.validate_key(&secret, &required_scope).await {
                Ok(decision) => {
                    println!("Granted for '{}'", required_scope);
                    println!("Key:     {} ({})", decision.key_name, decision.api_key_id);
                    println!("Org:     {}", decision.organization_id);
                    println!("Scopes:  {}", decision.scopes.join(","));
                }
                Err(e) if e.is_auth_denial() => {
                    println!("Denied: {}", e);
                    std::process::exit(2);
                }
                Err(e) => return Err(e.into()),
            },
        }
        Ok(())
    }
}

fn required_arg<'a>(args: &'a [String], name: &str) -> Result<&'a str> {
    args.get(1)
        .map(String::as_str)
        .with_context(|| format!("Missing <{}> for {}", name, args[0]))
}

fn parse_uuid(value: &str) -> Result<Uuid> {
    Uuid::parse_str(value).with_context(|| format!("Invalid id: {}", value))
}

/// Initialize logging based on configuration
fn init_logging(config: &AppConfig) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    use config::LogTarget;
    use tracing_subscriber::{prelude::*, EnvFilter};

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    let log_config = &config.logging;

    match &log_config.target {
        LogTarget::Console => {
            let subscriber = tracing_subscriber::registry().with(env_filter);
            init_console_logging(subscriber, &log_config.format);
            None
        }
        LogTarget::File => {
            let (writer, guard) = create_file_writer(log_config);
            let subscriber = tracing_subscriber::registry().with(env_filter);
            init_file_logging(subscriber, &log_config.format, writer);
            Some(guard)
        }
        LogTarget::Both => {
            let (writer, guard) = create_file_writer(log_config);
            let subscriber = tracing_subscriber::registry().with(env_filter);
            init_both_logging(subscriber, &log_config.format, writer);
            Some(guard)
        }
    }
}

/// Create a file writer with optional daily rotation
fn create_file_writer(
    log_config: &config::LoggingConfig,
) -> (
    tracing_appender::non_blocking::NonBlocking,
    tracing_appender::non_blocking::WorkerGuard,
) {
    if let Err(e) = std::fs::create_dir_all(&log_config.log_dir) {
        eprintln!(
            "Warning: Failed to create log directory {:?}: {}",
            log_config.log_dir, e
        );
    }

    let file_appender = if log_config.daily_rotation {
        tracing_appender::rolling::daily(&log_config.log_dir, &log_config.log_prefix)
    } else {
        tracing_appender::rolling::never(&log_config.log_dir, &log_config.log_prefix)
    };

    tracing_appender::non_blocking(file_appender)
}

fn init_console_logging<S>(subscriber: S, format: &LogFormat)
where
    S: tracing::Subscriber + for<'a> tracing_subscriber::registry::LookupSpan<'a> + Send + Sync,
{
    use tracing_subscriber::{fmt, prelude::*};

    match format {
        LogFormat::Json => {
            subscriber
                .with(fmt::layer().json().with_target(true))
                .init();
        }
        LogFormat::Compact => {
            subscriber
                .with(fmt::layer().compact().with_target(false))
                .init();
        }
        LogFormat::Pretty => {
            subscriber
                .with(fmt::layer().with_target(true).with_thread_ids(false))
                .init();
        }
    }
}

fn init_file_logging<S>(
    subscriber: S,
    format: &LogFormat,
    writer: tracing_appender::non_blocking::NonBlocking,
) where
    S: tracing::Subscriber + for<'a> tracing_subscriber::registry::LookupSpan<'a> + Send + Sync,
{
    use tracing_subscriber::{fmt, prelude::*};

    match format {
        LogFormat::Json => {
            subscriber
                .with(fmt::layer().json().with_target(true).with_writer(writer))
                .init();
        }
        LogFormat::Compact => {
            subscriber
                .with(fmt::layer().compact().with_target(false).with_writer(writer))
                .init();
        }
        LogFormat::Pretty => {
            subscriber
                .with(
                    fmt::layer()
                        .with_target(true)
                        .with_ansi(false)
                        .with_writer(writer),
                )
                .init();
        }
    }
}

fn init_both_logging<S>(
    subscriber: S,
    format: &LogFormat,
    writer: tracing_appender::non_blocking::NonBlocking,
) where
    S: tracing::Subscriber + for<'a> tracing_subscriber::registry::LookupSpan<'a> + Send + Sync,
{
    use tracing_subscriber::{fmt, prelude::*};

    match format {
        LogFormat::Json => {
            subscriber
                .with(fmt::layer().json().with_target(true)) // Console
                .with(fmt::layer().json().with_target(true).with_writer(writer)) // File
                .init();
        }
        LogFormat::Compact => {
            subscriber
                .with(fmt::layer().compact().with_target(false)) // Console
                .with(fmt::layer().compact().with_target(false).with_writer(writer)) // File
                .init();
        }
        LogFormat::Pretty => {
            subscriber
                .with(fmt::layer().with_target(true)) // Console
                .with(
                    fmt::layer()
                        .with_target(true)
                        .with_ansi(false)
                        .with_writer(writer),
                ) // File
                .init();
        }
    }
}

/// Ensure the directory holding the SQLite file exists
fn ensure_data_directory(config: &AppConfig) -> Result<()> {
    if config.store != config::StoreBackend::Sqlite {
        return Ok(());
    }
    if let Some(path) = config.database.url.strip_prefix("sqlite://") {
        if let Some(parent) = std::path::Path::new(path).parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).context("Failed to create data directory")?;
                info!("Created data directory: {:?}", parent);
            }
        }
    }
    Ok(())
}

fn print_help() {
    println!(
        r#"MCP Gatekeeper {}

USAGE:
    mcp-gatekeeper [OPTIONS]

With no options the stale-session sweeper runs until Ctrl-C.

OPTIONS:
    -h, --help              Print this help message
    -V, --version           Print version information
    --issue-key <org-id> <name> <scope,scope,...> [days]
                            Issue a key and print its secret once
    --rotate-key <key-id>   Revoke a key and issue a replacement
    --revoke-key <key-id>   Revoke a key
    --list-keys <org-id>    List an organization's keys
    --check-key <secret> [scope]
                            Validate a secret (scope defaults to "mcp")

SCOPES:
    read, execute, write, admin, mcp, mcp:read, mcp:write, mcp:execute

ENVIRONMENT:
    GATEKEEPER_CONFIG       Path to configuration file (default: config.yaml)
    GATEKEEPER_HASH_SECRET  HMAC key for API key hashes (min 32 characters)
    DATABASE_URL            SQLite database URL
    RUST_LOG                Log filter

CONFIGURATION:
    The application looks for configuration files in the following order:
    1. Path specified by GATEKEEPER_CONFIG environment variable
    2. ./config.yaml
    3. ./config/config.yaml
    4. /etc/mcp-gatekeeper/config.yaml"#,
        env!("CARGO_PKG_VERSION")
    );
}
