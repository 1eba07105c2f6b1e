//! Kanvert command-line interface.
//!
//! ```bash
//! kanvert serve -H 127.0.0.1 -p 8000
//! kanvert mcp
//! kanvert formats --format json
//! kanvert health -c kanvert.toml
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::{EnvFilter, fmt};

use kanvert::core::{LogFormat, Settings};
use kanvert::service::KanvertContext;
use kanvert::types::HealthStatus;

#[derive(Parser, Debug)]
#[command(name = "kanvert", author, version, about = "Document conversion service", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP API server
    Serve {
        /// Host to bind (overrides settings)
        #[arg(short = 'H', long)]
        host: Option<String>,
        /// Port to bind (overrides settings)
        #[arg(short, long)]
        port: Option<u16>,
        /// Settings file (default: discover kanvert.toml)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
    /// Start the MCP server on stdio
    Mcp {
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
    /// List supported formats and converters
    Formats {
        #[arg(short, long)]
        config: Option<PathBuf>,
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },
    /// Check converter health; exits non-zero when no converter is healthy
    Health {
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

fn load_settings(config: Option<&Path>) -> Result<Settings> {
    Settings::load(config).with_context(|| match config {
        Some(path) => format!("Failed to load settings from {}", path.display()),
        None => "Failed to load settings".to_string(),
    })
}

/// Install the global subscriber. RUST_LOG overrides the configured level.
///
/// Logs go to stderr so that MCP stdio traffic on stdout stays clean.
fn init_logging(settings: &Settings) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&settings.log_level));

    match settings.log_format {
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(filter)
                .with_target(true)
                .with_writer(std::io::stderr)
                .init();
        }
        LogFormat::Text => {
            fmt()
                .with_env_filter(filter)
                .with_target(true)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

fn context(settings: Settings) -> Result<Arc<KanvertContext>> {
    Ok(Arc::new(
        KanvertContext::initialize(settings).context("Failed to initialize converters")?,
    ))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Serve { host, port, config } => {
            let mut settings = load_settings(config.as_deref())?;
            if let Some(host) = host {
                settings.host = host;
            }
            if let Some(port) = port {
                settings.port = port;
            }
            init_logging(&settings);

            tracing::info!(
                environment = %settings.environment,
                version = %settings.app_version,
                "Starting {}",
                settings.app_name
            );
            kanvert::api::serve_with_context(context(settings)?).await?;
        }
        Command::Mcp { config } => {
            let settings = load_settings(config.as_deref())?;
            init_logging(&settings);

            if !settings.mcp_enabled {
                bail!("MCP is disabled (set mcp_enabled = true or KANVERT_MCP_ENABLED=true)");
            }
            kanvert::mcp::start_mcp_server_with_context(context(settings)?)
                .await
                .map_err(|e| anyhow::anyhow!("MCP server error: {}", e))?;
        }
        Command::Formats { config, format } => {
            let settings = load_settings(config.as_deref())?;
            init_logging(&settings);
            let context = context(settings)?;

            let formats = context.supported_formats().await;
            let converters = context.list_converters().await;
            match format {
                OutputFormat::Json => {
                    let payload = serde_json::json!({
                        "supported_formats": formats,
                        "converters": converters,
                    });
                    println!("{}", serde_json::to_string_pretty(&payload)?);
                }
                OutputFormat::Text => {
                    let names: Vec<&str> = formats.iter().map(|f| f.as_str()).collect();
                    println!("Supported formats: {}", names.join(", "));
                    for converter in &converters {
                        let produced: Vec<&str> = converter.supported_formats.iter().map(|f| f.as_str()).collect();
                        println!(
                            "  {:<16} [{}] {}",
                            converter.name,
                            produced.join(", "),
                            converter.description
                        );
                    }
                }
            }
        }
        Command::Health { config } => {
            let settings = load_settings(config.as_deref())?;
            init_logging(&settings);
            let context = context(settings)?;

            let registry = context.health_check().await;
            let payload = serde_json::json!({
                "registry": registry,
                "plugins": context.plugin_health().await,
                "config": context.config_health().await,
            });
            println!("{}", serde_json::to_string_pretty(&payload)?);

            if registry.status == HealthStatus::Unhealthy {
                bail!("No healthy converters available");
            }
        }
    }

    Ok(())
}
