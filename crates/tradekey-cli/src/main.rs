//! tradekey - trading session provisioning entry point.

use std::path::Path;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::{info, warn};

/// Provision a trading session: smart wallet, API credentials, approvals.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Configuration file path (can also be set via TRADEKEY_CONFIG env var)
    #[arg(short, long)]
    config: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Deploy, authenticate and approve until the session is trade-ready
    Init,
    /// Report live deployment and approval state without changing anything
    Status,
    /// Forget the cached session
    End,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Determine config path: CLI arg > TRADEKEY_CONFIG env var > default
    let config_path = args
        .config
        .or_else(|| std::env::var("TRADEKEY_CONFIG").ok())
        .unwrap_or_else(|| "config/default.toml".to_string());

    let config_found = Path::new(&config_path).exists();
    let config = if config_found {
        tradekey_cli::AppConfig::from_file(&config_path)?
    } else {
        tradekey_cli::AppConfig::default()
    };

    tradekey_telemetry::init_logging(&config.logging)?;
    info!("Starting tradekey v{}", env!("CARGO_PKG_VERSION"));
    if config_found {
        info!(config_path = %config_path, "Configuration loaded");
    } else {
        warn!(path = %config_path, "Config file not found, using defaults");
    }

    let app = tradekey_cli::Application::new(config)?;

    match args.command {
        Command::Init => {
            let summary = app.init().await?;
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
        Command::Status => {
            let summary = app.status().await?;
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
        Command::End => {
            app.end();
            println!("Session ended for {}", app.eoa());
        }
    }

    Ok(())
}
