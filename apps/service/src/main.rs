mod alerts;
mod commands;
mod config;
mod database;
mod error;
mod monitoring;
mod notify;
mod orchestrator;
mod pool;
mod util;
mod validation;

#[cfg(test)]
mod test_support;

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::config::Config;
use crate::orchestrator::Orchestrator;

/// TCP reachability monitor with chat alerts
#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    /// Path to the TOML config file (created with defaults if missing)
    #[arg(short, long, env = "PORTWATCH_CONFIG")]
    config: Option<PathBuf>,

    /// Load and validate the configuration, print it and exit
    #[arg(long)]
    check_config: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();

    let config = Config::from_config(args.config.as_ref())?;
    logger::init(&config.logging.level, config.logging.log_format()?);

    if let Err(e) = config.validate() {
        error!("Invalid configuration: {}", e);
        return Err(e.into());
    }

    if args.check_config {
        println!("{config}");
        return Ok(());
    }

    info!("Opening database at {}", config.storage.path);
    let pool = pool::open_pool(
        &config.storage.path,
        config.storage.busy_timeout(),
        config.storage.max_connections,
    )
    .await?;

    let token = CancellationToken::new();
    tokio::spawn(shutdown_signal(token.clone()));

    Orchestrator::start(config, pool, token).await
}

/// Cancel `token` on SIGINT or SIGTERM
async fn shutdown_signal(token: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
    token.cancel();
}
