//! Miner manager: serves mining device telemetry as Influx line protocol.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tokio::sync::watch;
use tracing::{error, info};

use miner_manager::{HttpServer, ManagerConfig, Poller, TargetStore};

/// Polls mining devices and serves their telemetry to Telegraf.
#[derive(Parser, Debug)]
#[command(name = "miner-manager")]
#[command(about = "Serve mining device telemetry as Influx line protocol")]
#[command(version)]
struct Args {
    /// Path to configuration file (JSON5 format).
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// HTTP listen address (overrides config).
    #[arg(long)]
    listen: Option<String>,

    /// Target list file (overrides config).
    #[arg(long)]
    targets: Option<PathBuf>,

    /// Override log level (trace, debug, info, warn, error).
    #[arg(long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Load configuration
    let mut config = match &args.config {
        Some(path) => ManagerConfig::load_from_file(path)
            .with_context(|| format!("Failed to load config from {:?}", path))?,
        None => ManagerConfig::default(),
    };

    if let Some(listen) = args.listen {
        config.server.listen = listen;
    }
    if let Some(targets) = args.targets {
        config.targets.path = targets;
    }
    if let Some(level) = args.log_level {
        config.logging.level = level;
    }
    config.validate()?;

    miner_manager_common::init_tracing(&config.logging)
        .map_err(|e| anyhow::anyhow!("Failed to init tracing: {}", e))?;

    info!("Starting miner-manager");

    let targets = Arc::new(
        TargetStore::open(&config.targets.path, &config.targets.defaults).with_context(|| {
            format!(
                "Failed to open target list {}",
                config.targets.path.display()
            )
        })?,
    );
    let poller = Arc::new(Poller::new(&config.poller)?);

    info!(
        targets = %targets.path().display(),
        timeout_secs = config.poller.timeout_secs,
        concurrency = poller.concurrency(),
        "Poller ready"
    );

    let listen_addr: SocketAddr = config
        .server
        .listen
        .parse()
        .map_err(|e| anyhow::anyhow!("Invalid listen address: {}", e))?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let http_server = HttpServer::new(
        poller,
        targets,
        listen_addr,
        config.server.metrics_path.clone(),
    );
    let mut http_task = tokio::spawn(http_server.run(shutdown_rx));

    // Wait for shutdown signal, or for the server to stop on its own
    // (including a failed bind)
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down...");
        }
        _ = terminate() => {
            info!("Received SIGTERM, shutting down...");
        }
        result = &mut http_task => {
            let err = match result {
                Ok(Ok(())) => anyhow::anyhow!("HTTP server stopped unexpectedly"),
                Ok(Err(e)) => e,
                Err(e) => anyhow::anyhow!("HTTP server task failed: {}", e),
            };
            error!(error = %err, "HTTP server exited");
            return Err(err);
        }
    }

    shutdown_tx.send(true)?;

    match tokio::time::timeout(Duration::from_secs(5), http_task).await {
        Ok(Ok(Err(e))) => error!(error = %e, "HTTP server error during shutdown"),
        Ok(Err(e)) => error!(error = %e, "HTTP server task failed"),
        Err(_) => error!("HTTP server did not stop within 5s"),
        Ok(Ok(Ok(()))) => {}
    }

    info!("miner-manager stopped");
    Ok(())
}

/// Resolve when the process receives SIGTERM.
#[cfg(unix)]
async fn terminate() {
    match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
        Ok(mut sigterm) => {
            sigterm.recv().await;
        }
        Err(e) => {
            error!("Failed to install SIGTERM handler: {}", e);
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(not(unix))]
async fn terminate() {
    std::future::pending::<()>().await;
}
