//! flavorsnap-api - upload and prediction service
//!
//! Accepts food photos over multipart POST, validates and stores them, and
//! answers with a prediction. Every request and response is recorded as a
//! structured log entry.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use flavorsnap_api::{build_router, AppState};
use flavorsnap_common::config::load_config;
use flavorsnap_common::logging::{build_logger, init_tracing};
use flavorsnap_common::Fields;
use serde_json::json;
use tokio::signal;
use tracing::{error, info};

const SERVICE_NAME: &str = "flavorsnap-api";

/// Command-line arguments for flavorsnap-api
#[derive(Parser, Debug)]
#[command(name = "flavorsnap-api")]
#[command(about = "FlavorSnap upload and prediction service")]
#[command(version)]
struct Args {
    /// Configuration file (overrides FLAVORSNAP_CONFIG)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Address to listen on
    #[arg(short, long, env = "FLAVORSNAP_BIND")]
    bind: Option<String>,

    /// Directory for stored uploads
    #[arg(long, env = "FLAVORSNAP_UPLOAD_DIR")]
    upload_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = load_config(args.config.as_deref()).context("Failed to load configuration")?;
    if let Some(bind) = args.bind {
        config.server.bind = bind;
    }
    if let Some(upload_dir) = args.upload_dir {
        config.server.upload_dir = upload_dir;
    }

    init_tracing(&config.logging);
    info!("Starting {} v{}", SERVICE_NAME, env!("CARGO_PKG_VERSION"));
    info!("Upload directory: {}", config.server.upload_dir.display());

    let logger = build_logger(SERVICE_NAME, &config.logging)
        .context("Failed to initialize structured logging")?;

    let state = AppState::from_config(&config, logger.clone());
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&config.server.bind)
        .await
        .with_context(|| format!("Failed to bind {}", config.server.bind))?;
    let addr = listener.local_addr()?;
    info!("Listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    let mut fields = Fields::new();
    fields.insert("bind".into(), json!(addr.to_string()));
    logger.info("Server started", fields);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    logger.info("Server stopped", Fields::new());
    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
