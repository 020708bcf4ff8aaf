//! flavorsnap-classify - classify a food photo from the command line
//!
//! Validates the image locally, sends it to the configured classification
//! endpoints with retries and fallback, and prints the ranked predictions.
//! Ctrl+C cancels the in-flight request.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use flavorsnap_client::detect::load_upload;
use flavorsnap_client::{ClassifyError, ResilientClient};
use flavorsnap_common::config::{load_config, LoggingConfig};
use flavorsnap_common::logging::{build_logger, init_tracing};
use flavorsnap_common::{LogLevel, PredictionResult};
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Runners-up printed below the top prediction
const RUNNERS_UP: usize = 4;

/// Command-line arguments for flavorsnap-classify
#[derive(Parser, Debug)]
#[command(name = "flavorsnap-classify")]
#[command(about = "Classify a food photo with the FlavorSnap service")]
#[command(version)]
struct Args {
    /// Image file to classify
    file: PathBuf,

    /// Configuration file (overrides FLAVORSNAP_CONFIG)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Classification endpoint; repeat to build a fallback list
    #[arg(short, long = "endpoint", env = "FLAVORSNAP_ENDPOINTS", value_delimiter = ',')]
    endpoints: Vec<String>,

    /// Retries per endpoint after a network failure
    #[arg(long)]
    max_retries: Option<u32>,

    /// Delay between retries in milliseconds
    #[arg(long)]
    retry_delay_ms: Option<u64>,

    /// Give up on the whole classification after this many milliseconds
    #[arg(long)]
    timeout_ms: Option<u64>,

    /// Re-run the whole classification up to this many times after a failure
    #[arg(long, default_value = "0")]
    repeat: u32,

    /// Keep DEBUG/INFO telemetry on the console (it shares stdout with the results)
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let args = Args::parse();

    let mut config = load_config(args.config.as_deref()).context("Failed to load configuration")?;
    if !args.endpoints.is_empty() {
        config.client.endpoints = args.endpoints.clone();
    }
    if let Some(max_retries) = args.max_retries {
        config.client.max_retries = max_retries;
    }
    if let Some(delay) = args.retry_delay_ms {
        config.client.retry_delay_ms = delay;
    }
    if let Some(timeout) = args.timeout_ms {
        config.client.overall_timeout_ms = Some(timeout);
    }

    config.logging = console_logging(config.logging, args.verbose);

    init_tracing(&config.logging);
    debug!(endpoints = ?config.client.endpoints, "Configuration loaded");

    let logger = build_logger("flavorsnap-client", &config.logging)
        .context("Failed to initialize structured logging")?;
    let client = ResilientClient::from_config(&config, logger)?;

    let upload = load_upload(&args.file)
        .await
        .with_context(|| format!("Failed to read {}", args.file.display()))?;
    info!(
        file = %upload.file_name,
        content_type = %upload.content_type,
        size = upload.size(),
        "Classifying image"
    );

    let cancel = CancellationToken::new();
    let on_ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if signal::ctrl_c().await.is_ok() {
            info!("Received Ctrl+C, cancelling");
            on_ctrl_c.cancel();
        }
    });

    let mut runs_left = args.repeat;
    loop {
        match client
            .classify(Some(&upload), &config.client.endpoints, &cancel)
            .await
        {
            Ok(result) => {
                print_predictions(&result);
                return Ok(ExitCode::SUCCESS);
            }
            Err(err) if err.is_cancelled() => {
                eprintln!("Cancelled");
                return Ok(ExitCode::from(130));
            }
            Err(err) if err.is_retryable() && runs_left > 0 => {
                runs_left -= 1;
                eprintln!("{} (retrying, {} left)", err, runs_left);
            }
            Err(err) => {
                report_failure(&err);
                return Ok(ExitCode::FAILURE);
            }
        }
    }
}

/// Console telemetry below WARNING is dropped unless `verbose`, so stdout
/// carries only predictions. Log files keep every level; `RUST_LOG` still
/// overrides the `tracing` filter.
fn console_logging(mut logging: LoggingConfig, verbose: bool) -> LoggingConfig {
    if verbose {
        return logging;
    }
    if logging.min_level < LogLevel::Warning {
        logging.min_level = LogLevel::Warning;
    }
    logging.level = "warn".to_string();
    logging
}

fn print_predictions(result: &PredictionResult) {
    let Some(top) = result.top() else {
        return;
    };
    println!("{}", top);
    for item in result.runners_up(RUNNERS_UP) {
        println!("  {}", item);
    }
}

fn report_failure(err: &ClassifyError) {
    match err {
        ClassifyError::Validation(reason) => eprintln!("Rejected: {}", reason),
        other => eprintln!("Classification failed: {}", other),
    }
}
