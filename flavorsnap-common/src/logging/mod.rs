//! Logging for FlavorSnap processes
//!
//! Two layers:
//! - `tracing` for ambient diagnostics (startup, configuration, shutdown),
//!   initialized by [`init_tracing`]
//! - the structured [`Logger`] for API telemetry, built by [`build_logger`]

pub mod entry;
pub mod file_sink;
pub mod logger;
pub mod middleware;
pub mod sink;

use std::sync::Arc;

use tracing_subscriber::EnvFilter;

pub use entry::{EventType, Fields, LogEntry, LogLevel};
pub use file_sink::RotatingFileSink;
pub use logger::{FailureReport, Logger};
pub use middleware::{ObservabilityLayer, ObservabilityService};
pub use sink::{ConsoleSink, FanoutSink, LogSink, MemorySink, TracingSink};

use crate::config::{LogFormat, LoggingConfig, SinkKind};
use crate::Result;

/// Initialize the process `tracing` subscriber.
///
/// `RUST_LOG` wins over the configured level. Safe to call more than once;
/// later calls are no-ops.
pub fn init_tracing(config: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.level));

    let _ = match config.format {
        LogFormat::Json => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .with_timer(tracing_subscriber::fmt::time::SystemTime)
            .with_target(false)
            .try_init(),
        LogFormat::Pretty => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .try_init(),
    };
}

/// Build the structured logger described by `config`.
///
/// The base sink (console or tracing) receives entries at `min_level` and
/// above. With `log_dir` set, `<service>.json` (all levels) and
/// `<service>-errors.json` (ERROR only) are written alongside.
pub fn build_logger(service_name: &str, config: &LoggingConfig) -> Result<Logger> {
    let base: Arc<dyn LogSink> = match config.sink {
        SinkKind::Console => Arc::new(ConsoleSink),
        SinkKind::Tracing => Arc::new(TracingSink),
    };

    let mut fanout = FanoutSink::new().with(config.min_level, base);

    if let Some(dir) = &config.log_dir {
        let main = RotatingFileSink::open(
            dir.join(format!("{}.json", service_name)),
            file_sink::MAIN_FILE_MAX_BYTES,
            file_sink::MAIN_FILE_BACKUPS,
        )?;
        let errors = RotatingFileSink::open(
            dir.join(format!("{}-errors.json", service_name)),
            file_sink::ERROR_FILE_MAX_BYTES,
            file_sink::ERROR_FILE_BACKUPS,
        )?;
        fanout = fanout
            .with(LogLevel::Debug, Arc::new(main))
            .with(LogLevel::Error, Arc::new(errors));
        tracing::info!("Structured logs written to {}", dir.display());
    }

    Ok(Logger::new(service_name, Arc::new(fanout)))
}
