//! # FlavorSnap Common Library
//!
//! Shared code for the FlavorSnap upload service and classification client:
//! - Structured logging (log entries, sinks, observability middleware)
//! - Prediction payload normalization
//! - Upload validation
//! - Configuration loading

pub mod config;
pub mod error;
pub mod logging;
pub mod normalize;
pub mod validate;

pub use error::{Error, Result};
pub use logging::{EventType, Fields, LogEntry, LogLevel, LogSink, Logger, ObservabilityLayer};
pub use normalize::{normalize, PredictionItem, PredictionResult};
pub use validate::{UploadFile, UploadValidator, ValidationError};
