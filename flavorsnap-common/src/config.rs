//! Configuration loading
//!
//! Configuration file resolution priority:
//! 1. Command-line argument (highest priority)
//! 2. `FLAVORSNAP_CONFIG` environment variable
//! 3. `<config dir>/flavorsnap/config.toml` if it exists
//! 4. Built-in defaults (fallback)
//!
//! Every section and key is optional; missing values take their defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::logging::LogLevel;
use crate::validate::{DEFAULT_ACCEPTED_TYPES, DEFAULT_MAX_UPLOAD_BYTES};
use crate::{Error, Result};

/// Environment variable naming the configuration file
pub const CONFIG_ENV_VAR: &str = "FLAVORSNAP_CONFIG";

/// Top-level configuration shared by the service and the client
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FlavorSnapConfig {
    pub logging: LoggingConfig,
    pub upload: UploadConfig,
    pub client: ClientConfig,
    pub server: ServerConfig,
}

/// Output format of ambient `tracing` diagnostics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Where structured log entries go
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SinkKind {
    /// JSON lines on stdout (DEBUG/INFO) and stderr (WARNING/ERROR)
    #[default]
    Console,
    /// Through the `tracing` subscriber
    Tracing,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `tracing` filter directive, overridden by `RUST_LOG`
    pub level: String,
    pub format: LogFormat,
    pub sink: SinkKind,
    /// Minimum level sent to the console/tracing sink
    pub min_level: LogLevel,
    /// Enables rotating JSON log files in this directory
    pub log_dir: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::default(),
            sink: SinkKind::default(),
            min_level: LogLevel::Info,
            log_dir: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UploadConfig {
    pub max_bytes: u64,
    pub accepted_types: Vec<String>,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            max_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            accepted_types: DEFAULT_ACCEPTED_TYPES.iter().map(|s| s.to_string()).collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Candidate classification endpoints in priority order
    pub endpoints: Vec<String>,
    pub max_retries: u32,
    pub retry_delay_ms: u64,
    /// Per-request timeout of the HTTP client
    pub request_timeout_ms: u64,
    /// Deadline for a whole classification, across all endpoints
    pub overall_timeout_ms: Option<u64>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            endpoints: vec![
                "http://127.0.0.1:5000/predict".to_string(),
                "http://127.0.0.1:3000/api/predict".to_string(),
            ],
            max_retries: 1,
            retry_delay_ms: 500,
            request_timeout_ms: 30_000,
            overall_timeout_ms: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
    /// Accepted uploads are stored here
    pub upload_dir: PathBuf,
    /// Label returned by the stub prediction handlers
    pub stub_label: String,
    pub stub_confidence: f64,
    /// CORS origins allowed to call the API; `"*"` allows any
    pub allowed_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:3000".to_string(),
            upload_dir: PathBuf::from("public/uploads"),
            stub_label: "moi moi".to_string(),
            stub_confidence: 0.982,
            allowed_origins: Vec::new(),
        }
    }
}

impl FlavorSnapConfig {
    /// Parse and validate TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: FlavorSnapConfig = toml::from_str(content)
            .map_err(|e| Error::Config(format!("Parse TOML failed: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values no component can work with
    pub fn validate(&self) -> Result<()> {
        if self.upload.max_bytes == 0 {
            return Err(Error::Config("upload.max_bytes must be greater than zero".to_string()));
        }
        if self.upload.accepted_types.is_empty() {
            return Err(Error::Config("upload.accepted_types must not be empty".to_string()));
        }
        if !(0.0..=1.0).contains(&self.server.stub_confidence) {
            return Err(Error::Config(format!(
                "server.stub_confidence must be within [0, 1], got {}",
                self.server.stub_confidence
            )));
        }
        if self.server.stub_label.trim().is_empty() {
            return Err(Error::Config("server.stub_label must not be empty".to_string()));
        }
        if self.client.endpoints.iter().any(|e| e.trim().is_empty()) {
            return Err(Error::Config("client.endpoints must not contain empty URLs".to_string()));
        }
        Ok(())
    }
}

/// Resolve which configuration file to read, if any
pub fn resolve_config_path(cli_arg: Option<&Path>) -> Option<PathBuf> {
    // Priority 1: Command-line argument
    if let Some(path) = cli_arg {
        return Some(path.to_path_buf());
    }

    // Priority 2: Environment variable
    if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
        if !path.trim().is_empty() {
            return Some(PathBuf::from(path));
        }
    }

    // Priority 3: Per-user config file, only if present
    default_config_path().filter(|p| p.exists())
}

/// `<config dir>/flavorsnap/config.toml` for the platform
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("flavorsnap").join("config.toml"))
}

/// Load configuration following the resolution priority.
///
/// An explicitly named file (argument or environment) must exist; the
/// per-user default is optional and falls back to built-in defaults.
pub fn load_config(cli_arg: Option<&Path>) -> Result<FlavorSnapConfig> {
    match resolve_config_path(cli_arg) {
        Some(path) => {
            let content = std::fs::read_to_string(&path).map_err(|e| {
                Error::Config(format!("Read config {} failed: {}", path.display(), e))
            })?;
            let config = FlavorSnapConfig::from_toml_str(&content)?;
            tracing::info!("Configuration loaded from {}", path.display());
            Ok(config)
        }
        None => {
            tracing::info!("No configuration file found, using defaults");
            Ok(FlavorSnapConfig::default())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = FlavorSnapConfig::default();
        assert_eq!(config.client.max_retries, 1);
        assert_eq!(config.client.retry_delay_ms, 500);
        assert_eq!(config.upload.max_bytes, 10 * 1024 * 1024);
        assert!(config.upload.accepted_types.contains(&"image/jpg".to_string()));
        assert_eq!(config.server.stub_label, "moi moi");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let config = FlavorSnapConfig::from_toml_str(
            r#"
            [client]
            endpoints = ["http://a/predict", "http://b/predict"]
            max_retries = 3

            [logging]
            format = "json"
            min_level = "WARNING"
            "#,
        )
        .unwrap();

        assert_eq!(config.client.endpoints.len(), 2);
        assert_eq!(config.client.max_retries, 3);
        assert_eq!(config.client.retry_delay_ms, 500);
        assert_eq!(config.logging.format, LogFormat::Json);
        assert_eq!(config.logging.min_level, LogLevel::Warning);
        assert_eq!(config.server, ServerConfig::default());
    }

    #[test]
    fn test_invalid_confidence_rejected() {
        let err = FlavorSnapConfig::from_toml_str("[server]\nstub_confidence = 1.5\n").unwrap_err();
        assert!(err.to_string().contains("stub_confidence"));
    }

    #[test]
    fn test_malformed_toml_rejected() {
        let err = FlavorSnapConfig::from_toml_str("[client\nendpoints = 3").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_cli_path_takes_priority() {
        let path = Path::new("/tmp/explicit.toml");
        assert_eq!(resolve_config_path(Some(path)), Some(path.to_path_buf()));
    }
}
