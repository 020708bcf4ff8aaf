//! Structured log records
//!
//! A [`LogEntry`] is built once at emission time and never mutated. It
//! serializes to a single JSON object with the stable keys `timestamp`,
//! `level`, `logger`, `message` and (when tagged) `event_type`, followed by
//! any contextual fields.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize, Serializer};
use serde_json::{json, Map, Value};

/// Open set of contextual fields attached to a log entry
pub type Fields = Map<String, Value>;

/// Keys owned by the entry itself; colliding field keys are re-keyed.
const RESERVED_KEYS: [&str; 5] = ["timestamp", "level", "logger", "message", "event_type"];

/// Substituted for an empty message
const EMPTY_MESSAGE: &str = "(empty message)";

/// Severity of a log entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogLevel {
    Debug,
    Info,
    Warning,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Debug => "DEBUG",
            LogLevel::Info => "INFO",
            LogLevel::Warning => "WARNING",
            LogLevel::Error => "ERROR",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "debug" | "trace" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warn" | "warning" => Ok(LogLevel::Warning),
            "error" | "critical" => Ok(LogLevel::Error),
            other => Err(format!("unknown log level '{}'", other)),
        }
    }
}

/// Tag identifying API telemetry entries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    ApiRequest,
    ApiResponse,
    ErrorWithTraceback,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::ApiRequest => "api_request",
            EventType::ApiResponse => "api_response",
            EventType::ErrorWithTraceback => "error_with_traceback",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Immutable structured log record
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LogEntry {
    #[serde(serialize_with = "serialize_timestamp")]
    timestamp: DateTime<Utc>,
    level: LogLevel,
    logger: String,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    event_type: Option<EventType>,
    #[serde(flatten)]
    fields: Fields,
}

impl LogEntry {
    /// Build an entry stamped with the current time
    pub fn new(
        level: LogLevel,
        logger: impl Into<String>,
        message: impl Into<String>,
        event_type: Option<EventType>,
        fields: Fields,
    ) -> Self {
        let message = message.into();
        let message = if message.trim().is_empty() {
            EMPTY_MESSAGE.to_string()
        } else {
            message
        };

        Self {
            timestamp: Utc::now(),
            level,
            logger: logger.into(),
            message,
            event_type,
            fields: rekey_reserved(fields),
        }
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn level(&self) -> LogLevel {
        self.level
    }

    pub fn logger(&self) -> &str {
        &self.logger
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn event_type(&self) -> Option<EventType> {
        self.event_type
    }

    pub fn fields(&self) -> &Fields {
        &self.fields
    }

    /// Look up a contextual field
    pub fn field(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// Serialize to one JSON line.
    ///
    /// Never fails: if the full entry cannot be serialized, a minimal record
    /// carrying the message and a `serialization_error` marker is produced.
    pub fn to_json_line(&self) -> String {
        match serde_json::to_string(self) {
            Ok(line) => line,
            Err(err) => json!({
                "timestamp": format_timestamp(&self.timestamp),
                "level": self.level.as_str(),
                "logger": self.logger,
                "message": self.message,
                "serialization_error": err.to_string(),
            })
            .to_string(),
        }
    }
}

fn rekey_reserved(fields: Fields) -> Fields {
    if !fields.keys().any(|k| RESERVED_KEYS.contains(&k.as_str())) {
        return fields;
    }

    let mut reserved = Vec::new();
    let mut out = Fields::new();
    for (key, value) in fields {
        if RESERVED_KEYS.contains(&key.as_str()) {
            reserved.push((key, value));
        } else {
            out.insert(key, value);
        }
    }

    // `level` next to an existing `field_level` becomes `field_field_level`
    for (key, value) in reserved {
        let mut renamed = format!("field_{}", key);
        while out.contains_key(&renamed) {
            renamed = format!("field_{}", renamed);
        }
        out.insert(renamed, value);
    }
    out
}

fn format_timestamp(timestamp: &DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn serialize_timestamp<S: Serializer>(
    timestamp: &DateTime<Utc>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&format_timestamp(timestamp))
}
