//! Structured logger
//!
//! [`Logger`] is a cheap, cloneable handle that stamps entries with the
//! service name and hands them to a [`LogSink`]. It is passed explicitly to
//! whatever needs it (router state, client constructor); there is no global
//! instance.

use std::backtrace::{Backtrace, BacktraceStatus};
use std::collections::BTreeMap;
use std::error::Error as StdError;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use serde_json::{json, Value};

use super::entry::{EventType, Fields, LogEntry, LogLevel};
use super::sink::LogSink;

/// Description of a failure for `error_with_traceback` entries
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailureReport {
    pub exception_type: String,
    pub exception_message: String,
    pub exception_stack: String,
}

impl FailureReport {
    /// Describe an error value: type name, display text, source chain
    pub fn from_error<E: StdError + 'static>(error: &E) -> Self {
        Self::from_dyn(short_type_name(std::any::type_name::<E>()), error)
    }

    /// Describe a type-erased error under an explicit type name
    pub fn from_dyn(type_name: impl Into<String>, error: &(dyn StdError + 'static)) -> Self {
        let mut stack = vec![error.to_string()];
        let mut source = error.source();
        while let Some(cause) = source {
            stack.push(format!("caused by: {}", cause));
            source = cause.source();
        }
        append_backtrace(&mut stack);

        Self {
            exception_type: type_name.into(),
            exception_message: error.to_string(),
            exception_stack: stack.join("\n"),
        }
    }

    /// Describe a panic payload captured by `catch_unwind`
    pub fn from_panic(payload: &(dyn std::any::Any + Send)) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            s.to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "non-string panic payload".to_string()
        };

        let mut stack = vec![format!("panicked: {}", message)];
        append_backtrace(&mut stack);

        Self {
            exception_type: "panic".to_string(),
            exception_message: message,
            exception_stack: stack.join("\n"),
        }
    }
}

fn append_backtrace(stack: &mut Vec<String>) {
    // Only present when RUST_BACKTRACE / RUST_LIB_BACKTRACE enable capture
    let backtrace = Backtrace::capture();
    if backtrace.status() == BacktraceStatus::Captured {
        stack.push(backtrace.to_string());
    }
}

/// `my_crate::module::MyError<T>` -> `MyError`
fn short_type_name(full: &str) -> &str {
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base)
}

/// Milliseconds as a float, for `*_duration_ms` fields
pub fn duration_ms(duration: Duration) -> f64 {
    duration.as_secs_f64() * 1000.0
}

/// Structured, leveled logger bound to one service name
#[derive(Clone)]
pub struct Logger {
    service_name: Arc<str>,
    sink: Arc<dyn LogSink>,
}

impl std::fmt::Debug for Logger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Logger")
            .field("service_name", &self.service_name)
            .finish_non_exhaustive()
    }
}

impl Logger {
    pub fn new(service_name: impl Into<String>, sink: Arc<dyn LogSink>) -> Self {
        let service_name: String = service_name.into();
        Self {
            service_name: Arc::from(service_name),
            sink,
        }
    }

    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    /// Emit an entry at `level`
    pub fn log(&self, level: LogLevel, message: impl Into<String>, fields: Fields) {
        self.emit(level, message.into(), None, fields);
    }

    /// Emit an entry whose fields come from any serializable value.
    ///
    /// If `extra` fails to serialize, or is not a map, the entry still goes
    /// out with a `serialization_error` marker in place of the fields.
    pub fn log_serialized<T: Serialize + ?Sized>(
        &self,
        level: LogLevel,
        message: impl Into<String>,
        extra: &T,
    ) {
        let fields = match serde_json::to_value(extra) {
            Ok(Value::Object(map)) => map,
            Ok(Value::Null) => Fields::new(),
            Ok(other) => {
                let mut fields = Fields::new();
                fields.insert(
                    "serialization_error".into(),
                    json!(format!("expected a map of fields, got {}", value_kind(&other))),
                );
                fields
            }
            Err(err) => {
                let mut fields = Fields::new();
                fields.insert("serialization_error".into(), json!(err.to_string()));
                fields
            }
        };
        self.emit(level, message.into(), None, fields);
    }

    pub fn debug(&self, message: impl Into<String>, fields: Fields) {
        self.log(LogLevel::Debug, message, fields);
    }

    pub fn info(&self, message: impl Into<String>, fields: Fields) {
        self.log(LogLevel::Info, message, fields);
    }

    pub fn warning(&self, message: impl Into<String>, fields: Fields) {
        self.log(LogLevel::Warning, message, fields);
    }

    pub fn error(&self, message: impl Into<String>, fields: Fields) {
        self.log(LogLevel::Error, message, fields);
    }

    /// INFO `api_request` entry
    pub fn log_api_request(
        &self,
        method: &str,
        url: &str,
        headers: &BTreeMap<String, String>,
        extra: Fields,
    ) {
        let mut fields = Fields::new();
        fields.insert("request_method".into(), json!(method));
        fields.insert("request_url".into(), json!(url));
        fields.insert("request_headers".into(), json!(headers));
        fields.extend(extra);

        self.emit(
            LogLevel::Info,
            format!("API Request: {} {}", method, url),
            Some(EventType::ApiRequest),
            fields,
        );
    }

    /// INFO `api_response` entry; `body` is omitted when `None`
    pub fn log_api_response(
        &self,
        method: &str,
        url: &str,
        status_code: u16,
        body: Option<Value>,
        duration: Option<Duration>,
        extra: Fields,
    ) {
        let mut fields = Fields::new();
        fields.insert("request_method".into(), json!(method));
        fields.insert("request_url".into(), json!(url));
        fields.insert("response_status_code".into(), json!(status_code));
        if let Some(body) = body {
            fields.insert("response_body".into(), body);
        }
        if let Some(duration) = duration {
            fields.insert("response_duration_ms".into(), json!(duration_ms(duration)));
        }
        fields.extend(extra);

        self.emit(
            LogLevel::Info,
            format!("API Response: {} {} - {}", method, url, status_code),
            Some(EventType::ApiResponse),
            fields,
        );
    }

    /// ERROR `error_with_traceback` entry describing `error`
    pub fn log_error_with_traceback<E: StdError + 'static>(
        &self,
        message: impl Into<String>,
        error: &E,
        extra: Fields,
    ) {
        self.log_failure(message, &FailureReport::from_error(error), extra);
    }

    /// ERROR `error_with_traceback` entry from a prepared report
    pub fn log_failure(&self, message: impl Into<String>, report: &FailureReport, extra: Fields) {
        let mut fields = Fields::new();
        fields.insert("exception_type".into(), json!(report.exception_type));
        fields.insert("exception_message".into(), json!(report.exception_message));
        fields.insert("exception_stack".into(), json!(report.exception_stack));
        fields.extend(extra);

        self.emit(
            LogLevel::Error,
            message.into(),
            Some(EventType::ErrorWithTraceback),
            fields,
        );
    }

    fn emit(&self, level: LogLevel, message: String, event_type: Option<EventType>, fields: Fields) {
        let entry = LogEntry::new(level, &*self.service_name, message, event_type, fields);
        self.sink.write(&entry);
    }
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
