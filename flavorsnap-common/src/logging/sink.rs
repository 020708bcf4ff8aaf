//! Log sinks
//!
//! A sink receives fully built [`LogEntry`] values. Sinks are shared between
//! concurrent requests, so each implementation writes an entry atomically and
//! never reports failure back to the caller.

use std::io::Write;
use std::sync::{Arc, Mutex};

use super::entry::{EventType, LogEntry, LogLevel};

/// Destination for structured log entries
pub trait LogSink: Send + Sync {
    fn write(&self, entry: &LogEntry);
}

/// Standard stream selected for a console entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsoleChannel {
    Stdout,
    Stderr,
}

impl ConsoleChannel {
    /// DEBUG/INFO go to stdout, WARNING/ERROR to stderr
    pub fn for_level(level: LogLevel) -> Self {
        match level {
            LogLevel::Debug | LogLevel::Info => ConsoleChannel::Stdout,
            LogLevel::Warning | LogLevel::Error => ConsoleChannel::Stderr,
        }
    }
}

/// Writes one JSON line per entry to stdout or stderr depending on level
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleSink;

impl LogSink for ConsoleSink {
    fn write(&self, entry: &LogEntry) {
        let line = entry.to_json_line();
        // Holding the stream lock keeps each line whole under concurrent writers
        let _ = match ConsoleChannel::for_level(entry.level()) {
            ConsoleChannel::Stdout => writeln!(std::io::stdout().lock(), "{}", line),
            ConsoleChannel::Stderr => writeln!(std::io::stderr().lock(), "{}", line),
        };
    }
}

/// Forwards entries to the process `tracing` subscriber
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

pub const STRUCTURED_TARGET: &str = "flavorsnap::structured";

impl LogSink for TracingSink {
    fn write(&self, entry: &LogEntry) {
        let line = entry.to_json_line();
        match entry.level() {
            LogLevel::Debug => tracing::debug!(target: STRUCTURED_TARGET, "{}", line),
            LogLevel::Info => tracing::info!(target: STRUCTURED_TARGET, "{}", line),
            LogLevel::Warning => tracing::warn!(target: STRUCTURED_TARGET, "{}", line),
            LogLevel::Error => tracing::error!(target: STRUCTURED_TARGET, "{}", line),
        }
    }
}

/// Dispatches each entry to several sinks, each with its own minimum level
#[derive(Default, Clone)]
pub struct FanoutSink {
    targets: Vec<(LogLevel, Arc<dyn LogSink>)>,
}

impl FanoutSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a sink receiving entries at `min_level` and above
    pub fn with(mut self, min_level: LogLevel, sink: Arc<dyn LogSink>) -> Self {
        self.targets.push((min_level, sink));
        self
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }
}

impl LogSink for FanoutSink {
    fn write(&self, entry: &LogEntry) {
        for (min_level, sink) in &self.targets {
            if entry.level() >= *min_level {
                sink.write(entry);
            }
        }
    }
}

/// Keeps entries in memory
///
/// Used by tests to assert on emitted telemetry.
#[derive(Debug, Default)]
pub struct MemorySink {
    entries: Mutex<Vec<LogEntry>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all captured entries in emission order
    pub fn entries(&self) -> Vec<LogEntry> {
        self.lock().clone()
    }

    /// Captured entries carrying the given event tag
    pub fn with_event(&self, event_type: EventType) -> Vec<LogEntry> {
        self.lock()
            .iter()
            .filter(|e| e.event_type() == Some(event_type))
            .cloned()
            .collect()
    }

    /// Captured entries whose message contains `pattern`
    pub fn matching(&self, pattern: &str) -> Vec<LogEntry> {
        self.lock()
            .iter()
            .filter(|e| e.message().contains(pattern))
            .cloned()
            .collect()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<LogEntry>> {
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl LogSink for MemorySink {
    fn write(&self, entry: &LogEntry) {
        self.lock().push(entry.clone());
    }
}
