//! Size-rotated JSON line files
//!
//! `<name>.json` is the live file; when a write would push it past
//! `max_bytes` it is shifted to `<name>.json.1`, older backups move up one
//! slot and the oldest beyond `backups` is discarded.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use super::entry::LogEntry;
use super::sink::LogSink;

/// Main structured log file: 10 MB, 5 backups
pub const MAIN_FILE_MAX_BYTES: u64 = 10 * 1024 * 1024;
pub const MAIN_FILE_BACKUPS: usize = 5;

/// Error-only log file: 5 MB, 3 backups
pub const ERROR_FILE_MAX_BYTES: u64 = 5 * 1024 * 1024;
pub const ERROR_FILE_BACKUPS: usize = 3;

struct OpenFile {
    file: File,
    written: u64,
}

/// Appends JSON lines to a file with size-based rotation
pub struct RotatingFileSink {
    path: PathBuf,
    max_bytes: u64,
    backups: usize,
    state: Mutex<OpenFile>,
}

impl RotatingFileSink {
    /// Open (or create) the live file, creating parent directories as needed
    pub fn open(path: impl Into<PathBuf>, max_bytes: u64, backups: usize) -> io::Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let state = open_append(&path)?;

        Ok(Self {
            path,
            max_bytes,
            backups,
            state: Mutex::new(state),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Path of the n-th backup (1 = most recent)
    pub fn backup_path(&self, n: usize) -> PathBuf {
        let mut name = self.path.as_os_str().to_owned();
        name.push(format!(".{}", n));
        PathBuf::from(name)
    }

    fn append(&self, line: &str) -> io::Result<()> {
        let mut state = self.state.lock().unwrap_or_else(|p| p.into_inner());
        let len = line.len() as u64 + 1;

        if state.written > 0 && state.written + len > self.max_bytes {
            self.rotate()?;
            *state = open_fresh(&self.path)?;
        }

        writeln!(state.file, "{}", line)?;
        state.written += len;
        Ok(())
    }

    fn rotate(&self) -> io::Result<()> {
        if self.backups == 0 {
            return Ok(());
        }

        let oldest = self.backup_path(self.backups);
        if oldest.exists() {
            fs::remove_file(&oldest)?;
        }
        for n in (1..self.backups).rev() {
            let from = self.backup_path(n);
            if from.exists() {
                fs::rename(&from, self.backup_path(n + 1))?;
            }
        }
        fs::rename(&self.path, self.backup_path(1))
    }
}

fn open_append(path: &Path) -> io::Result<OpenFile> {
    let file = OpenOptions::new().create(true).append(true).open(path)?;
    let written = file.metadata()?.len();
    Ok(OpenFile { file, written })
}

fn open_fresh(path: &Path) -> io::Result<OpenFile> {
    let file = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(path)?;
    Ok(OpenFile { file, written: 0 })
}

impl LogSink for RotatingFileSink {
    fn write(&self, entry: &LogEntry) {
        if let Err(e) = self.append(&entry.to_json_line()) {
            tracing::warn!(path = %self.path.display(), "Failed to write log file: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::entry::{Fields, LogLevel};

    fn entry(message: &str) -> LogEntry {
        LogEntry::new(LogLevel::Info, "test", message, None, Fields::new())
    }

    #[test]
    fn test_appends_json_lines() {
        let dir = tempfile::tempdir().unwrap();
        let sink = RotatingFileSink::open(dir.path().join("svc.json"), 1024 * 1024, 2).unwrap();

        sink.write(&entry("one"));
        sink.write(&entry("two"));

        let content = fs::read_to_string(sink.path()).unwrap();
        let lines: Vec<_> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        let second: serde_json::Value = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(second["message"], "two");
    }

    #[test]
    fn test_rotates_when_full() {
        let dir = tempfile::tempdir().unwrap();
        let line_len = entry("x").to_json_line().len() as u64 + 1;
        // Room for exactly two lines per file
        let sink = RotatingFileSink::open(dir.path().join("svc.json"), line_len * 2, 2).unwrap();

        for _ in 0..7 {
            sink.write(&entry("x"));
        }

        assert!(sink.path().exists());
        assert!(sink.backup_path(1).exists());
        assert!(sink.backup_path(2).exists());
        assert!(!sink.backup_path(3).exists());

        let live = fs::read_to_string(sink.path()).unwrap();
        assert_eq!(live.lines().count(), 1);
        let newest_backup = fs::read_to_string(sink.backup_path(1)).unwrap();
        assert_eq!(newest_backup.lines().count(), 2);
    }

    #[test]
    fn test_no_backups_truncates() {
        let dir = tempfile::tempdir().unwrap();
        let line_len = entry("x").to_json_line().len() as u64 + 1;
        let sink = RotatingFileSink::open(dir.path().join("svc.json"), line_len, 0).unwrap();

        sink.write(&entry("x"));
        sink.write(&entry("x"));

        assert_eq!(fs::read_to_string(sink.path()).unwrap().lines().count(), 1);
        assert!(!sink.backup_path(1).exists());
    }

    #[test]
    fn test_creates_parent_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("logs").join("svc.json");
        let sink = RotatingFileSink::open(&path, 1024, 1).unwrap();
        sink.write(&entry("hello"));
        assert!(path.exists());
    }
}
