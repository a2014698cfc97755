//! Append-only error log
//!
//! Every line is `<RFC 3339 timestamp>: <message>`. The file is created with a
//! header line the first time it is opened. Failures to write are reported
//! through `tracing` and otherwise ignored; the log never aborts a run.

use chrono::{SecondsFormat, Utc};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Header written to a freshly created log
pub const ERROR_LOG_HEADER: &str = "Media Download Error Log";

/// Timestamped, append-only text log shared by every task in a run
#[derive(Debug)]
pub struct ErrorLog {
    path: PathBuf,
    // Serializes appends so lines from concurrent tasks never interleave
    write_lock: Mutex<()>,
}

impl ErrorLog {
    /// Create a handle for the log at `path` without touching the filesystem
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    /// Create the log file with its header if it does not exist yet
    ///
    /// The parent directory must already exist.
    pub fn ensure_created(&self) -> std::io::Result<()> {
        if self.path.exists() {
            return Ok(());
        }
        let mut file = std::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&self.path)?;
        writeln!(file, "{}", ERROR_LOG_HEADER)
    }

    /// Location of the log file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one timestamped line
    pub fn log(&self, message: impl AsRef<str>) {
        let line = format_line(message.as_ref());
        if let Err(e) = self.append(&line) {
            tracing::warn!(
                path = %self.path.display(),
                error = %e,
                "Failed to write to error log"
            );
        }
    }

    /// Record an error that ended the run before or outside item processing
    ///
    /// Written only when the log's directory already exists, so a bad output
    /// root is never created just to hold the message. Returns whether a line
    /// was appended.
    pub fn record_fatal(&self, error: &dyn std::fmt::Display) -> bool {
        let parent_exists = self
            .path
            .parent()
            .is_some_and(|dir| dir.as_os_str().is_empty() || dir.is_dir());
        if !parent_exists {
            return false;
        }
        if let Err(e) = self.ensure_created() {
            tracing::warn!(path = %self.path.display(), error = %e, "Failed to create error log");
            return false;
        }
        self.log(format!("Fatal error: {}", error));
        true
    }

    fn append(&self, line: &str) -> std::io::Result<()> {
        let _guard = self
            .write_lock
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        file.write_all(line.as_bytes())
    }
}

fn format_line(message: &str) -> String {
    let timestamp = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);
    // Keep one entry per line even if the message spans several
    let flattened = message.replace(['\r', '\n'], " ");
    format!("{}: {}\n", timestamp, flattened)
}
