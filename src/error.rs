//! Error types for media-dl
//!
//! This module provides the error taxonomy for the library:
//! - Setup errors (configuration, unreadable input, output root) that abort a run
//! - Per-item errors (network, stream, undersized output) that the retry loop handles
//! - Context information (file path, source URL, size threshold)

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for media-dl operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for media-dl
///
/// Each variant includes contextual information to help diagnose issues.
/// Whether a variant aborts the run or only fails a single item depends on
/// where it surfaces: errors during run setup are returned to the caller,
/// errors inside an item's fetch are retried and then reported.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "concurrency")
        key: Option<String>,
    },

    /// Input metadata file does not exist
    #[error("input file not found: {0}")]
    InputNotFound(PathBuf),

    /// CSV parsing or writing failed
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Network error
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// The source answered with a non-success HTTP status
    #[error("HTTP {status} fetching {url}")]
    HttpStatus {
        /// Status code returned by the server
        status: u16,
        /// URL that was requested
        url: String,
    },

    /// The item's source reference cannot be fetched at all
    #[error("invalid source reference: {0}")]
    InvalidSource(String),

    /// Media source failed to produce a stream
    #[error("source error: {0}")]
    Source(String),

    /// Output file was written but is smaller than the validity threshold
    #[error("undersized output {path}: {size} bytes (minimum {min_size})")]
    UndersizedOutput {
        /// The file that failed validation
        path: PathBuf,
        /// Size found on disk
        size: u64,
        /// Configured minimum size
        min_size: u64,
    },

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Build a configuration error for a specific key
    pub fn config(key: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Config {
            message: message.into(),
            key: Some(key.into()),
        }
    }
}
