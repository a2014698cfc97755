//! Output file validation
//!
//! A stored file is accepted only when it is at least `min_file_size` bytes.
//! Truncated streams and HTML error pages saved in place of media fall below
//! the threshold and are treated as absent.

use std::path::Path;

/// Size-threshold check for stored outputs
#[derive(Clone, Copy, Debug)]
pub struct OutputValidator {
    min_file_size: u64,
}

impl OutputValidator {
    /// Create a validator accepting files of at least `min_file_size` bytes
    pub fn new(min_file_size: u64) -> Self {
        Self { min_file_size }
    }

    /// Configured threshold in bytes
    pub fn min_file_size(&self) -> u64 {
        self.min_file_size
    }

    /// Whether a file of `size` bytes is acceptable
    pub fn accepts_size(&self, size: u64) -> bool {
        size >= self.min_file_size
    }

    /// Size of the file at `path` if it is a regular file
    ///
    /// Missing paths and directories yield `None`; this never fails.
    pub async fn file_size(&self, path: &Path) -> Option<u64> {
        match tokio::fs::metadata(path).await {
            Ok(meta) if meta.is_file() => Some(meta.len()),
            _ => None,
        }
    }

    /// Whether `path` holds a complete output
    pub async fn is_valid(&self, path: &Path) -> bool {
        self.file_size(path)
            .await
            .is_some_and(|size| self.accepts_size(size))
    }
}
