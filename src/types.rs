//! Core types for media-dl

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::utils::sanitize_filename;

/// One deliverable read from the input metadata
///
/// Field names match the input columns so failed items can be written back
/// out in the same shape.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    /// Collection/owner identifier; becomes the output subdirectory
    pub artist_username: String,
    /// Title; becomes the output file stem
    pub title: String,
    /// Source reference handed to the media source
    pub permalink_url: String,
}

impl Item {
    /// Create a new item
    pub fn new(
        artist_username: impl Into<String>,
        title: impl Into<String>,
        permalink_url: impl Into<String>,
    ) -> Self {
        Self {
            artist_username: artist_username.into(),
            title: title.into(),
            permalink_url: permalink_url.into(),
        }
    }

    /// Sanitized collection directory name
    pub fn collection_dir(&self) -> String {
        sanitize_filename(&self.artist_username)
    }

    /// Sanitized output file name, including the extension
    pub fn file_name(&self, extension: &str) -> String {
        format!("{}.{}", sanitize_filename(&self.title), extension)
    }

    /// Output path of this item under `output_dir`
    pub fn output_path(&self, output_dir: &std::path::Path, extension: &str) -> PathBuf {
        output_dir
            .join(self.collection_dir())
            .join(self.file_name(extension))
    }

    /// Dedup identity of this item
    pub fn cache_key(&self, extension: &str) -> CacheKey {
        CacheKey::new(&self.collection_dir(), &self.file_name(extension))
    }
}

/// Identity of a deliverable: `<collection dir>/<file name>`
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CacheKey(String);

impl CacheKey {
    /// Build a key from an already-sanitized directory and file name
    pub fn new(collection_dir: &str, file_name: &str) -> Self {
        Self(format!("{}/{}", collection_dir, file_name))
    }

    /// Borrow the key as a string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Successful result of one fetch-and-store attempt
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FetchStatus {
    /// Output already present and valid; nothing was fetched
    Skipped,
    /// Output was fetched and passed validation
    Downloaded {
        /// Bytes written to disk
        bytes: u64,
    },
}

/// Final result of an item's full attempt sequence
#[derive(Clone, Debug)]
pub enum Outcome {
    /// Output already present
    Skipped {
        /// The item
        item: Item,
    },
    /// Output fetched in this run
    Downloaded {
        /// The item
        item: Item,
        /// Bytes written
        bytes: u64,
        /// Attempts used, including the successful one
        attempts: u32,
    },
    /// Every attempt failed
    Failed {
        /// The item, kept intact for the failure report
        item: Item,
        /// Message of the last error
        error: String,
        /// Attempts made
        attempts: u32,
    },
}

impl Outcome {
    /// The item this outcome belongs to
    pub fn item(&self) -> &Item {
        match self {
            Outcome::Skipped { item }
            | Outcome::Downloaded { item, .. }
            | Outcome::Failed { item, .. } => item,
        }
    }

    /// Whether the item ended in failure
    pub fn is_failure(&self) -> bool {
        matches!(self, Outcome::Failed { .. })
    }
}

/// Event emitted by the downloader
///
/// Consumers subscribe with [`MediaDownloader::subscribe`](crate::MediaDownloader::subscribe).
#[derive(Clone, Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// Existing-output cache finished scanning
    CacheBuilt {
        /// Number of valid outputs found
        entries: usize,
    },

    /// Item skipped because its output already exists
    ItemSkipped {
        /// Cache key of the item
        key: String,
    },

    /// Item downloaded and validated
    ItemDownloaded {
        /// Cache key of the item
        key: String,
        /// Bytes written
        bytes: u64,
    },

    /// One attempt failed and another will follow
    AttemptFailed {
        /// Cache key of the item
        key: String,
        /// 1-based number of the failed attempt
        attempt: u32,
        /// Error message
        error: String,
    },

    /// Item failed permanently
    ItemFailed {
        /// Cache key of the item
        key: String,
        /// Error message of the last attempt
        error: String,
    },

    /// A batch settled
    BatchCompleted {
        /// Items processed so far
        processed: usize,
        /// Total items in the run
        total: usize,
        /// Progress percentage (0.0 to 100.0)
        percent: f32,
    },

    /// The run finished
    RunCompleted {
        /// Final counts
        summary: RunSummary,
    },
}

/// Final counts of a run
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    /// Items in the input
    pub total: usize,
    /// Items skipped because their output was present
    pub skipped: usize,
    /// Items downloaded in this run
    pub downloaded: usize,
    /// Items that failed permanently
    pub failed: usize,
    /// Location of the error log
    pub error_log: PathBuf,
    /// Location of the failure report, if one was written
    pub failure_report: Option<PathBuf>,
}
