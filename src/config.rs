//! Configuration types for media-dl

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::{path::Path, path::PathBuf, time::Duration};

/// Minimum size of a valid output file (256 KiB)
pub const DEFAULT_MIN_FILE_SIZE: u64 = 256 * 1024;

/// Output tree settings (where files go and what counts as a complete file)
///
/// Used as a nested sub-config within [`Config`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DownloadConfig {
    /// Output root; one subdirectory per collection (default: "./downloaded_files")
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Files smaller than this are treated as truncated or error pages (default: 256 KiB)
    #[serde(default = "default_min_file_size")]
    pub min_file_size: u64,

    /// Extension given to every output file (default: "mp3")
    #[serde(default = "default_extension")]
    pub file_extension: String,

    /// Error log file name, relative to the output root
    #[serde(default = "default_error_log_name")]
    pub error_log_name: String,

    /// Failure report file name, relative to the output root
    #[serde(default = "default_failure_report_name")]
    pub failure_report_name: String,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            min_file_size: default_min_file_size(),
            file_extension: default_extension(),
            error_log_name: default_error_log_name(),
            failure_report_name: default_failure_report_name(),
        }
    }
}

/// Batch pacing settings
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BatchConfig {
    /// Items per batch, which is also the number of fetches in flight (default: 25)
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Pause between consecutive batches (default: 1000 ms)
    #[serde(default = "default_inter_batch_delay", with = "duration_millis_serde")]
    pub inter_batch_delay: Duration,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            inter_batch_delay: default_inter_batch_delay(),
        }
    }
}

/// Retry behavior for a single item
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Total attempts per item, including the first one (default: 3)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Delay after the first failed attempt (default: 1 second)
    #[serde(default = "default_initial_delay", with = "duration_millis_serde")]
    pub initial_delay: Duration,

    /// Maximum delay between attempts (default: 60 seconds)
    #[serde(default = "default_max_delay", with = "duration_millis_serde")]
    pub max_delay: Duration,

    /// Multiplier for exponential backoff (default: 2.0)
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,

    /// Add random jitter to delays (default: false)
    #[serde(default)]
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay: default_initial_delay(),
            max_delay: default_max_delay(),
            backoff_multiplier: default_backoff_multiplier(),
            jitter: false,
        }
    }
}

/// Media source settings
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Client credential appended to every request as `client_id`
    #[serde(default)]
    pub client_id: Option<String>,

    /// Per-request timeout (None = no timeout)
    #[serde(default, with = "optional_duration_millis_serde")]
    pub request_timeout: Option<Duration>,

    /// User-Agent header sent to the source
    #[serde(default)]
    pub user_agent: Option<String>,
}

/// Main configuration for [`MediaDownloader`](crate::MediaDownloader)
///
/// Fixed for the lifetime of a run. Every field has a default, so a config
/// file only needs to name what it changes.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Config {
    /// Output tree settings
    #[serde(default)]
    pub download: DownloadConfig,

    /// Batch pacing
    #[serde(default)]
    pub batch: BatchConfig,

    /// Retry behavior
    #[serde(default)]
    pub retry: RetryConfig,

    /// Media source settings
    #[serde(default)]
    pub source: SourceConfig,
}

impl Config {
    /// Load a configuration from a JSON file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| Error::Config {
            message: format!("cannot read config file {}: {}", path.display(), e),
            key: None,
        })?;
        let config: Config = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Check that the settings describe a runnable configuration
    pub fn validate(&self) -> Result<()> {
        if self.batch.concurrency == 0 {
            return Err(Error::config("concurrency", "must be at least 1"));
        }
        if self.retry.max_attempts == 0 {
            return Err(Error::config("max_attempts", "must be at least 1"));
        }
        if self.retry.backoff_multiplier < 1.0 {
            return Err(Error::config(
                "backoff_multiplier",
                format!("must be >= 1.0, got {}", self.retry.backoff_multiplier),
            ));
        }
        if self.download.file_extension.is_empty()
            || self.download.file_extension.contains(['/', '\\', '.'])
        {
            return Err(Error::config(
                "file_extension",
                format!("invalid extension '{}'", self.download.file_extension),
            ));
        }
        if self.download.error_log_name.is_empty() || self.download.failure_report_name.is_empty()
        {
            return Err(Error::config(
                "error_log_name",
                "log and report file names must not be empty",
            ));
        }
        Ok(())
    }

    /// Full path of the append-only error log
    pub fn error_log_path(&self) -> PathBuf {
        self.download.output_dir.join(&self.download.error_log_name)
    }

    /// Full path of the failure report
    pub fn failure_report_path(&self) -> PathBuf {
        self.download
            .output_dir
            .join(&self.download.failure_report_name)
    }
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("./downloaded_files")
}

fn default_min_file_size() -> u64 {
    DEFAULT_MIN_FILE_SIZE
}

fn default_extension() -> String {
    "mp3".to_string()
}

fn default_error_log_name() -> String {
    "download_errors.log".to_string()
}

fn default_failure_report_name() -> String {
    "failed_tracks.csv".to_string()
}

fn default_concurrency() -> usize {
    25
}

fn default_inter_batch_delay() -> Duration {
    Duration::from_millis(1000)
}

fn default_max_attempts() -> u32 {
    3
}

fn default_initial_delay() -> Duration {
    Duration::from_secs(1)
}

fn default_max_delay() -> Duration {
    Duration::from_secs(60)
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

// Durations are written as whole milliseconds
mod duration_millis_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

mod optional_duration_millis_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match duration {
            Some(d) => serializer.serialize_some(&(d.as_millis() as u64)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = Option::<u64>::deserialize(deserializer)?;
        Ok(millis.map(Duration::from_millis))
    }
}
