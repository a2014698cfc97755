//! Core downloader implementation split into focused submodules.
//!
//! The [`MediaDownloader`] wires one run together:
//! - [`fetch`] - Single fetch-and-store attempt and the retry wrapper
//! - [`scheduler`] - Batching, per-batch concurrency and inter-batch pacing
//! - [`reporter`] - Progress, counts and the failure report

mod fetch;
mod reporter;
mod scheduler;

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
pub(crate) mod test_helpers;
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;

pub use fetch::{FetchUnit, ItemPosition};
pub use reporter::{RunReporter, RunState, write_failure_report};
pub use scheduler::BatchScheduler;

use std::path::Path;
use std::sync::Arc;

use crate::cache::ExistingOutputCache;
use crate::config::Config;
use crate::error::Result;
use crate::error_log::ErrorLog;
use crate::source::{HttpMediaSource, MediaSource};
use crate::types::{Event, Item, RunSummary};
use crate::validator::OutputValidator;

/// Capacity of the event broadcast channel
const EVENT_CHANNEL_CAPACITY: usize = 1000;

/// Bulk downloader for one output tree
///
/// Each call to [`run`](Self::run) scans the output tree afresh, so items
/// completed by an earlier run (in this process or another) are skipped.
#[derive(Clone)]
pub struct MediaDownloader {
    config: Arc<Config>,
    source: Arc<dyn MediaSource>,
    event_tx: tokio::sync::broadcast::Sender<Event>,
}

impl MediaDownloader {
    /// Create a downloader that fetches over HTTP
    pub fn new(config: Config) -> Result<Self> {
        let source = HttpMediaSource::new(&config.source)?;
        Self::with_source(config, Arc::new(source))
    }

    /// Create a downloader with a custom media source
    pub fn with_source(config: Config, source: Arc<dyn MediaSource>) -> Result<Self> {
        config.validate()?;
        let (event_tx, _rx) = tokio::sync::broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Ok(Self {
            config: Arc::new(config),
            source,
            event_tx,
        })
    }

    /// Subscribe to run events
    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<Event> {
        self.event_tx.subscribe()
    }

    /// Active configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Read items from a CSV file and download them
    ///
    /// # Errors
    ///
    /// Only setup failures are returned: unreadable input or an output root
    /// that cannot be created. Item failures end up in the summary.
    pub async fn run_csv(&self, input: &Path) -> Result<RunSummary> {
        let items = crate::input::read_items(input)?;
        self.run(items).await
    }

    /// Download `items`
    ///
    /// # Errors
    ///
    /// Returns an error only if the output root cannot be created.
    pub async fn run(&self, items: Vec<Item>) -> Result<RunSummary> {
        let download = &self.config.download;

        tokio::fs::create_dir_all(&download.output_dir)
            .await
            .map_err(|e| {
                tracing::error!(
                    path = %download.output_dir.display(),
                    error = %e,
                    "Cannot create output directory"
                );
                e
            })?;

        let error_log = Arc::new(ErrorLog::new(self.config.error_log_path()));
        if let Err(e) = error_log.ensure_created() {
            tracing::warn!(
                path = %error_log.path().display(),
                error = %e,
                "Could not create error log"
            );
        }

        let validator = OutputValidator::new(download.min_file_size);
        let cache = Arc::new(ExistingOutputCache::new(&download.output_dir, validator));
        let entries = cache.initialize(&error_log).await;
        self.event_tx.send(Event::CacheBuilt { entries }).ok();

        let unit = FetchUnit {
            source: self.source.clone(),
            cache,
            validator,
            error_log: error_log.clone(),
            event_tx: self.event_tx.clone(),
            output_dir: download.output_dir.clone(),
            extension: download.file_extension.clone(),
            retry: self.config.retry.clone(),
            key_locks: Default::default(),
        };

        let mut reporter = RunReporter::new(
            items.len(),
            error_log,
            self.config.failure_report_path(),
            self.event_tx.clone(),
        );

        tracing::info!(
            items = items.len(),
            source = self.source.name(),
            output_dir = %download.output_dir.display(),
            "Starting run"
        );

        let failed = BatchScheduler::new(&unit)
            .run(
                &items,
                self.config.batch.concurrency,
                self.config.batch.inter_batch_delay,
                &mut reporter,
            )
            .await;
        if !failed.is_empty() {
            tracing::warn!(count = failed.len(), "Items failed to download");
        }

        Ok(reporter.finish())
    }
}
