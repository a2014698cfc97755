//! Fetch-and-store unit: one item, one attempt, plus the retry wrapper around it.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use futures::StreamExt;
use tokio::io::AsyncWriteExt;

use crate::cache::ExistingOutputCache;
use crate::config::RetryConfig;
use crate::error::{Error, Result};
use crate::error_log::ErrorLog;
use crate::retry::download_with_retry_notify;
use crate::source::MediaSource;
use crate::types::{CacheKey, Event, FetchStatus, Item, Outcome};
use crate::utils::remove_file_if_exists;
use crate::validator::OutputValidator;

/// Suffix of the file a transfer is written to before it is validated
const PARTIAL_SUFFIX: &str = "part";

/// Position of an item in the run, rendered as `[n/total]` in log lines
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ItemPosition {
    /// 0-based index in the input
    pub index: usize,
    /// Number of items in the input
    pub total: usize,
}

impl std::fmt::Display for ItemPosition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}/{}]", self.index + 1, self.total)
    }
}

/// One async lock per cache key
///
/// Two input rows can name the same deliverable. Holding the key's lock for the
/// whole attempt keeps them from writing the same partial file at once. An
/// entry lives only while some task holds or waits on it.
#[derive(Debug, Default)]
pub(crate) struct KeyLocks {
    locks: Mutex<HashMap<CacheKey, Arc<tokio::sync::Mutex<()>>>>,
}

impl KeyLocks {
    fn lock_for(&self, key: &CacheKey) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self
            .locks
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        locks.entry(key.clone()).or_default().clone()
    }

    /// Give back a handle from [`lock_for`](Self::lock_for), dropping the entry
    /// when no other task still refers to it
    fn release(&self, key: &CacheKey, lock: Arc<tokio::sync::Mutex<()>>) {
        let mut locks = self
            .locks
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        drop(lock);
        if locks
            .get(key)
            .is_some_and(|entry| Arc::strong_count(entry) == 1)
        {
            locks.remove(key);
        }
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.locks
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }
}

/// Everything one attempt needs, shared by every task in a run
pub struct FetchUnit {
    pub(crate) source: Arc<dyn MediaSource>,
    pub(crate) cache: Arc<ExistingOutputCache>,
    pub(crate) validator: OutputValidator,
    pub(crate) error_log: Arc<ErrorLog>,
    pub(crate) event_tx: tokio::sync::broadcast::Sender<Event>,
    pub(crate) output_dir: PathBuf,
    pub(crate) extension: String,
    pub(crate) retry: RetryConfig,
    pub(crate) key_locks: KeyLocks,
}

impl FetchUnit {
    /// Run a single fetch-and-store attempt for `item`
    ///
    /// Skips without I/O when the cache already knows the item, and without a
    /// fetch when a valid output is found on disk. Otherwise the source stream
    /// is written next to the output, validated, and moved into place. Nothing
    /// is left behind on failure except when cleanup itself fails.
    pub async fn fetch_one(&self, item: &Item, position: ItemPosition) -> Result<FetchStatus> {
        let key = item.cache_key(&self.extension);

        if self.skip_if_cached(&key, position) {
            return Ok(FetchStatus::Skipped);
        }

        let lock = self.key_locks.lock_for(&key);
        let guard = lock.lock().await;
        let result = self.fetch_locked(item, &key, position).await;
        drop(guard);
        self.key_locks.release(&key, lock);
        result
    }

    /// The body of [`fetch_one`](Self::fetch_one), run while holding the key's lock
    async fn fetch_locked(
        &self,
        item: &Item,
        key: &CacheKey,
        position: ItemPosition,
    ) -> Result<FetchStatus> {
        // A sibling holding the same key may have finished while we waited
        if self.skip_if_cached(key, position) {
            return Ok(FetchStatus::Skipped);
        }

        let collection_dir = self.output_dir.join(item.collection_dir());
        tokio::fs::create_dir_all(&collection_dir).await?;
        let path = collection_dir.join(item.file_name(&self.extension));

        // The cache may predate this directory or have missed it in a partial scan
        if self.validator.is_valid(&path).await {
            tracing::info!(%position, key = %key, "Skipping existing valid file");
            self.cache.insert(key.clone());
            self.emit(Event::ItemSkipped {
                key: key.to_string(),
            });
            return Ok(FetchStatus::Skipped);
        }

        self.remove_invalid(&path).await;

        tracing::info!(
            %position,
            collection = %item.collection_dir(),
            title = %item.title,
            "Downloading"
        );

        let partial = partial_path(&path);
        if let Err(e) = self.store(item, &partial).await {
            self.discard(&partial).await;
            return Err(e);
        }

        let size = self.validator.file_size(&partial).await.unwrap_or(0);
        if !self.validator.accepts_size(size) {
            self.discard(&partial).await;
            return Err(Error::UndersizedOutput {
                path,
                size,
                min_size: self.validator.min_file_size(),
            });
        }

        if let Err(e) = tokio::fs::rename(&partial, &path).await {
            self.discard(&partial).await;
            return Err(e.into());
        }

        self.cache.insert(key.clone());
        tracing::info!(%position, key = %key, bytes = size, "Downloaded");
        self.emit(Event::ItemDownloaded {
            key: key.to_string(),
            bytes: size,
        });
        Ok(FetchStatus::Downloaded { bytes: size })
    }

    /// Fetch `item` with bounded exponential-backoff retries
    ///
    /// Never fails: exhausting the attempts yields [`Outcome::Failed`] carrying
    /// the untouched item for the failure report.
    pub async fn fetch_with_retry(&self, item: &Item, position: ItemPosition) -> Outcome {
        let key = item.cache_key(&self.extension);
        let mut attempts = 0u32;

        let result = download_with_retry_notify(
            &self.retry,
            || {
                attempts += 1;
                self.fetch_one(item, position)
            },
            |e, attempt, delay| {
                self.error_log.log(format!(
                    "Download failed for {}: {}",
                    item.permalink_url, e
                ));
                tracing::info!(
                    %position,
                    key = %key,
                    next_attempt = attempt + 1,
                    delay_ms = delay.as_millis(),
                    "Retrying download"
                );
                self.emit(Event::AttemptFailed {
                    key: key.to_string(),
                    attempt,
                    error: e.to_string(),
                });
            },
        )
        .await;

        match result {
            Ok(FetchStatus::Skipped) => Outcome::Skipped { item: item.clone() },
            Ok(FetchStatus::Downloaded { bytes }) => Outcome::Downloaded {
                item: item.clone(),
                bytes,
                attempts,
            },
            Err(e) => {
                tracing::error!(
                    %position,
                    url = %item.permalink_url,
                    attempts,
                    error = %e,
                    "Error downloading"
                );
                self.error_log.log(format!(
                    "Download failed for {}: {}",
                    item.permalink_url, e
                ));
                self.emit(Event::ItemFailed {
                    key: key.to_string(),
                    error: e.to_string(),
                });
                Outcome::Failed {
                    item: item.clone(),
                    error: e.to_string(),
                    attempts,
                }
            }
        }
    }

    fn skip_if_cached(&self, key: &CacheKey, position: ItemPosition) -> bool {
        if !self.cache.contains(key) {
            return false;
        }
        tracing::info!(%position, key = %key, "Skipping existing valid file");
        self.emit(Event::ItemSkipped {
            key: key.to_string(),
        });
        true
    }

    /// Drain the source stream for `item` into `path`
    async fn store(&self, item: &Item, path: &Path) -> Result<u64> {
        let mut stream = self.source.open(item).await?;
        let mut file = tokio::fs::File::create(path).await?;
        let mut written = 0u64;

        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        file.flush().await?;

        tracing::debug!(path = %path.display(), bytes = written, "Stream drained");
        Ok(written)
    }

    /// Delete an output that failed validation before it is replaced
    async fn remove_invalid(&self, path: &Path) {
        match remove_file_if_exists(path).await {
            Ok(true) => {
                tracing::info!(path = %path.display(), "Removed invalid file");
            }
            Ok(false) => {}
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Failed to delete invalid file");
                self.error_log.log(format!(
                    "Failed to delete invalid file {}: {}",
                    path.display(),
                    e
                ));
            }
        }
    }

    /// Best-effort removal of a partial transfer
    async fn discard(&self, partial: &Path) {
        if let Err(e) = remove_file_if_exists(partial).await {
            tracing::warn!(path = %partial.display(), error = %e, "Failed to remove partial download");
        }
    }

    fn emit(&self, event: Event) {
        self.event_tx.send(event).ok();
    }
}

fn partial_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".");
    name.push(PARTIAL_SUFFIX);
    path.with_file_name(name)
}
