//! Existing-output cache
//!
//! Set of [`CacheKey`]s whose output is already on disk and valid. It is built
//! once per run by scanning `<output root>/<collection>/<file>` and then kept
//! current as items complete, so most skips cost a lookup instead of a `stat`.
//!
//! The cache only speeds things up. A partial scan is acceptable because the
//! fetch path re-checks the filesystem for every cache miss.

use crate::error_log::ErrorLog;
use crate::types::CacheKey;
use crate::validator::OutputValidator;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

/// Concurrent set of completed outputs for one run
#[derive(Debug)]
pub struct ExistingOutputCache {
    root: PathBuf,
    validator: OutputValidator,
    keys: Mutex<HashSet<CacheKey>>,
    initialized: AtomicBool,
}

impl ExistingOutputCache {
    /// Create an empty cache for the output tree at `root`
    pub fn new(root: impl Into<PathBuf>, validator: OutputValidator) -> Self {
        Self {
            root: root.into(),
            validator,
            keys: Mutex::new(HashSet::new()),
            initialized: AtomicBool::new(false),
        }
    }

    /// Scan the output tree and record every valid output
    ///
    /// Runs once; later calls return immediately. A missing root is created
    /// and leaves the cache empty. Scan errors are logged and whatever was
    /// collected before the error is kept. Returns the number of cached keys.
    pub async fn initialize(&self, error_log: &ErrorLog) -> usize {
        if self.initialized.swap(true, Ordering::SeqCst) {
            return self.len();
        }

        tracing::info!(root = %self.root.display(), "Building existing-output cache");

        if tokio::fs::metadata(&self.root).await.is_err() {
            if let Err(e) = tokio::fs::create_dir_all(&self.root).await {
                tracing::error!(
                    root = %self.root.display(),
                    error = %e,
                    "Failed to create output root"
                );
                error_log.log(format!(
                    "Error creating output directory {}: {}",
                    self.root.display(),
                    e
                ));
            }
            return 0;
        }

        if let Err(e) = self.scan().await {
            tracing::error!(error = %e, "Error building file cache, continuing with partial cache");
            error_log.log(format!("Error building file cache: {}", e));
        }

        let entries = self.len();
        tracing::info!(entries, "File cache built");
        entries
    }

    // Entries are stat'ed through symlinks, so a dangling link is a scan error
    async fn scan(&self) -> std::io::Result<()> {
        let mut collections = tokio::fs::read_dir(&self.root).await?;
        while let Some(entry) = collections.next_entry().await? {
            if !tokio::fs::metadata(entry.path()).await?.is_dir() {
                continue;
            }
            let Some(collection) = entry.file_name().to_str().map(str::to_owned) else {
                tracing::debug!(path = %entry.path().display(), "Skipping non-UTF-8 directory");
                continue;
            };
            self.scan_collection(&entry.path(), &collection).await?;
        }
        Ok(())
    }

    async fn scan_collection(&self, dir: &Path, collection: &str) -> std::io::Result<()> {
        let mut files = tokio::fs::read_dir(dir).await?;
        while let Some(entry) = files.next_entry().await? {
            let meta = tokio::fs::metadata(entry.path()).await?;
            if !meta.is_file() || !self.validator.accepts_size(meta.len()) {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                self.insert(CacheKey::new(collection, name));
            }
        }
        Ok(())
    }

    /// Whether `key` is known to be complete
    pub fn contains(&self, key: &CacheKey) -> bool {
        self.lock().contains(key)
    }

    /// Record `key` as complete; inserting twice is harmless
    pub fn insert(&self, key: CacheKey) {
        self.lock().insert(key);
    }

    /// Number of cached keys
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Whether the cache has no keys
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether [`initialize`](Self::initialize) has run
    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::SeqCst)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashSet<CacheKey>> {
        // A panic while holding the lock cannot leave a HashSet half-updated
        self.keys
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
