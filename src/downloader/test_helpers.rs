//! Shared test helpers: a scriptable media source and downloader builders.

use crate::cache::ExistingOutputCache;
use crate::config::Config;
use crate::downloader::{FetchUnit, MediaDownloader};
use crate::error_log::ErrorLog;
use crate::types::Event;
use crate::validator::OutputValidator;
use crate::error::Error;
use crate::source::{MediaSource, MediaStream};
use crate::types::Item;
use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Minimum valid size used by most tests
pub(crate) const TEST_MIN_SIZE: u64 = 1024;

/// What the mock does when asked for a URL
#[derive(Clone, Debug)]
pub(crate) enum Behavior {
    /// Stream this many bytes
    Bytes(usize),
    /// Fail to open every time
    AlwaysFail,
    /// Fail to open this many times, then stream the given size
    FailThen(u32, usize),
    /// Open fine, then error after this many bytes
    BreakAfter(usize),
    /// Stream `sizes[n]` bytes on call `n`, repeating the last entry
    Sizes(Vec<usize>),
    /// Reject the reference as unusable
    Invalid,
}

/// [`MediaSource`] scripted per URL, recording every call
pub(crate) struct MockSource {
    behaviors: Mutex<HashMap<String, Behavior>>,
    default: Behavior,
    calls: Mutex<HashMap<String, u32>>,
    open_times: Mutex<Vec<tokio::time::Instant>>,
    open_delay: Duration,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl MockSource {
    /// Source where every URL streams `default_size` bytes
    pub(crate) fn new(default_size: usize) -> Self {
        Self {
            behaviors: Mutex::new(HashMap::new()),
            default: Behavior::Bytes(default_size),
            calls: Mutex::new(HashMap::new()),
            open_times: Mutex::new(Vec::new()),
            open_delay: Duration::ZERO,
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    /// Hold every open for `delay` so overlapping calls can be observed
    pub(crate) fn with_open_delay(mut self, delay: Duration) -> Self {
        self.open_delay = delay;
        self
    }

    /// Script the behavior for one URL
    pub(crate) fn set(&self, url: &str, behavior: Behavior) {
        self.behaviors
            .lock()
            .unwrap()
            .insert(url.to_string(), behavior);
    }

    /// Number of times `url` was opened
    pub(crate) fn calls_for(&self, url: &str) -> u32 {
        self.calls.lock().unwrap().get(url).copied().unwrap_or(0)
    }

    /// Total number of opens across all URLs
    pub(crate) fn total_calls(&self) -> u32 {
        self.calls.lock().unwrap().values().sum()
    }

    /// When each open started, in call order
    pub(crate) fn open_times(&self) -> Vec<tokio::time::Instant> {
        self.open_times.lock().unwrap().clone()
    }

    /// Highest number of opens that were in progress at the same time
    pub(crate) fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MediaSource for MockSource {
    async fn open(&self, item: &Item) -> crate::Result<MediaStream> {
        let url = item.permalink_url.clone();
        let call = {
            let mut calls = self.calls.lock().unwrap();
            let count = calls.entry(url.clone()).or_insert(0);
            *count += 1;
            *count
        };
        self.open_times
            .lock()
            .unwrap()
            .push(tokio::time::Instant::now());

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        if !self.open_delay.is_zero() {
            tokio::time::sleep(self.open_delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        let behavior = self
            .behaviors
            .lock()
            .unwrap()
            .get(&url)
            .cloned()
            .unwrap_or_else(|| self.default.clone());

        match behavior {
            Behavior::Bytes(size) => Ok(body(size)),
            Behavior::AlwaysFail => Err(Error::Source(format!("unavailable: {url}"))),
            Behavior::FailThen(failures, size) => {
                if call <= failures {
                    Err(Error::Source(format!("flaky: {url} (call {call})")))
                } else {
                    Ok(body(size))
                }
            }
            Behavior::BreakAfter(size) => {
                let chunks: Vec<crate::Result<Bytes>> = vec![
                    Ok(Bytes::from(vec![1u8; size])),
                    Err(Error::Source("connection dropped".to_string())),
                ];
                Ok(futures::stream::iter(chunks).boxed())
            }
            Behavior::Sizes(sizes) => {
                let index = (call as usize - 1).min(sizes.len().saturating_sub(1));
                Ok(body(sizes.get(index).copied().unwrap_or(0)))
            }
            Behavior::Invalid => Err(Error::InvalidSource(url)),
        }
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}

/// Stream `size` bytes in 256-byte chunks
fn body(size: usize) -> MediaStream {
    let chunks: Vec<crate::Result<Bytes>> = vec![0xABu8; size]
        .chunks(256)
        .map(|c| Ok(Bytes::copy_from_slice(c)))
        .collect();
    futures::stream::iter(chunks).boxed()
}

/// Config for a run under `output_dir` with fast retries and no batch delay
pub(crate) fn test_config(output_dir: &Path) -> Config {
    let mut config = Config::default();
    config.download.output_dir = output_dir.to_path_buf();
    config.download.min_file_size = TEST_MIN_SIZE;
    config.batch.inter_batch_delay = Duration::ZERO;
    config.retry.initial_delay = Duration::from_millis(1);
    config.retry.max_delay = Duration::from_millis(10);
    config
}

/// Downloader over `source` writing into a fresh temp dir
pub(crate) fn create_test_downloader(
    source: Arc<MockSource>,
) -> (MediaDownloader, tempfile::TempDir) {
    let temp_dir = tempfile::tempdir().unwrap();
    let config = test_config(&temp_dir.path().join("out"));
    let downloader = MediaDownloader::with_source(config, source).unwrap();
    (downloader, temp_dir)
}

/// Fetch unit over `source` writing into `output_dir`, with an empty cache
pub(crate) fn create_test_unit(
    source: Arc<MockSource>,
    output_dir: &Path,
) -> (FetchUnit, tokio::sync::broadcast::Receiver<Event>) {
    let config = test_config(output_dir);
    std::fs::create_dir_all(output_dir).unwrap();
    let validator = OutputValidator::new(config.download.min_file_size);
    let (event_tx, event_rx) = tokio::sync::broadcast::channel(256);
    let unit = FetchUnit {
        source,
        cache: Arc::new(ExistingOutputCache::new(output_dir, validator)),
        validator,
        error_log: Arc::new(ErrorLog::new(config.error_log_path())),
        event_tx,
        output_dir: output_dir.to_path_buf(),
        extension: config.download.file_extension.clone(),
        retry: config.retry.clone(),
        key_locks: Default::default(),
    };
    (unit, event_rx)
}

/// Item whose URL is derived from its names
pub(crate) fn item(artist: &str, title: &str) -> Item {
    Item::new(
        artist,
        title,
        format!("https://media.example.com/{artist}/{title}"),
    )
}

/// Write a file of `size` bytes at `<root>/<artist>/<title>.mp3`
pub(crate) fn write_output(root: &Path, artist: &str, title: &str, size: usize) {
    let dir = root.join(artist);
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join(format!("{title}.mp3")), vec![0x55u8; size]).unwrap();
}
