//! # media-dl
//!
//! Resumable bulk media downloader driven by CSV metadata.
//!
//! ## Design Philosophy
//!
//! media-dl is designed to be:
//! - **Resumable** - Outputs already on disk and large enough are never fetched again
//! - **Polite** - Items are fetched in bounded batches with a pause between them
//! - **Failure tolerant** - One bad item never stops the run; failures are retried and reported
//! - **Event-driven** - Consumers subscribe to events, no polling required
//!
//! ## Quick Start
//!
//! ```no_run
//! use media_dl::{Config, MediaDownloader};
//! use std::path::Path;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut config = Config::default();
//!     config.source.client_id = Some("my-client-id".to_string());
//!
//!     let downloader = MediaDownloader::new(config)?;
//!
//!     // Subscribe to events
//!     let mut events = downloader.subscribe();
//!     tokio::spawn(async move {
//!         while let Ok(event) = events.recv().await {
//!             println!("Event: {:?}", event);
//!         }
//!     });
//!
//!     let summary = downloader.run_csv(Path::new("metadata.csv")).await?;
//!     println!("{} failed", summary.failed);
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Index of outputs already present and valid
pub mod cache;
/// Configuration types
pub mod config;
/// Core downloader implementation (decomposed into focused submodules)
pub mod downloader;
/// Error types
pub mod error;
/// Append-only error log file
pub mod error_log;
/// CSV input and link extraction
pub mod input;
/// Retry logic with exponential backoff
pub mod retry;
/// Media sources the downloader reads from
pub mod source;
/// Core types and events
pub mod types;
/// Utility functions
pub mod utils;
/// Output size validation
pub mod validator;

// Re-export commonly used types
pub use cache::ExistingOutputCache;
pub use config::Config;
pub use downloader::MediaDownloader;
pub use error::{Error, Result};
pub use error_log::ErrorLog;
pub use source::{HttpMediaSource, MediaSource};
pub use types::{CacheKey, Event, FetchStatus, Item, Outcome, RunSummary};
pub use validator::OutputValidator;
