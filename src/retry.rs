//! Retry logic with exponential backoff
//!
//! This module provides the bounded retry loop wrapped around every item's
//! fetch. It implements exponential backoff with optional jitter.
//!
//! `max_attempts` counts every call of the operation, including the first.
//! After failed attempt `n` (0-based) the loop sleeps
//! `initial_delay * backoff_multiplier^n`, capped at `max_delay`.
//!
//! # Example
//!
//! ```no_run
//! use media_dl::retry::{IsRetryable, download_with_retry};
//! use media_dl::config::RetryConfig;
//!
//! #[derive(Debug)]
//! enum MyError {
//!     Transient,
//!     Permanent,
//! }
//!
//! impl std::fmt::Display for MyError {
//!     fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
//!         write!(f, "{:?}", self)
//!     }
//! }
//!
//! impl IsRetryable for MyError {
//!     fn is_retryable(&self) -> bool {
//!         matches!(self, MyError::Transient)
//!     }
//! }
//!
//! # async fn example() -> Result<(), MyError> {
//! let config = RetryConfig::default();
//! let result = download_with_retry(&config, || async {
//!     // Your operation here
//!     Ok::<_, MyError>(())
//! }).await?;
//! # Ok(())
//! # }
//! ```

use crate::config::RetryConfig;
use crate::error::Error;
use rand::Rng;
use std::future::Future;
use std::time::Duration;

/// Trait for errors that can be classified as retryable or not
///
/// Per-item fetch failures (network errors, any HTTP status, disk errors, truncated transfer)
/// should return `true`. Permanent failures (malformed source reference, bad config, unreadable
/// input) should return `false`.
pub trait IsRetryable {
    /// Returns true if the error is transient and the operation should be retried
    fn is_retryable(&self) -> bool;
}

/// Implementation of IsRetryable for our Error type
impl IsRetryable for Error {
    fn is_retryable(&self) -> bool {
        match self {
            // Every failure while fetching or storing one item gets the full attempt budget
            Error::Network(_) | Error::HttpStatus { .. } | Error::Io(_) => true,
            // The external fetch capability gives no finer classification
            Error::Source(_) => true,
            // A short file usually means a cut-off stream
            Error::UndersizedOutput { .. } => true,
            // The reference itself is broken
            Error::InvalidSource(_) => false,
            // Setup-level errors are permanent
            Error::Config { .. }
            | Error::InputNotFound(_)
            | Error::Csv(_)
            | Error::Serialization(_) => false,
        }
    }
}

/// Delay to wait after failed attempt `attempt` (0-based), without jitter
pub fn backoff_delay(config: &RetryConfig, attempt: u32) -> Duration {
    let factor = config.backoff_multiplier.powi(attempt as i32);
    let secs = config.initial_delay.as_secs_f64() * factor;
    if !secs.is_finite() || secs >= config.max_delay.as_secs_f64() {
        return config.max_delay;
    }
    Duration::from_secs_f64(secs)
}

/// Execute an async operation with exponential backoff retry logic
///
/// # Arguments
///
/// * `config` - Retry configuration (max attempts, delays, backoff multiplier, jitter)
/// * `operation` - Async closure that returns Result<T, E> where E implements IsRetryable
///
/// # Returns
///
/// Returns the successful result or the last error after all attempts are exhausted.
pub async fn download_with_retry<F, Fut, T, E>(config: &RetryConfig, operation: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: IsRetryable + std::fmt::Display,
{
    download_with_retry_notify(config, operation, |_, _, _| {}).await
}

/// Like [`download_with_retry`], calling `on_retry(error, attempt, delay)` before each backoff
///
/// `attempt` is the 1-based number of the attempt that just failed.
pub async fn download_with_retry_notify<F, Fut, T, E, N>(
    config: &RetryConfig,
    mut operation: F,
    mut on_retry: N,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: IsRetryable + std::fmt::Display,
    N: FnMut(&E, u32, Duration),
{
    let max_attempts = config.max_attempts.max(1);
    let mut attempt = 0;

    loop {
        match operation().await {
            Ok(result) => {
                if attempt > 0 {
                    tracing::info!(attempts = attempt + 1, "Operation succeeded after retry");
                }
                return Ok(result);
            }
            Err(e) if e.is_retryable() && attempt + 1 < max_attempts => {
                let delay = backoff_delay(config, attempt);
                attempt += 1;

                tracing::warn!(
                    error = %e,
                    attempt = attempt,
                    max_attempts = max_attempts,
                    delay_ms = delay.as_millis(),
                    "Operation failed, retrying"
                );

                let delay = if config.jitter { add_jitter(delay) } else { delay };
                on_retry(&e, attempt, delay);

                // Wait before retrying
                tokio::time::sleep(delay).await;
            }
            Err(e) => {
                if e.is_retryable() {
                    tracing::error!(
                        error = %e,
                        attempts = attempt + 1,
                        "Operation failed after all retry attempts exhausted"
                    );
                } else {
                    tracing::error!(
                        error = %e,
                        "Operation failed with non-retryable error"
                    );
                }
                return Err(e);
            }
        }
    }
}

/// Add random jitter to a delay
///
/// Jitter is uniformly distributed between 0% and 100% of the delay, so the
/// actual delay lies between `delay` and `2 * delay`.
fn add_jitter(delay: Duration) -> Duration {
    let mut rng = rand::thread_rng();
    let jitter_factor: f64 = rng.gen_range(0.0..=1.0);
    let jittered_secs = delay.as_secs_f64() * (1.0 + jitter_factor);
    Duration::from_secs_f64(jittered_secs)
}
