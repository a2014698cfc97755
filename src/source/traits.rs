//! Trait for the external fetch capability

use crate::types::Item;
use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;

/// Stream of media bytes for one item
///
/// An `Err` element ends the transfer; the partial output is discarded.
pub type MediaStream = BoxStream<'static, crate::Result<Bytes>>;

/// Opaque fetch capability
///
/// Implementations resolve an item's source reference to its media bytes.
/// They are called concurrently from every task in a batch and must not hold
/// per-item state between calls.
#[async_trait]
pub trait MediaSource: Send + Sync {
    /// Open a byte stream for `item`
    ///
    /// # Errors
    ///
    /// Returns an error if the source reference is unusable or the remote
    /// side refuses the request. Errors while reading the stream are yielded
    /// as stream elements instead.
    async fn open(&self, item: &Item) -> crate::Result<MediaStream>;

    /// Human-readable name for logging
    fn name(&self) -> &'static str;
}
