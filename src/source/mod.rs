//! Media sources
//!
//! The downloader never speaks a media protocol itself. It asks a
//! [`MediaSource`] for a byte stream per [`Item`](crate::types::Item) and
//! stores whatever comes back.
//!
//! - [`HttpMediaSource`]: streams the item's source reference over HTTP(S)
//!
//! Tests and embedders can provide their own implementation.

mod http;
mod traits;

pub use http::HttpMediaSource;
pub use traits::{MediaSource, MediaStream};
