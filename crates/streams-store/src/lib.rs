//! Registry of append logs addressed by hierarchical node paths.
//!
//! Paths under a fixed prefix name streams; the registry lazily opens one
//! [`proven_append_log::Stream`] per stream key and translates path-shaped
//! appends and reads into offset-addressed log operations.
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

pub mod config;
mod error;
pub mod event;
mod fs;
pub mod path;

pub use config::{DEFAULT_PREFIX, StreamsStoreConfig};
pub use error::Error;
pub use event::{Action, Event, NodeExtern};
pub use fs::FsStreamsStore;

use std::error::Error as StdError;
use std::fmt::Debug;

use bytes::Bytes;

/// Marker trait for `StreamsStore` errors
pub trait StreamsStoreError: Debug + StdError + Send + Sync + 'static {}

/// A trait representing a store of append-only streams addressed by node path.
///
/// # Associated Types
/// - `Error`: The error type that implements `StreamsStoreError`.
///
/// # Required Methods
/// - `fn stream_append(&self, node_path: &str, value: Bytes) -> Result<Event, Self::Error>`: Appends a record to the stream at `node_path`.
/// - `fn stream_get(&self, node_path: &str) -> Result<Event, Self::Error>`: Reads a record (`<stream>/<hex-offset>`) or the tail (`<stream>/info`).
pub trait StreamsStore: Clone + Send + Sync + 'static {
    /// The error type for the store.
    type Error: StreamsStoreError;

    /// Appends `value` to the stream at `node_path`, creating the stream if needed.
    ///
    /// The returned event's key is `node_path` followed by `/` and the record's
    /// hexadecimal offset.
    ///
    /// # Errors
    ///
    /// Fails on a malformed path or if the append fails.
    fn stream_append(&self, node_path: &str, value: Bytes) -> Result<Event, Self::Error>;

    /// Reads the record or tail addressed by `node_path`.
    ///
    /// # Errors
    ///
    /// Fails on a malformed path, a malformed offset, or an invalid record.
    fn stream_get(&self, node_path: &str) -> Result<Event, Self::Error>;
}
