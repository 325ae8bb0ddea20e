use thiserror::Error;

use crate::StreamsStoreError;

/// Errors that can occur in this crate.
#[derive(Debug, Error)]
pub enum Error {
    /// IO operation failed.
    #[error("{0}: {1}")]
    Io(&'static str, #[source] std::io::Error),

    /// The node path does not begin with the configured prefix.
    #[error("invalid prefix for stream: {0}")]
    InvalidPrefix(String),

    /// The node path has no usable stream key or offset segment.
    #[error("invalid node path: {0}")]
    InvalidPath(String),

    /// Error from the underlying append log.
    #[error(transparent)]
    Log(#[from] proven_append_log::Error),

    /// The trailing path segment is neither `info` nor a hexadecimal offset.
    #[error("not a valid offset: {0}")]
    MalformedOffset(String),
}

impl StreamsStoreError for Error {}
