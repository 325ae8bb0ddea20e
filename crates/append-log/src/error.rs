use thiserror::Error;

/// Result type for append log operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in this crate.
#[derive(Debug, Error)]
pub enum Error {
    /// The offset does not address a complete, valid record.
    ///
    /// Out-of-range, truncated and corrupted reads all surface as this.
    #[error("not a valid offset: {0:#x}")]
    InvalidOffset(u64),

    /// IO operation failed.
    #[error("{0}: {1}")]
    Io(&'static str, #[source] std::io::Error),

    /// Payload length does not fit the 32-bit length field.
    #[error("record too large: {0} bytes")]
    RecordTooLarge(usize),
}
