//! Durable single-file append log backing the stream data type.
//!
//! Each [`Stream`] owns one file of length-prefixed, CRC-32C checksummed
//! records. A record's byte offset is its permanent identifier. Writers are
//! serialized per stream, readers below the tail never block, and followers
//! wait on the stream's monitor for new appends.
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

pub mod codec;
pub mod config;
mod error;
pub mod follow;
mod stream;

pub use codec::{RECORD_HEADER_LEN, RecordHeader, crc32c};
pub use config::StreamConfig;
pub use error::{Error, Result};
pub use follow::{FollowControl, FollowEvent, FollowOptions, StreamListener, Subscription};
pub use stream::Stream;
