//! Node path grammar for streams.
//!
//! A stream path is `<prefix><key>` and anything after the first `/` following
//! the prefix is ignored when resolving the key. An entry path appends one more
//! segment, either the literal `info` or a hexadecimal record offset:
//! `<prefix><key>/<hex-offset>` or `<prefix><key>/info`.

use crate::error::Error;

/// Final segment that asks for the stream's tail instead of a record.
pub const INFO_SEGMENT: &str = "info";

/// Parsed final segment of an entry path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntrySegment {
    /// The `info` segment.
    Info,

    /// A record offset.
    Offset(u64),
}

/// Extracts the stream key from a stream path.
///
/// # Errors
///
/// Returns [`Error::InvalidPrefix`] if the path does not start with `prefix`,
/// or [`Error::InvalidPath`] if the key is empty, `.` or `..`.
pub fn stream_key<'a>(prefix: &str, stream_path: &'a str) -> Result<&'a str, Error> {
    let rest = stream_path
        .strip_prefix(prefix)
        .ok_or_else(|| Error::InvalidPrefix(stream_path.to_string()))?;

    let key = rest.split_once('/').map_or(rest, |(key, _)| key);

    match key {
        "" | "." | ".." => Err(Error::InvalidPath(stream_path.to_string())),
        key => Ok(key),
    }
}

/// Splits an entry path at its last `/` into the stream path and final segment.
///
/// # Errors
///
/// Returns [`Error::InvalidPath`] if there is no `/`, or
/// [`Error::MalformedOffset`] if the segment is neither `info` nor hexadecimal.
pub fn split_entry_path(node_path: &str) -> Result<(&str, EntrySegment), Error> {
    let (stream_path, segment) = node_path
        .rsplit_once('/')
        .ok_or_else(|| Error::InvalidPath(node_path.to_string()))?;

    if segment == INFO_SEGMENT {
        return Ok((stream_path, EntrySegment::Info));
    }

    Ok((stream_path, EntrySegment::Offset(parse_offset(segment)?)))
}

/// Parses an unsigned, case-insensitive hexadecimal offset.
///
/// # Errors
///
/// Returns [`Error::MalformedOffset`] if `segment` is empty, signed, contains
/// a non-hex character or overflows 64 bits.
pub fn parse_offset(segment: &str) -> Result<u64, Error> {
    if segment.is_empty() || !segment.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(Error::MalformedOffset(segment.to_string()));
    }

    u64::from_str_radix(segment, 16).map_err(|_| Error::MalformedOffset(segment.to_string()))
}

/// Formats an offset the way paths and `info` values carry it.
#[must_use]
pub fn format_offset(offset: u64) -> String {
    format!("{offset:x}")
}

/// Builds the entry path identifying the record at `offset`.
#[must_use]
pub fn entry_path(stream_path: &str, offset: u64) -> String {
    format!("{stream_path}/{}", format_offset(offset))
}
