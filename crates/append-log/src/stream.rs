//! Single-file append log

use std::fmt;
use std::fs::{File, OpenOptions};
use std::io;
use std::os::unix::fs::{FileExt, OpenOptionsExt};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread;

use bytes::Bytes;
use parking_lot::{Condvar, Mutex};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::codec::{RECORD_HEADER_LEN, RecordHeader};
use crate::config::StreamConfig;
use crate::error::{Error, Result};
use crate::follow::{
    ChannelListener, FollowControl, FollowOptions, StreamListener, SUBSCRIPTION_BUFFER,
    Subscription,
};

/// An append-only log of checksummed records backed by a single file.
///
/// Records are addressed by the byte offset of their header. Appends are
/// serialized per stream; reads below the published tail take no lock.
/// Cloning (or [`Stream::new_handle`]) yields another handle to the same log.
#[derive(Clone)]
pub struct Stream {
    inner: Arc<Inner>,
}

struct Inner {
    key: String,
    path: PathBuf,
    file: File,
    config: StreamConfig,
    /// Offset one past the last complete record. Only stored under `write_lock`.
    tail: AtomicU64,
    write_lock: Mutex<()>,
    appended: Condvar,
}

impl Stream {
    /// Opens (or creates) the log for `key` inside `dir`.
    ///
    /// An existing file is scanned from the start and the tail is placed after
    /// the last record that validates. Anything past that point is left on disk
    /// and will be overwritten by the next append.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened, or if reading it fails
    /// for any reason other than running into an incomplete or corrupt record.
    pub fn open(
        dir: impl AsRef<Path>,
        key: impl Into<String>,
        config: StreamConfig,
    ) -> Result<Self> {
        let key = key.into();
        let path = dir.as_ref().join(&key);

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .mode(0o600)
            .open(&path)
            .map_err(|e| Error::Io("error opening stream file", e))?;

        Self::from_file(key, path, file, config)
    }

    fn from_file(key: String, path: PathBuf, file: File, config: StreamConfig) -> Result<Self> {
        let file_len = file
            .metadata()
            .map_err(|e| Error::Io("error reading stream file metadata", e))?
            .len();

        let tail = recover_tail(&file, file_len)
            .map_err(|e| Error::Io("error scanning stream file", e))?;
        if tail < file_len {
            warn!(
                key = %key,
                tail,
                file_len,
                "ignoring trailing bytes past last valid record"
            );
        }

        info!(key = %key, path = %path.display(), tail, "opened stream");

        Ok(Self {
            inner: Arc::new(Inner {
                key,
                path,
                file,
                config,
                tail: AtomicU64::new(tail),
                write_lock: Mutex::new(()),
                appended: Condvar::new(),
            }),
        })
    }

    /// The stream's key.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.inner.key
    }

    /// Path of the backing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.inner.path
    }

    /// Another handle to this same stream.
    #[must_use]
    pub fn new_handle(&self) -> Self {
        debug!(key = %self.inner.key, "new stream handle");
        self.clone()
    }

    /// Current tail: the offset the next append will use.
    ///
    /// Never blocks. Everything below the returned offset is complete.
    #[must_use]
    pub fn tail(&self) -> u64 {
        self.inner.tail.load(Ordering::Acquire)
    }

    /// Appends `payload` and returns the offset of its record.
    ///
    /// The tail only moves once both header and payload are written, so a
    /// failed append leaves nothing visible.
    ///
    /// # Errors
    ///
    /// Returns an error if the payload is too large or either write fails.
    pub fn append(&self, payload: &[u8]) -> Result<u64> {
        let header = RecordHeader::for_payload(payload)?;
        let inner = &*self.inner;

        let _guard = inner.write_lock.lock();
        let offset = inner.tail.load(Ordering::Acquire);

        debug!(key = %inner.key, offset, len = payload.len(), "appending record");

        inner
            .file
            .write_all_at(&header.encode(), offset)
            .map_err(|e| Error::Io("error writing record header", e))?;
        inner
            .file
            .write_all_at(payload, offset + RECORD_HEADER_LEN as u64)
            .map_err(|e| Error::Io("error writing record payload", e))?;

        if inner.config.sync_writes {
            inner
                .file
                .sync_data()
                .map_err(|e| Error::Io("error syncing stream file", e))?;
        }

        inner
            .tail
            .store(offset + header.record_len(), Ordering::Release);
        inner.appended.notify_all();

        Ok(offset)
    }

    /// Reads the record at `offset`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidOffset`] if `offset` does not start a complete
    /// record below the tail or the record fails its checksum.
    pub fn read(&self, offset: u64) -> Result<Bytes> {
        read_record(&self.inner.file, offset, self.tail()).map(|(_, payload)| payload)
    }

    /// Delivers records to `listener` starting at `start`, blocking for new
    /// appends whenever it catches up with the tail.
    ///
    /// The session ends when the listener returns [`FollowControl::Stop`], when
    /// `options.max_records` is reached, or when a record fails validation.
    /// [`StreamListener::finished`] is called exactly once in every case.
    pub fn follow<L>(&self, start: u64, options: FollowOptions, listener: &mut L)
    where
        L: StreamListener + ?Sized,
    {
        let inner = &*self.inner;
        let mut pos = start;
        let mut delivered = 0usize;
        let mut tail = self.tail();

        loop {
            if pos >= tail {
                tail = self.wait_for_tail_past(pos);
            }

            let (header, payload) = match read_record(&inner.file, pos, tail) {
                Ok(record) => record,
                Err(e) => {
                    listener.finished(Some(e));
                    return;
                }
            };

            debug!(key = %inner.key, offset = pos, "delivering record");

            if listener.deliver(pos, payload) == FollowControl::Stop {
                debug!(key = %inner.key, offset = pos, "listener stopped follow");
                break;
            }

            delivered += 1;
            pos += header.record_len();

            if options
                .max_records
                .is_some_and(|max| delivered >= max.get())
            {
                debug!(key = %inner.key, delivered, "follow reached max records");
                break;
            }
        }

        listener.finished(None);
    }

    /// Runs [`Stream::follow`] on a dedicated thread and returns the async end.
    ///
    /// # Errors
    ///
    /// Returns an error if the follower thread cannot be spawned.
    pub fn subscribe(&self, start: u64, options: FollowOptions) -> Result<Subscription> {
        let (tx, rx) = mpsc::channel(SUBSCRIPTION_BUFFER);
        let stream = self.new_handle();

        thread::Builder::new()
            .name(format!("follow-{}", self.inner.key))
            .spawn(move || {
                let mut listener = ChannelListener::new(tx);
                stream.follow(start, options, &mut listener);
            })
            .map_err(|e| Error::Io("error spawning follower thread", e))?;

        Ok(Subscription::new(rx))
    }

    /// Returns the entire valid log content.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read.
    pub fn snapshot(&self) -> Result<Bytes> {
        let tail = self.tail();

        #[allow(clippy::cast_possible_truncation)]
        let mut buf = vec![0u8; tail as usize];
        self.inner
            .file
            .read_exact_at(&mut buf, 0)
            .map_err(|e| Error::Io("error reading stream snapshot", e))?;

        info!(key = %self.inner.key, tail, "took stream snapshot");

        Ok(Bytes::from(buf))
    }

    /// Replaces the log content with `state` and moves the tail to its end.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written, truncated or synced.
    /// A failed write leaves the tail where it was. Once the write succeeds the
    /// tail is published at the end of `state`, so a truncation or sync error
    /// is returned with the restored content already visible.
    pub fn restore(&self, state: &[u8]) -> Result<()> {
        let inner = &*self.inner;
        let _guard = inner.write_lock.lock();

        inner
            .file
            .write_all_at(state, 0)
            .map_err(|e| Error::Io("error writing stream state", e))?;

        let written = state.len() as u64;
        inner.tail.store(written, Ordering::Release);
        inner.appended.notify_all();

        info!(key = %inner.key, tail = written, "restored stream");

        inner
            .file
            .set_len(written)
            .map_err(|e| Error::Io("error truncating stream file", e))?;

        if inner.config.sync_writes {
            inner
                .file
                .sync_data()
                .map_err(|e| Error::Io("error syncing stream file", e))?;
        }

        Ok(())
    }

    fn wait_for_tail_past(&self, pos: u64) -> u64 {
        let inner = &*self.inner;
        let mut guard = inner.write_lock.lock();

        let mut tail = inner.tail.load(Ordering::Acquire);
        while pos >= tail {
            debug!(key = %inner.key, pos, tail, "waiting for append");
            inner.appended.wait(&mut guard);
            tail = inner.tail.load(Ordering::Acquire);
        }

        tail
    }
}

impl fmt::Debug for Stream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Stream")
            .field("key", &self.inner.key)
            .field("path", &self.inner.path)
            .field("tail", &self.tail())
            .finish_non_exhaustive()
    }
}

/// Reads and validates the record at `offset`, which must end at or before `limit`.
///
/// Any failure, including an I/O error, means `offset` is not a valid record.
fn read_record(file: &File, offset: u64, limit: u64) -> Result<(RecordHeader, Bytes)> {
    match scan_record(file, offset, limit) {
        Ok(Some((header, payload))) => Ok((header, Bytes::from(payload))),
        Ok(None) => Err(Error::InvalidOffset(offset)),
        Err(e) => {
            debug!(offset, error = %e, "record read failed");
            Err(Error::InvalidOffset(offset))
        }
    }
}

/// Returns `Ok(None)` if no complete record with a matching checksum starts at
/// `offset` and ends at or before `limit`. Read errors other than a short read
/// are passed through.
fn scan_record(
    file: &File,
    offset: u64,
    limit: u64,
) -> io::Result<Option<(RecordHeader, Vec<u8>)>> {
    let Some(payload_start) = offset
        .checked_add(RECORD_HEADER_LEN as u64)
        .filter(|end| *end <= limit)
    else {
        return Ok(None);
    };

    let mut buf = [0u8; RECORD_HEADER_LEN];
    if !read_exact_or_eof(file, &mut buf, offset)? {
        debug!(offset, "short record header");
        return Ok(None);
    }
    let header = RecordHeader::decode(&buf);

    if payload_start + u64::from(header.payload_len) > limit {
        debug!(offset, len = header.payload_len, limit, "record extends past tail");
        return Ok(None);
    }

    let mut payload = vec![0u8; header.payload_len as usize];
    if !read_exact_or_eof(file, &mut payload, payload_start)? {
        debug!(offset, "short record payload");
        return Ok(None);
    }

    if !header.verify(&payload) {
        debug!(offset, "record checksum mismatch");
        return Ok(None);
    }

    Ok(Some((header, payload)))
}

/// Fills `buf` from `offset`; `Ok(false)` if the file ends first.
fn read_exact_or_eof(file: &File, buf: &mut [u8], offset: u64) -> io::Result<bool> {
    match file.read_exact_at(buf, offset) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => Ok(false),
        Err(e) => Err(e),
    }
}

/// Walks records from offset zero and returns the end of the last valid one.
fn recover_tail(file: &File, file_len: u64) -> io::Result<u64> {
    let mut tail = 0;
    while let Some((header, _)) = scan_record(file, tail, file_len)? {
        tail += header.record_len();
    }
    Ok(tail)
}
