use std::collections::HashMap;
use std::sync::Arc;

use bytes::Bytes;
use once_cell::sync::OnceCell;
use parking_lot::Mutex;
use proven_append_log::{FollowOptions, Stream, StreamListener, Subscription};
use tracing::{debug, info, warn};

use crate::config::StreamsStoreConfig;
use crate::error::Error;
use crate::event::Event;
use crate::path::{self, EntrySegment};
use crate::StreamsStore;

/// Streams store keeping one log file per stream key in a directory.
///
/// The map lock only guards lookup of a key's slot. Opening a stream happens
/// inside its slot, so only callers of that same key wait for it; appends and
/// reads go through each stream's own synchronization.
#[derive(Clone, Debug)]
pub struct FsStreamsStore {
    config: Arc<StreamsStoreConfig>,
    streams: Arc<Mutex<HashMap<String, Arc<OnceCell<Stream>>>>>,
}

impl FsStreamsStore {
    /// Creates a new `FsStreamsStore` with the given configuration.
    ///
    /// Nothing touches the disk until the first stream is opened.
    #[must_use]
    pub fn new(config: StreamsStoreConfig) -> Self {
        Self {
            config: Arc::new(config),
            streams: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// The store's configuration.
    #[must_use]
    pub fn config(&self) -> &StreamsStoreConfig {
        &self.config
    }

    /// Returns a handle to the stream at `stream_path`, opening it if needed.
    ///
    /// Used by snapshot and restore callers that work on whole streams.
    ///
    /// # Errors
    ///
    /// Fails on a malformed path or if the stream cannot be opened.
    pub fn stream(&self, stream_path: &str) -> Result<Stream, Error> {
        Ok(self.get_stream(stream_path)?.new_handle())
    }

    /// Keys of every stream opened so far, sorted.
    #[must_use]
    pub fn stream_keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self
            .streams
            .lock()
            .iter()
            .filter(|(_, slot)| slot.get().is_some())
            .map(|(key, _)| key.clone())
            .collect();
        keys.sort();
        keys
    }

    /// Follows the stream named by `node_path` (`<stream>/<hex-offset>`) on the
    /// calling thread. See [`Stream::follow`].
    ///
    /// # Errors
    ///
    /// Fails before following if the path or offset is malformed or the stream
    /// cannot be opened. Errors during the session go to the listener.
    pub fn follow<L>(
        &self,
        node_path: &str,
        options: FollowOptions,
        listener: &mut L,
    ) -> Result<(), Error>
    where
        L: StreamListener + ?Sized,
    {
        let (stream, start) = self.resolve_follow(node_path)?;
        stream.follow(start, options, listener);
        Ok(())
    }

    /// Follows the stream named by `node_path` (`<stream>/<hex-offset>`) on a
    /// dedicated thread. See [`Stream::subscribe`].
    ///
    /// # Errors
    ///
    /// Fails if the path or offset is malformed, the stream cannot be opened,
    /// or the follower thread cannot be spawned.
    pub fn subscribe(
        &self,
        node_path: &str,
        options: FollowOptions,
    ) -> Result<Subscription, Error> {
        let (stream, start) = self.resolve_follow(node_path)?;
        Ok(stream.subscribe(start, options)?)
    }

    fn resolve_follow(&self, node_path: &str) -> Result<(Stream, u64), Error> {
        let (stream_path, segment) = node_path
            .rsplit_once('/')
            .ok_or_else(|| Error::InvalidPath(node_path.to_string()))?;
        let start = path::parse_offset(segment)?;
        let stream = self.get_stream(stream_path)?;

        debug!(key = %stream.key(), start, "following stream");

        Ok((stream, start))
    }

    fn get_stream(&self, stream_path: &str) -> Result<Stream, Error> {
        let key = path::stream_key(&self.config.prefix, stream_path)?;

        let slot = {
            let mut streams = self.streams.lock();
            match streams.get(key) {
                Some(slot) => Arc::clone(slot),
                None => Arc::clone(streams.entry(key.to_string()).or_default()),
            }
        };

        slot.get_or_try_init(|| self.open_stream(key)).cloned()
    }

    fn open_stream(&self, key: &str) -> Result<Stream, Error> {
        std::fs::create_dir_all(&self.config.dir)
            .map_err(|e| Error::Io("error creating streams directory", e))?;

        let stream = Stream::open(&self.config.dir, key, self.config.stream.clone())
            .inspect_err(|e| warn!(key, error = %e, "error opening stream"))?;

        info!(key, "created stream");

        Ok(stream)
    }
}

impl StreamsStore for FsStreamsStore {
    type Error = Error;

    fn stream_append(&self, node_path: &str, value: Bytes) -> Result<Event, Self::Error> {
        let stream = self.get_stream(node_path)?;
        let offset = stream.append(&value)?;

        debug!(key = %stream.key(), offset, len = value.len(), "appended to stream");

        Ok(Event::created(path::entry_path(node_path, offset)))
    }

    fn stream_get(&self, node_path: &str) -> Result<Event, Self::Error> {
        let (stream_path, segment) = path::split_entry_path(node_path)?;
        let stream = self.get_stream(stream_path)?;

        let value = match segment {
            EntrySegment::Info => Bytes::from(path::format_offset(stream.tail())),
            EntrySegment::Offset(offset) => stream.read(offset)?,
        };

        Ok(Event::got(node_path.to_string(), value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use tempfile::tempdir;

    use crate::event::Action;

    fn store(dir: &std::path::Path) -> FsStreamsStore {
        FsStreamsStore::new(StreamsStoreConfig::new(dir))
    }

    #[test]
    fn test_append_and_get() {
        let dir = tempdir().unwrap();
        let store = store(dir.path());

        let event = store
            .stream_append("/2/events", Bytes::from_static(b"hello"))
            .unwrap();
        assert_eq!(event.action, Action::Create);
        assert_eq!(event.node.key, "/2/events/0");
        assert_eq!(event.node.value, None);

        let event = store
            .stream_append("/2/events", Bytes::from_static(b"world"))
            .unwrap();
        assert_eq!(event.node.key, "/2/events/d");

        let got = store.stream_get("/2/events/d").unwrap();
        assert_eq!(got.action, Action::Get);
        assert_eq!(got.node.key, "/2/events/d");
        assert_eq!(got.value(), Some(&Bytes::from_static(b"world")));

        // offsets are case-insensitive
        let got = store.stream_get("/2/events/D").unwrap();
        assert_eq!(got.value(), Some(&Bytes::from_static(b"world")));
    }

    #[test]
    fn test_info_reports_hex_tail() {
        let dir = tempdir().unwrap();
        let store = store(dir.path());

        let info = store.stream_get("/2/events/info").unwrap();
        assert_eq!(info.value(), Some(&Bytes::from_static(b"0")));

        store
            .stream_append("/2/events", Bytes::from(vec![0u8; 20]))
            .unwrap();

        let info = store.stream_get("/2/events/info").unwrap();
        assert_eq!(info.node.key, "/2/events/info");
        assert_eq!(info.value(), Some(&Bytes::from_static(b"1c")));
    }

    #[test]
    fn test_malformed_offset() {
        let dir = tempdir().unwrap();
        let store = store(dir.path());

        assert!(matches!(
            store.stream_get("/2/events/not-hex"),
            Err(Error::MalformedOffset(_))
        ));
        assert!(matches!(
            store.stream_get("/2/events/-1"),
            Err(Error::MalformedOffset(_))
        ));
    }

    #[test]
    fn test_invalid_prefix() {
        let dir = tempdir().unwrap();
        let store = store(dir.path());

        assert!(matches!(
            store.stream_append("/1/events", Bytes::from_static(b"x")),
            Err(Error::InvalidPrefix(_))
        ));
        assert!(matches!(
            store.stream_get("/1/events/0"),
            Err(Error::InvalidPrefix(_))
        ));
        assert!(store.stream_keys().is_empty());
    }

    #[test]
    fn test_read_past_tail_is_invalid_offset() {
        let dir = tempdir().unwrap();
        let store = store(dir.path());

        store
            .stream_append("/2/events", Bytes::from_static(b"only"))
            .unwrap();

        assert!(matches!(
            store.stream_get("/2/events/100"),
            Err(Error::Log(proven_append_log::Error::InvalidOffset(0x100)))
        ));
    }

    #[test]
    fn test_streams_are_independent() {
        let dir = tempdir().unwrap();
        let store = store(dir.path());

        store
            .stream_append("/2/a", Bytes::from_static(b"in a"))
            .unwrap();
        let event = store
            .stream_append("/2/b", Bytes::from_static(b"in b"))
            .unwrap();
        assert_eq!(event.node.key, "/2/b/0");

        assert_eq!(
            store.stream_get("/2/a/0").unwrap().value(),
            Some(&Bytes::from_static(b"in a"))
        );
        assert_eq!(
            store.stream_get("/2/b/0").unwrap().value(),
            Some(&Bytes::from_static(b"in b"))
        );
        assert_eq!(store.stream_keys(), vec!["a".to_string(), "b".to_string()]);
        assert!(dir.path().join("a").exists());
        assert!(dir.path().join("b").exists());
    }

    #[test]
    fn test_stream_handle_is_shared() {
        let dir = tempdir().unwrap();
        let store = store(dir.path());

        let stream = store.stream("/2/events").unwrap();
        let offset = stream.append(b"direct").unwrap();

        let got = store
            .stream_get(&path::entry_path("/2/events", offset))
            .unwrap();
        assert_eq!(got.value(), Some(&Bytes::from_static(b"direct")));
        assert_eq!(store.stream_keys(), vec!["events".to_string()]);
    }

    #[test]
    fn test_custom_prefix() {
        let dir = tempdir().unwrap();
        let store =
            FsStreamsStore::new(StreamsStoreConfig::new(dir.path()).with_prefix("/streams/"));

        let event = store
            .stream_append("/streams/log", Bytes::from_static(b"entry"))
            .unwrap();
        assert_eq!(event.node.key, "/streams/log/0");
        assert!(matches!(
            store.stream_append("/2/log", Bytes::from_static(b"entry")),
            Err(Error::InvalidPrefix(_))
        ));
    }

    #[test]
    fn test_failed_open_is_not_listed() {
        let dir = tempdir().unwrap();
        let not_a_dir = dir.path().join("file");
        std::fs::write(&not_a_dir, b"").unwrap();
        let store = store(&not_a_dir);

        assert!(matches!(
            store.stream_append("/2/events", Bytes::from_static(b"x")),
            Err(Error::Io(..))
        ));
        assert!(store.stream_keys().is_empty());

        // the slot is retried, not poisoned
        assert!(matches!(
            store.stream_get("/2/events/info"),
            Err(Error::Io(..))
        ));
    }

    #[test]
    fn test_creates_missing_directory() {
        let dir = tempdir().unwrap();
        let nested = dir.path().join("nested").join("streams");
        let store = store(&nested);

        store
            .stream_append("/2/events", Bytes::from_static(b"x"))
            .unwrap();
        assert!(nested.join("events").exists());
    }
}
