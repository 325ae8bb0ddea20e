//! Push-style following of a stream.
//!
//! [`Stream::follow`](crate::Stream::follow) drives a [`StreamListener`] from
//! the calling thread, blocking whenever it catches up with the tail.
//! [`Stream::subscribe`](crate::Stream::subscribe) runs the same loop on a
//! dedicated thread and hands records to async code through a [`Subscription`].

use std::num::NonZeroUsize;

use bytes::Bytes;
use tokio::sync::mpsc;

use crate::error::Error;

/// Channel capacity between a follower thread and its [`Subscription`].
pub const SUBSCRIPTION_BUFFER: usize = 64;

/// Options controlling a follow session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FollowOptions {
    /// Stop cleanly after this many records have been delivered. `None` follows forever.
    pub max_records: Option<NonZeroUsize>,
}

impl FollowOptions {
    /// Follow without a record limit.
    #[must_use]
    pub const fn new() -> Self {
        Self { max_records: None }
    }

    /// Limit the session to `max_records` deliveries.
    #[must_use]
    pub const fn with_max_records(mut self, max_records: NonZeroUsize) -> Self {
        self.max_records = Some(max_records);
        self
    }
}

/// Returned by [`StreamListener::deliver`] to steer the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FollowControl {
    /// Keep delivering records.
    Continue,

    /// End the session after this record.
    Stop,
}

/// Receives records from a follow session.
pub trait StreamListener {
    /// Called once per record, in offset order.
    fn deliver(&mut self, offset: u64, payload: Bytes) -> FollowControl;

    /// Called exactly once when the session ends, with the error that ended it, if any.
    fn finished(&mut self, error: Option<Error>);
}

/// An item produced by a [`Subscription`].
#[derive(Debug)]
pub enum FollowEvent {
    /// A record read from the stream.
    Record {
        /// Offset of the record's header.
        offset: u64,
        /// Record payload.
        payload: Bytes,
    },

    /// The session has ended. No further events follow.
    Finished(Option<Error>),
}

/// Async receiving end of a follow session running on its own thread.
///
/// Dropping the subscription stops the session at its next delivery.
#[derive(Debug)]
pub struct Subscription {
    rx: mpsc::Receiver<FollowEvent>,
}

impl Subscription {
    pub(crate) const fn new(rx: mpsc::Receiver<FollowEvent>) -> Self {
        Self { rx }
    }

    /// Receives the next event, or `None` once the follower thread has gone away.
    pub async fn recv(&mut self) -> Option<FollowEvent> {
        self.rx.recv().await
    }

    /// Returns the underlying channel receiver.
    #[must_use]
    pub fn into_inner(self) -> mpsc::Receiver<FollowEvent> {
        self.rx
    }
}

/// Forwards a follow session into a bounded channel.
pub(crate) struct ChannelListener {
    tx: mpsc::Sender<FollowEvent>,
}

impl ChannelListener {
    pub(crate) const fn new(tx: mpsc::Sender<FollowEvent>) -> Self {
        Self { tx }
    }
}

impl StreamListener for ChannelListener {
    fn deliver(&mut self, offset: u64, payload: Bytes) -> FollowControl {
        match self
            .tx
            .blocking_send(FollowEvent::Record { offset, payload })
        {
            Ok(()) => FollowControl::Continue,
            Err(_) => FollowControl::Stop,
        }
    }

    fn finished(&mut self, error: Option<Error>) {
        let _ = self.tx.blocking_send(FollowEvent::Finished(error));
    }
}
