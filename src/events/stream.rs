//! # MulticastStream: bounded, closable, subscribe-before-emit fan-out.
//!
//! [`MulticastStream`] delivers every sent event to every **live** subscriber.
//! There is no replay buffer: a subscriber only observes events sent after it
//! subscribed. Late subscribers miss earlier emissions by design, which pushes
//! the "subscribe before start" discipline onto the consumer (see
//! [`FeedbackBus::on_start`](crate::FeedbackBus::on_start)).
//!
//! ## Diagram
//! ```text
//!    send(ev).await
//!        │                     (clone per subscriber)
//!        ├────────────────► [queue S1] ─► Subscription S1 ─► recv()
//!        ├────────────────► [queue S2] ─► Subscription S2 ─► recv()
//!        └────────────────► [queue SN] ─► Subscription SN ─► recv()
//! ```
//!
//! ## Rules
//! - **True multicast**: every subscriber gets every event, not competing
//!   consumers.
//! - **Bounded**: each subscriber owns a queue of the stream's capacity;
//!   `send` suspends on a full queue until the subscriber drains it.
//! - **Close is monotonic**: after [`MulticastStream::close`], sends fail with
//!   [`BusError::StreamClosed`] forever; the flag never resets.
//! - **No replay**: subscribing after events were sent (or after close) never
//!   yields past events.
//!
//! ## Example
//! ```rust
//! use feedbus::{Action, MulticastStream};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() {
//!     let stream: MulticastStream<Action> = MulticastStream::new(16);
//!     let mut sub = stream.subscribe().await;
//!
//!     stream.send(Action::new("ping")).await.unwrap();
//!     stream.close().await;
//!
//!     let ev = sub.recv().await.expect("event before close");
//!     assert_eq!(ev.name.as_ref(), "ping");
//!     assert!(sub.recv().await.is_none()); // drained and closed
//! }
//! ```

use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};

use tokio::sync::{mpsc, RwLock};

use crate::error::BusError;

/// Bounded fan-out channel with an irreversible close.
///
/// Internally a registry of per-subscriber bounded [`mpsc`] queues behind an
/// [`RwLock`], plus a monotonic closed flag. Safe for concurrent `send`,
/// `subscribe`, and `close` without external locking.
pub struct MulticastStream<T> {
    /// Queue capacity granted to each subscriber (clamped to >= 1).
    capacity: usize,
    /// Live subscriber queues. Cleared exactly once on close.
    subs: RwLock<Vec<mpsc::Sender<T>>>,
    /// Permanently true after the first `close()`.
    closed: AtomicBool,
}

impl<T: Clone + Send + 'static> MulticastStream<T> {
    /// Creates a new open stream.
    ///
    /// The minimum capacity is 1 (clamped).
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            subs: RwLock::new(Vec::new()),
            closed: AtomicBool::new(false),
        }
    }

    /// Sends an event to every live subscriber.
    ///
    /// - Fails with [`BusError::StreamClosed`] if the stream was closed before
    ///   this call (checked at entry; a close racing a send in flight may still
    ///   let the send through).
    /// - Suspends while any subscriber's queue is full, until that subscriber
    ///   drains it or drops its [`Subscription`].
    /// - With zero subscribers the event is dropped and the send succeeds.
    pub async fn send(&self, ev: T) -> Result<(), BusError> {
        if self.is_closed_for_send() {
            return Err(BusError::StreamClosed);
        }

        // Snapshot senders so the lock is never held across an await.
        let senders: Vec<mpsc::Sender<T>> = self.subs.read().await.to_vec();

        let mut dropped = false;
        for tx in &senders {
            if tx.send(ev.clone()).await.is_err() {
                dropped = true;
            }
        }
        if dropped {
            self.prune().await;
        }
        Ok(())
    }

    /// Registers a new subscriber and returns its independent cursor.
    ///
    /// The subscription observes only events sent after this call. Subscribing
    /// to a closed stream yields an already-terminated subscription whose
    /// first `recv()` returns `None`.
    pub async fn subscribe(&self) -> Subscription<T> {
        let (tx, rx) = mpsc::channel(self.capacity);
        let mut subs = self.subs.write().await;
        if !self.closed.load(AtomicOrdering::Acquire) {
            subs.push(tx);
        }
        Subscription { rx }
    }

    /// Closes the stream for sending.
    ///
    /// Idempotent for callers, but the physical close (dropping all subscriber
    /// queues) happens exactly once. Returns `true` on the call that actually
    /// closed the stream. Existing subscriptions drain their queues and then
    /// terminate.
    pub async fn close(&self) -> bool {
        let mut subs = self.subs.write().await;
        if self.closed.swap(true, AtomicOrdering::AcqRel) {
            return false;
        }
        subs.clear();
        true
    }

    /// True once the stream has been closed. Monotonic.
    pub fn is_closed_for_send(&self) -> bool {
        self.closed.load(AtomicOrdering::Acquire)
    }

    /// Number of live subscribers (point-in-time).
    pub async fn subscriber_count(&self) -> usize {
        self.subs.read().await.len()
    }

    /// Drops senders whose subscription was dropped by the consumer.
    async fn prune(&self) {
        self.subs.write().await.retain(|tx| !tx.is_closed());
    }
}

/// One subscriber's cursor over a [`MulticastStream`].
///
/// Dropping the subscription unregisters it; the stream prunes its queue on
/// the next send.
pub struct Subscription<T> {
    rx: mpsc::Receiver<T>,
}

impl<T> Subscription<T> {
    /// Receives the next event, suspending until one is available.
    ///
    /// Returns `None` once the stream is closed and the queue is drained.
    pub async fn recv(&mut self) -> Option<T> {
        self.rx.recv().await
    }

    /// Receives the next event without suspending.
    ///
    /// Returns `None` when the queue is currently empty or terminated.
    pub fn try_recv(&mut self) -> Option<T> {
        self.rx.try_recv().ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::Action;
    use std::time::Duration;

    #[tokio::test]
    async fn test_send_without_subscribers_succeeds() {
        let stream: MulticastStream<Action> = MulticastStream::new(4);
        stream.send(Action::new("lost")).await.unwrap();
        assert_eq!(stream.subscriber_count().await, 0);
    }

    #[tokio::test]
    async fn test_every_subscriber_receives_every_event() {
        let stream: MulticastStream<Action> = MulticastStream::new(8);
        let mut a = stream.subscribe().await;
        let mut b = stream.subscribe().await;

        stream.send(Action::new("one")).await.unwrap();
        stream.send(Action::new("two")).await.unwrap();

        for sub in [&mut a, &mut b] {
            assert_eq!(sub.recv().await.unwrap().name.as_ref(), "one");
            assert_eq!(sub.recv().await.unwrap().name.as_ref(), "two");
        }
    }

    #[tokio::test]
    async fn test_late_subscriber_misses_earlier_events() {
        let stream: MulticastStream<Action> = MulticastStream::new(8);
        stream.send(Action::new("early")).await.unwrap();

        let mut late = stream.subscribe().await;
        stream.send(Action::new("later")).await.unwrap();

        assert_eq!(late.recv().await.unwrap().name.as_ref(), "later");
        assert!(late.try_recv().is_none());
    }

    #[tokio::test]
    async fn test_close_is_permanent_and_physically_once() {
        let stream: MulticastStream<Action> = MulticastStream::new(4);
        assert!(!stream.is_closed_for_send());

        assert!(stream.close().await);
        assert!(!stream.close().await); // second close is a no-op
        assert!(stream.is_closed_for_send());

        let err = stream.send(Action::new("nope")).await.unwrap_err();
        assert!(matches!(err, BusError::StreamClosed));
    }

    #[tokio::test]
    async fn test_subscription_drains_then_terminates_on_close() {
        let stream: MulticastStream<Action> = MulticastStream::new(4);
        let mut sub = stream.subscribe().await;

        stream.send(Action::new("buffered")).await.unwrap();
        stream.close().await;

        assert_eq!(sub.recv().await.unwrap().name.as_ref(), "buffered");
        assert!(sub.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_subscribe_after_close_terminates_immediately() {
        let stream: MulticastStream<Action> = MulticastStream::new(4);
        stream.close().await;

        let mut sub = stream.subscribe().await;
        assert!(sub.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_send_suspends_on_full_queue_until_drained() {
        let stream: std::sync::Arc<MulticastStream<Action>> =
            std::sync::Arc::new(MulticastStream::new(1));
        let mut sub = stream.subscribe().await;

        stream.send(Action::new("fills")).await.unwrap();

        let s = std::sync::Arc::clone(&stream);
        let blocked = tokio::spawn(async move { s.send(Action::new("waits")).await });

        // The queue is full and nobody is draining: the send must not finish.
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!blocked.is_finished());

        assert_eq!(sub.recv().await.unwrap().name.as_ref(), "fills");
        blocked.await.unwrap().unwrap();
        assert_eq!(sub.recv().await.unwrap().name.as_ref(), "waits");
    }

    #[tokio::test]
    async fn test_dropped_subscription_is_pruned() {
        let stream: MulticastStream<Action> = MulticastStream::new(2);
        let sub = stream.subscribe().await;
        assert_eq!(stream.subscriber_count().await, 1);

        drop(sub);
        stream.send(Action::new("after-drop")).await.unwrap();
        assert_eq!(stream.subscriber_count().await, 0);
    }
}
