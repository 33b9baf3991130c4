//! Subscription types for topic fan-out.

use crossbeam_channel::{Receiver, RecvError, RecvTimeoutError, Sender, TryRecvError, TrySendError};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use super::topic::Topic;
use crate::config::OverflowPolicy;

/// Unique identifier for a subscription within a topic.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SubscriptionId(pub u64);

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

/// Why a subscription was closed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CloseReason {
    /// Cancelled by the subscriber, or its handle was dropped.
    Unsubscribed,
    /// Queue overflowed under `OverflowPolicy::Close`.
    Overflow,
    /// The topic shut down.
    Shutdown,
}

/// Outcome of a single publish.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PublishReport {
    /// Subscribers the event was queued for.
    pub delivered: usize,
    /// Subscribers that missed the event and were flagged degraded.
    pub dropped: usize,
    /// Subscribers closed during this publish.
    pub closed: usize,
}

/// Topic statistics.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TopicStats {
    pub subscribers: usize,
    pub published: u64,
    pub delivered: u64,
    pub dropped: u64,
    pub closed_on_overflow: u64,
}

/// Result of offering one event to one subscriber.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Delivery {
    Delivered,
    Dropped,
    Closed(CloseReason),
    /// Already closed before this event.
    Skipped,
}

/// Liveness of a subscriber. The sender lives only in `Active`, so closing
/// releases the sink.
enum Slot<E> {
    Active(Sender<E>),
    Closed(CloseReason),
}

/// Topic-side state of one subscription, shared with its handle.
pub(crate) struct Subscriber<E> {
    id: SubscriptionId,
    slot: Mutex<Slot<E>>,
    degraded: AtomicBool,
    dropped: AtomicU64,
}

impl<E> Subscriber<E> {
    pub(crate) fn new(id: SubscriptionId, sender: Sender<E>) -> Self {
        Self {
            id,
            slot: Mutex::new(Slot::Active(sender)),
            degraded: AtomicBool::new(false),
            dropped: AtomicU64::new(0),
        }
    }

    pub(crate) fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Offer an event. Never blocks.
    ///
    /// The liveness check and the send happen under the slot lock, so a
    /// concurrent `close` either lands before (event skipped) or after
    /// (event already queued).
    pub(crate) fn deliver(&self, event: E, policy: OverflowPolicy) -> Delivery {
        let mut slot = self.slot.lock();
        let sent = match &*slot {
            Slot::Active(sender) => sender.try_send(event),
            Slot::Closed(_) => return Delivery::Skipped,
        };

        match sent {
            Ok(()) => Delivery::Delivered,
            Err(TrySendError::Full(_)) => match policy {
                OverflowPolicy::DropNewest => {
                    self.degraded.store(true, Ordering::Release);
                    self.dropped.fetch_add(1, Ordering::Relaxed);
                    Delivery::Dropped
                }
                OverflowPolicy::Close => {
                    *slot = Slot::Closed(CloseReason::Overflow);
                    Delivery::Closed(CloseReason::Overflow)
                }
            },
            // The receiver only goes away with its handle, which unsubscribes.
            Err(TrySendError::Disconnected(_)) => {
                *slot = Slot::Closed(CloseReason::Unsubscribed);
                Delivery::Closed(CloseReason::Unsubscribed)
            }
        }
    }

    /// Transition to `Closed`. Returns false if already closed.
    pub(crate) fn close(&self, reason: CloseReason) -> bool {
        let mut slot = self.slot.lock();
        if matches!(*slot, Slot::Closed(_)) {
            return false;
        }
        *slot = Slot::Closed(reason);
        true
    }

    pub(crate) fn close_reason(&self) -> Option<CloseReason> {
        match &*self.slot.lock() {
            Slot::Active(_) => None,
            Slot::Closed(reason) => Some(*reason),
        }
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.close_reason().is_some()
    }
}

/// Handle to a live subscription.
///
/// Events arrive in publish order. Dropping the handle unsubscribes.
pub struct SubscriptionHandle<E> {
    pub(crate) receiver: Receiver<E>,
    pub(crate) shared: Arc<Subscriber<E>>,
    pub(crate) topic: Weak<Topic<E>>,
}

impl<E> SubscriptionHandle<E> {
    pub fn id(&self) -> SubscriptionId {
        self.shared.id()
    }

    /// Receive the next event (blocking). Errors once the subscription is closed.
    pub fn recv(&self) -> Result<E, RecvError> {
        if self.closed_and_drained() {
            return Err(RecvError);
        }
        let event = self.receiver.recv()?;
        // Closed while we were waiting: discard in-flight events.
        if self.closed_and_drained() {
            return Err(RecvError);
        }
        Ok(event)
    }

    /// Try to receive an event (non-blocking).
    pub fn try_recv(&self) -> Result<E, TryRecvError> {
        if self.closed_and_drained() {
            return Err(TryRecvError::Disconnected);
        }
        self.receiver.try_recv()
    }

    /// Receive with timeout.
    pub fn recv_timeout(&self, timeout: Duration) -> Result<E, RecvTimeoutError> {
        if self.closed_and_drained() {
            return Err(RecvTimeoutError::Disconnected);
        }
        let event = self.receiver.recv_timeout(timeout)?;
        if self.closed_and_drained() {
            return Err(RecvTimeoutError::Disconnected);
        }
        Ok(event)
    }

    /// Blocking iterator that ends when the subscription closes.
    pub fn iter(&self) -> impl Iterator<Item = E> + '_ {
        std::iter::from_fn(move || self.recv().ok())
    }

    /// Events waiting in the queue.
    pub fn pending(&self) -> usize {
        self.receiver.len()
    }

    pub fn is_closed(&self) -> bool {
        self.shared.is_closed()
    }

    pub fn close_reason(&self) -> Option<CloseReason> {
        self.shared.close_reason()
    }

    /// True once an event was dropped because the queue was full.
    pub fn is_degraded(&self) -> bool {
        self.shared.degraded.load(Ordering::Acquire)
    }

    /// Number of events dropped for this subscriber.
    pub fn dropped(&self) -> u64 {
        self.shared.dropped.load(Ordering::Relaxed)
    }

    /// Unsubscribe and free any queued events. Idempotent.
    pub fn cancel(&self) {
        match self.topic.upgrade() {
            Some(topic) => topic.unsubscribe(self.id()),
            None => {
                self.shared.close(CloseReason::Unsubscribed);
            }
        }
        self.discard_pending();
    }

    /// True if closed. Queued events are freed on the way out.
    fn closed_and_drained(&self) -> bool {
        if self.shared.is_closed() {
            self.discard_pending();
            return true;
        }
        false
    }

    fn discard_pending(&self) {
        while self.receiver.try_recv().is_ok() {}
    }
}

impl<E> Drop for SubscriptionHandle<E> {
    fn drop(&mut self) {
        self.cancel();
    }
}

impl<E> fmt::Debug for SubscriptionHandle<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscriptionHandle")
            .field("id", &self.id())
            .field("close_reason", &self.close_reason())
            .finish()
    }
}
