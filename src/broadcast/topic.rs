//! A named broadcast channel with bounded per-subscriber queues.

use crate::config::TopicConfig;
use crate::error::{NoteError, Result};
use crossbeam_channel::bounded;
use parking_lot::{Mutex, RwLock};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, trace, warn};

use super::types::{
    CloseReason, Delivery, PublishReport, Subscriber, SubscriptionHandle, SubscriptionId,
    TopicStats,
};

/// Registry state guarded by one lock, so `shutdown` and `subscribe` cannot race.
struct Registry<E> {
    /// Active subscribers. Ids are monotonic, so iteration is registration order.
    subscribers: BTreeMap<SubscriptionId, Arc<Subscriber<E>>>,
    shut_down: bool,
}

/// Fans published events out to every active subscriber.
///
/// Publishing never blocks on a subscriber: each one has its own bounded
/// queue and a full queue is handled by the topic's `OverflowPolicy`.
pub struct Topic<E> {
    name: String,
    config: TopicConfig,
    registry: RwLock<Registry<E>>,
    /// Counter for generating subscription IDs.
    next_id: AtomicU64,
    /// Serializes publishers so every subscriber sees the same order.
    publish_lock: Mutex<()>,
    published: AtomicU64,
    delivered: AtomicU64,
    dropped: AtomicU64,
    closed_on_overflow: AtomicU64,
}

impl<E> Topic<E> {
    /// Create a new topic. Fails if `config` is invalid.
    pub fn new(name: impl Into<String>, config: TopicConfig) -> Result<Arc<Self>> {
        config.validate()?;

        Ok(Arc::new(Self {
            name: name.into(),
            config,
            registry: RwLock::new(Registry {
                subscribers: BTreeMap::new(),
                shut_down: false,
            }),
            next_id: AtomicU64::new(1),
            publish_lock: Mutex::new(()),
            published: AtomicU64::new(0),
            delivered: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
            closed_on_overflow: AtomicU64::new(0),
        }))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &TopicConfig {
        &self.config
    }

    /// Unsubscribe and release the subscriber's queue. Idempotent.
    pub fn unsubscribe(&self, id: SubscriptionId) {
        let removed = self.registry.write().subscribers.remove(&id);
        if let Some(sub) = removed {
            if sub.close(CloseReason::Unsubscribed) {
                debug!(topic = %self.name, subscription = %id, "unsubscribed");
            }
        }
    }

    /// Close every subscriber and refuse new ones.
    pub fn shutdown(&self) {
        let subscribers = {
            let mut registry = self.registry.write();
            registry.shut_down = true;
            std::mem::take(&mut registry.subscribers)
        };

        for sub in subscribers.values() {
            sub.close(CloseReason::Shutdown);
        }
        debug!(topic = %self.name, closed = subscribers.len(), "topic shut down");
    }

    pub fn is_shut_down(&self) -> bool {
        self.registry.read().shut_down
    }

    /// Get subscriber count.
    pub fn subscriber_count(&self) -> usize {
        self.registry.read().subscribers.len()
    }

    pub fn stats(&self) -> TopicStats {
        TopicStats {
            subscribers: self.subscriber_count(),
            published: self.published.load(Ordering::Relaxed),
            delivered: self.delivered.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            closed_on_overflow: self.closed_on_overflow.load(Ordering::Relaxed),
        }
    }
}

impl<E: Clone> Topic<E> {
    /// Register a new subscriber. Only events published after this returns
    /// are delivered to it.
    pub fn subscribe(self: &Arc<Self>) -> Result<SubscriptionHandle<E>> {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::SeqCst));
        let (sender, receiver) = bounded(self.config.buffer_size);
        let shared = Arc::new(Subscriber::new(id, sender));

        {
            let mut registry = self.registry.write();
            if registry.shut_down {
                return Err(NoteError::TopicClosed(self.name.clone()));
            }
            registry.subscribers.insert(id, Arc::clone(&shared));
        }

        debug!(topic = %self.name, subscription = %id, "subscribed");
        Ok(SubscriptionHandle {
            receiver,
            shared,
            topic: Arc::downgrade(self),
        })
    }

    /// Deliver an event to every active subscriber.
    ///
    /// Iterates a snapshot of the registry, so concurrent subscribe and
    /// unsubscribe calls never disturb an in-progress fan-out.
    pub fn publish(&self, event: E) -> PublishReport {
        let _lock = self.publish_lock.lock();

        let snapshot: Vec<Arc<Subscriber<E>>> =
            self.registry.read().subscribers.values().cloned().collect();

        let mut report = PublishReport::default();
        let mut to_remove = Vec::new();

        for sub in &snapshot {
            match sub.deliver(event.clone(), self.config.overflow_policy) {
                Delivery::Delivered => report.delivered += 1,
                Delivery::Dropped => {
                    report.dropped += 1;
                    warn!(topic = %self.name, subscription = %sub.id(), "subscriber queue full, event dropped");
                }
                Delivery::Closed(reason) => {
                    report.closed += 1;
                    if reason == CloseReason::Overflow {
                        self.closed_on_overflow.fetch_add(1, Ordering::Relaxed);
                        warn!(topic = %self.name, subscription = %sub.id(), "subscriber queue full, closing");
                    }
                    to_remove.push(sub.id());
                }
                Delivery::Skipped => {}
            }
        }

        // Remove closed subscriptions
        if !to_remove.is_empty() {
            let mut registry = self.registry.write();
            for id in to_remove {
                registry.subscribers.remove(&id);
            }
        }

        self.published.fetch_add(1, Ordering::Relaxed);
        self.delivered
            .fetch_add(report.delivered as u64, Ordering::Relaxed);
        self.dropped.fetch_add(report.dropped as u64, Ordering::Relaxed);

        trace!(
            topic = %self.name,
            delivered = report.delivered,
            dropped = report.dropped,
            closed = report.closed,
            "published"
        );
        report
    }
}
