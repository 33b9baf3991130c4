//! Named topics, created on first use.

use crate::config::TopicConfig;
use crate::error::{NoteError, Result};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

use super::topic::Topic;
use super::types::{PublishReport, SubscriptionHandle};

struct BrokerInner<E> {
    topics: HashMap<String, Arc<Topic<E>>>,
    shut_down: bool,
}

/// A set of named topics sharing one configuration.
pub struct Broker<E> {
    config: TopicConfig,
    inner: RwLock<BrokerInner<E>>,
}

impl<E: Clone> Broker<E> {
    /// Create a broker. Fails if `config` is invalid.
    pub fn new(config: TopicConfig) -> Result<Self> {
        config.validate()?;

        Ok(Self {
            config,
            inner: RwLock::new(BrokerInner {
                topics: HashMap::new(),
                shut_down: false,
            }),
        })
    }

    /// Get a topic, creating it if needed.
    pub fn topic(&self, name: &str) -> Result<Arc<Topic<E>>> {
        if let Some(topic) = self.inner.read().topics.get(name) {
            return Ok(Arc::clone(topic));
        }

        let mut inner = self.inner.write();
        if inner.shut_down {
            return Err(NoteError::TopicClosed(name.to_string()));
        }
        if let Some(topic) = inner.topics.get(name) {
            return Ok(Arc::clone(topic));
        }

        let topic = Topic::new(name, self.config.clone())?;
        inner.topics.insert(name.to_string(), Arc::clone(&topic));
        debug!(topic = name, "topic created");
        Ok(topic)
    }

    /// Publish to a topic. A topic nobody has touched has no subscribers,
    /// so this does not create it.
    pub fn publish(&self, name: &str, event: E) -> PublishReport {
        let topic = self.inner.read().topics.get(name).cloned();
        match topic {
            Some(topic) => topic.publish(event),
            None => PublishReport::default(),
        }
    }

    pub fn subscribe(&self, name: &str) -> Result<SubscriptionHandle<E>> {
        self.topic(name)?.subscribe()
    }

    /// Names of all topics, sorted.
    pub fn topic_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.inner.read().topics.keys().cloned().collect();
        names.sort();
        names
    }

    /// Shut down every topic. New topics can no longer be created.
    pub fn shutdown(&self) {
        let topics: Vec<Arc<Topic<E>>> = {
            let mut inner = self.inner.write();
            inner.shut_down = true;
            inner.topics.values().cloned().collect()
        };
        for topic in topics {
            topic.shutdown();
        }
    }
}
