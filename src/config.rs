//! Configuration for topics and the hub.

use crate::error::{NoteError, Result};
use serde::{Deserialize, Serialize};

/// What a topic does when a subscriber's queue is full.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverflowPolicy {
    /// Close the subscriber. It sees the end of its stream.
    #[default]
    Close,
    /// Drop the event for that subscriber only and flag it degraded.
    DropNewest,
}

/// Configuration for a topic.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TopicConfig {
    /// Max queued events per subscriber.
    /// Default: 1024
    pub buffer_size: usize,

    /// Policy when a subscriber's queue is full.
    pub overflow_policy: OverflowPolicy,
}

impl Default for TopicConfig {
    fn default() -> Self {
        Self {
            buffer_size: 1024,
            overflow_policy: OverflowPolicy::Close,
        }
    }
}

impl TopicConfig {
    pub fn validate(&self) -> Result<()> {
        if self.buffer_size == 0 {
            return Err(NoteError::InvalidConfig(
                "buffer_size must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Hub configuration.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HubConfig {
    /// Settings for the `noteChanged` topic.
    pub topic: TopicConfig,
}

impl HubConfig {
    /// Parse and validate a JSON config. Missing keys take their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: HubConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.topic.validate()
    }
}
