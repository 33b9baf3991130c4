//! Topic-based publish/subscribe for live note changes.
//!
//! This module provides in-process fan-out of events to any number of
//! subscribers:
//! - One bounded queue per subscriber, drained at the subscriber's own pace
//! - Publishing never blocks; a full queue triggers the topic's overflow policy
//! - Per-subscriber FIFO ordering
//! - No replay: a subscriber only sees events published after it subscribed
//!
//! # Example
//!
//! ```ignore
//! let topic = Topic::new("noteChanged", TopicConfig::default())?;
//! let handle = topic.subscribe()?;
//!
//! topic.publish(change);
//!
//! for event in handle.iter() {
//!     println!("Got change: {:?}", event);
//! }
//! ```

mod broker;
mod topic;
mod types;

pub use broker::Broker;
pub use topic::Topic;
pub use types::{CloseReason, PublishReport, SubscriptionHandle, SubscriptionId, TopicStats};
