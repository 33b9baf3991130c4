//! # Note Hub
//!
//! A shared, in-memory collection of notes with live change notifications.
//!
//! ## Core Concepts
//!
//! - **Notes**: Small records with a store-assigned id, mutated one at a time
//! - **Changes**: One event per successful create, update or delete
//! - **Topics**: Named channels fanning events out to bounded per-subscriber queues
//! - **Subscriptions**: Cancellable handles; dropping one unsubscribes
//!
//! ## Example
//!
//! ```ignore
//! use notehub::{HubConfig, NoteHub, NotePatch};
//!
//! let hub = NoteHub::new(HubConfig::default())?;
//! let changes = hub.note_changed()?;
//!
//! let note = hub.create_note("Title", "Body", "ada");
//! hub.update_note(&note.id, NotePatch::default().title("New title"));
//!
//! for change in changes.iter() {
//!     println!("{} {}", change.kind().as_status(), change.record().id);
//! }
//! ```

pub mod broadcast;
pub mod config;
pub mod error;
pub mod event;
pub mod hub;
pub mod store;
pub mod types;

// Re-exports
pub use broadcast::{
    Broker, CloseReason, PublishReport, SubscriptionHandle, SubscriptionId, Topic, TopicStats,
};
pub use config::{HubConfig, OverflowPolicy, TopicConfig};
pub use error::{NoteError, Result};
pub use event::{ChangeKind, NoteChange, NOTE_CHANGED};
pub use hub::NoteHub;
pub use store::NoteStore;
pub use types::*;
