//! The query/mutation surface tying the store to the `noteChanged` topic.

use crate::broadcast::{Broker, SubscriptionHandle, Topic};
use crate::config::HubConfig;
use crate::error::Result;
use crate::event::{NoteChange, NOTE_CHANGED};
use crate::store::NoteStore;
use crate::types::{Note, NoteId, NoteInput, NotePatch, StoreStats};
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::debug;

/// Mutation façade over a [`NoteStore`].
///
/// Each successful mutation publishes exactly one [`NoteChange`] after the
/// store reflects it. Mutations on unknown ids return `None` and publish
/// nothing.
pub struct NoteHub {
    store: NoteStore,
    broker: Broker<NoteChange>,
    /// The `noteChanged` topic, resolved once.
    topic: Arc<Topic<NoteChange>>,
    /// Held across mutate + publish so events go out in mutation order.
    write_lock: Mutex<()>,
}

impl NoteHub {
    pub fn new(config: HubConfig) -> Result<Self> {
        config.validate()?;

        let broker = Broker::new(config.topic)?;
        let topic = broker.topic(NOTE_CHANGED)?;

        Ok(Self {
            store: NoteStore::new(),
            broker,
            topic,
            write_lock: Mutex::new(()),
        })
    }

    // --- Queries ---

    /// All notes, in creation order.
    pub fn notes(&self) -> Vec<Note> {
        self.store.list()
    }

    pub fn note(&self, id: &NoteId) -> Option<Note> {
        self.store.get(id)
    }

    // --- Mutations ---

    pub fn create_note(
        &self,
        title: impl Into<String>,
        content: impl Into<String>,
        author: impl Into<String>,
    ) -> Note {
        let _lock = self.write_lock.lock();

        let note = self.store.create(NoteInput::new(title, content, author));
        self.topic.publish(NoteChange::created(note.clone()));
        note
    }

    /// Update the fields `patch` sets. `None` if the note does not exist.
    pub fn update_note(&self, id: &NoteId, patch: NotePatch) -> Option<Note> {
        let _lock = self.write_lock.lock();

        let note = absent_if_not_found(self.store.update(id, patch))?;
        self.topic.publish(NoteChange::updated(note.clone()));
        Some(note)
    }

    /// Delete a note, returning its last value. `None` if it does not exist.
    pub fn delete_note(&self, id: &NoteId) -> Option<Note> {
        let _lock = self.write_lock.lock();

        let note = absent_if_not_found(self.store.delete(id))?;
        self.topic.publish(NoteChange::deleted(note.clone()));
        Some(note)
    }

    // --- Subscriptions ---

    /// Subscribe to note changes from now on.
    pub fn note_changed(&self) -> Result<SubscriptionHandle<NoteChange>> {
        self.topic.subscribe()
    }

    pub fn topic(&self) -> &Arc<Topic<NoteChange>> {
        &self.topic
    }

    /// Store counters. Mutations only go through the hub, so every counted
    /// mutation was published.
    pub fn stats(&self) -> StoreStats {
        self.store.stats()
    }

    /// Close every subscription. Queries and mutations keep working.
    pub fn shutdown(&self) {
        self.broker.shutdown();
    }
}

fn absent_if_not_found(result: Result<Note>) -> Option<Note> {
    match result {
        Ok(note) => Some(note),
        Err(e) => {
            debug!(error = %e, "mutation skipped");
            None
        }
    }
}
