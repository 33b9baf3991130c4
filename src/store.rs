//! In-memory note store with serialized mutations.

use crate::error::{NoteError, Result};
use crate::types::{Note, NoteId, NoteInput, NotePatch, StoreStats};
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};
use tracing::debug;

/// Store contents. Only touched under the store lock.
struct StoreInner {
    /// Notes keyed by their numeric id, which keeps creation order.
    notes: BTreeMap<u64, Note>,
    /// Note id to key mapping.
    index: HashMap<NoteId, u64>,
    /// Next id to assign.
    next_id: u64,
    created: u64,
    updated: u64,
    deleted: u64,
}

impl StoreInner {
    fn new() -> Self {
        Self {
            notes: BTreeMap::new(),
            index: HashMap::new(),
            next_id: 1,
            created: 0,
            updated: 0,
            deleted: 0,
        }
    }
}

/// The authoritative set of notes.
///
/// Every mutation runs to completion under a single write lock, so two
/// concurrent mutations can never interleave. Reads take the shared lock and
/// return owned snapshots.
pub struct NoteStore {
    inner: RwLock<StoreInner>,
}

impl NoteStore {
    /// Create an empty store. The first note gets id `"1"`.
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(StoreInner::new()),
        }
    }

    // --- Mutations ---

    /// Create a note, assigning the next id.
    pub fn create(&self, input: NoteInput) -> Note {
        let mut inner = self.inner.write();

        let key = inner.next_id;
        inner.next_id += 1;

        let note = input.into_note(NoteId::from(key));
        inner.index.insert(note.id.clone(), key);
        inner.notes.insert(key, note.clone());
        inner.created += 1;

        debug!(id = %note.id, "note created");
        note
    }

    /// Apply a partial update. Fields the patch omits keep their value.
    pub fn update(&self, id: &NoteId, patch: NotePatch) -> Result<Note> {
        let mut inner = self.inner.write();

        let key = *inner
            .index
            .get(id)
            .ok_or_else(|| NoteError::NotFound(id.clone()))?;
        let note = inner
            .notes
            .get_mut(&key)
            .ok_or_else(|| NoteError::NotFound(id.clone()))?;

        patch.apply_to(note);
        let updated = note.clone();
        inner.updated += 1;

        debug!(id = %id, "note updated");
        Ok(updated)
    }

    /// Remove a note, returning its last value.
    pub fn delete(&self, id: &NoteId) -> Result<Note> {
        let mut inner = self.inner.write();

        let key = inner
            .index
            .remove(id)
            .ok_or_else(|| NoteError::NotFound(id.clone()))?;
        let note = inner
            .notes
            .remove(&key)
            .ok_or_else(|| NoteError::NotFound(id.clone()))?;
        inner.deleted += 1;

        debug!(id = %id, "note deleted");
        Ok(note)
    }

    // --- Queries ---

    /// Snapshot of all notes in creation order.
    pub fn list(&self) -> Vec<Note> {
        self.inner.read().notes.values().cloned().collect()
    }

    /// Get a note by id.
    pub fn get(&self, id: &NoteId) -> Option<Note> {
        let inner = self.inner.read();
        inner
            .index
            .get(id)
            .and_then(|key| inner.notes.get(key))
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.inner.read().notes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> StoreStats {
        let inner = self.inner.read();
        StoreStats {
            notes: inner.notes.len(),
            next_id: inner.next_id,
            created: inner.created,
            updated: inner.updated,
            deleted: inner.deleted,
        }
    }
}

impl Default for NoteStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(title: &str) -> NoteInput {
        NoteInput::new(title, "content", "author")
    }

    #[test]
    fn test_create_assigns_sequential_ids() {
        let store = NoteStore::new();

        let a = store.create(input("a"));
        let b = store.create(input("b"));

        assert_eq!(a.id.as_str(), "1");
        assert_eq!(b.id.as_str(), "2");
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_ids_not_reused_after_delete() {
        let store = NoteStore::new();

        let a = store.create(input("a"));
        store.delete(&a.id).unwrap();
        let b = store.create(input("b"));

        assert_eq!(b.id.as_str(), "2");
        assert!(store.get(&a.id).is_none());
    }

    #[test]
    fn test_update_missing_leaves_store_unchanged() {
        let store = NoteStore::new();
        store.create(input("a"));
        let before = store.list();

        let result = store.update(&NoteId::from(99), NotePatch::default().title("x"));

        assert!(matches!(result, Err(NoteError::NotFound(_))));
        assert_eq!(store.list(), before);
        assert_eq!(store.stats().updated, 0);
    }

    #[test]
    fn test_delete_twice() {
        let store = NoteStore::new();
        let a = store.create(input("a"));

        assert_eq!(store.delete(&a.id).unwrap(), a);
        assert!(matches!(store.delete(&a.id), Err(NoteError::NotFound(_))));
        assert!(store.is_empty());
    }

    #[test]
    fn test_list_in_creation_order() {
        let store = NoteStore::new();
        for title in ["a", "b", "c", "d"] {
            store.create(input(title));
        }
        store.delete(&NoteId::from(2)).unwrap();

        let titles: Vec<_> = store.list().into_iter().map(|n| n.title).collect();
        assert_eq!(titles, vec!["a", "c", "d"]);
    }

    #[test]
    fn test_stats() {
        let store = NoteStore::new();
        let a = store.create(input("a"));
        store.create(input("b"));
        store.update(&a.id, NotePatch::default()).unwrap();
        store.delete(&a.id).unwrap();

        let stats = store.stats();
        assert_eq!(stats.notes, 1);
        assert_eq!(stats.next_id, 3);
        assert_eq!(stats.created, 2);
        assert_eq!(stats.updated, 1);
        assert_eq!(stats.deleted, 1);
    }
}
