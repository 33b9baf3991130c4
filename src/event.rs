//! Change events emitted for every successful note mutation.

use crate::error::Result;
use crate::types::Note;
use serde::{Deserialize, Serialize};

/// Name of the topic note changes are published on.
pub const NOTE_CHANGED: &str = "noteChanged";

/// What a mutation did to a note.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChangeKind {
    #[serde(rename = "ADDED")]
    Created,
    #[serde(rename = "UPDATED")]
    Updated,
    #[serde(rename = "DELETED")]
    Deleted,
}

impl ChangeKind {
    /// Status string as it appears on the wire.
    pub fn as_status(&self) -> &'static str {
        match self {
            ChangeKind::Created => "ADDED",
            ChangeKind::Updated => "UPDATED",
            ChangeKind::Deleted => "DELETED",
        }
    }
}

/// A note mutation, as seen by subscribers.
///
/// For `Deleted` the record is the last value the note had before removal.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoteChange {
    record: Note,
    #[serde(rename = "status")]
    kind: ChangeKind,
}

impl NoteChange {
    pub fn new(record: Note, kind: ChangeKind) -> Self {
        Self { record, kind }
    }

    pub fn created(record: Note) -> Self {
        Self::new(record, ChangeKind::Created)
    }

    pub fn updated(record: Note) -> Self {
        Self::new(record, ChangeKind::Updated)
    }

    pub fn deleted(record: Note) -> Self {
        Self::new(record, ChangeKind::Deleted)
    }

    pub fn record(&self) -> &Note {
        &self.record
    }

    pub fn kind(&self) -> ChangeKind {
        self.kind
    }

    pub fn into_record(self) -> Note {
        self.record
    }

    /// Serialize to the JSON shape transports forward to clients.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}
