//! Archive (C7) — append-only log of synthesis results. An arena plus
//! an index: `lastArchiveId` on working memory is just an id into this
//! vector, never a second owner of the data.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::Ref;

/// One synthesis's recorded inputs and output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchiveRecord {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub merged_selected: Vec<Ref>,
    pub working_memory_text: String,
}

/// Append-only archive. Eviction of entries is a non-goal — the vector
/// only grows.
#[derive(Debug, Default)]
pub struct Archive {
    records: Vec<ArchiveRecord>,
}

impl Archive {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a new record and return its id.
    pub fn append(&mut self, id: String, timestamp: DateTime<Utc>, merged_selected: Vec<Ref>, text: String) -> String {
        self.records.push(ArchiveRecord {
            id: id.clone(),
            timestamp,
            merged_selected,
            working_memory_text: text,
        });
        id
    }

    pub fn get(&self, id: &str) -> Option<&ArchiveRecord> {
        self.records.iter().find(|r| r.id == id)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
