use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::level::LevelId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Item,
    PersistentActor,
}

/// Captured state of one entity at snapshot time. For items
/// `present_or_active` means "still present in the level"; for persistent
/// actors it means "currently active". `examined` only carries meaning for
/// items and defaults off for older serialized snapshots.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotEntry {
    pub unique_id: String,
    pub kind: EntityKind,
    pub present_or_active: bool,
    #[serde(default)]
    pub examined: bool,
}

/// The captured state of every savable entity in one level at one point in
/// time. Immutable once recorded.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LevelSnapshot {
    pub entries: Vec<SnapshotEntry>,
}

impl LevelSnapshot {
    pub fn entry(&self, unique_id: &str) -> Option<&SnapshotEntry> {
        self.entries
            .iter()
            .find(|entry| entry.unique_id == unique_id)
    }
}

/// In-memory map from level id to its latest snapshot. Lives for exactly one
/// play session; never persisted to disk by this layer.
#[derive(Default)]
pub struct SessionStateCache {
    snapshots: HashMap<LevelId, LevelSnapshot>,
}

impl SessionStateCache {
    pub fn record_level_state(&mut self, level: LevelId, snapshot: LevelSnapshot) {
        debug!(
            level = %level,
            entry_count = snapshot.entries.len(),
            "level_state_recorded"
        );
        self.snapshots.insert(level, snapshot);
    }

    /// Absence is the normal "never visited this session" case, not an error.
    pub fn level_state(&self, level: &LevelId) -> Option<&LevelSnapshot> {
        self.snapshots.get(level)
    }

    pub fn clear_all(&mut self) {
        debug!(dropped = self.snapshots.len(), "session_state_cleared");
        self.snapshots.clear();
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }
}
