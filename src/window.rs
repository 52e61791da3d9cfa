//! Active window and merge (C5) — the global, deduplicated, capped
//! union of contributions from enabled lanes.

use tracing::debug;

use crate::lane::{sort_selection, Lane, LaneStatus, SelectedItem};
use crate::scoring::WindowPolicy;
use crate::store::KnowledgeStore;

/// Same shape as a lane window, but `policy` only uses `max_items` and
/// `w_pinned_boost`; `selected` always comes from a merge.
#[derive(Debug, Clone)]
pub struct ActiveWindow {
    pub policy: WindowPolicy,
    pub selected: Vec<SelectedItem>,
}

impl ActiveWindow {
    pub fn new(max_items: usize) -> Self {
        Self {
            policy: WindowPolicy {
                max_items,
                ..WindowPolicy::default_lane()
            },
            selected: Vec::new(),
        }
    }

    /// The seven-step `mergeLanesToActiveWindow` algorithm from §4.5.
    /// Returns the ids of lanes that actually contributed (enabled
    /// lanes with a non-empty selection), for the `activeWindow:merged`
    /// event payload.
    pub fn merge(&mut self, lanes: &[Lane], store: &KnowledgeStore) -> Vec<String> {
        debug!(lanes = lanes.len(), "Starting active window merge");

        let mut from_lanes = Vec::new();
        let mut merged: Vec<SelectedItem> = Vec::new();

        for lane in lanes {
            if lane.status != LaneStatus::Enabled {
                continue;
            }
            if lane.selected.is_empty() {
                continue;
            }
            from_lanes.push(lane.id.clone());
            for item in &lane.selected {
                if let Some(existing) = merged.iter_mut().find(|m| m.r == item.r) {
                    existing.pinned = existing.pinned || item.pinned;
                    if item.score > existing.score {
                        existing.score = item.score;
                    }
                } else {
                    merged.push(item.clone());
                }
            }
        }

        sort_selection(&mut merged, store);
        merged.truncate(self.policy.max_items);
        self.selected = merged;

        debug!(
            from_lanes = from_lanes.len(),
            selected = self.selected.len(),
            "Active window merge complete"
        );
        from_lanes
    }
}
