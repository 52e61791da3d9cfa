//! Lane (C4) — a named scope with status, tag filter, pin set, window
//! policy, and a cached selection refreshed against the store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::model::{Kind, Ref, Tag};
use crate::scoring::{self, WindowPolicy};
use crate::store::KnowledgeStore;

/// Lane participation state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LaneStatus {
    /// Participates in selection and merge.
    Enabled,
    /// Participates in selection but contributes nothing to merge.
    Muted,
    /// Clears its own selection and contributes nothing.
    Disabled,
}

impl std::fmt::Display for LaneStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LaneStatus::Enabled => write!(f, "enabled"),
            LaneStatus::Muted => write!(f, "muted"),
            LaneStatus::Disabled => write!(f, "disabled"),
        }
    }
}

/// One entry in a lane's pin set. `pinned: false` is a tombstone: it
/// overrides implicit pinning for this ref without removing the entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PinEntry {
    pub r: Ref,
    pub pinned: bool,
}

/// One entry in a cached selection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectedItem {
    pub r: Ref,
    pub score: f64,
    pub pinned: bool,
}

/// A named scope over the knowledge store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Lane {
    pub id: String,
    pub name: String,
    pub status: LaneStatus,
    pub include_tags_any: Vec<Tag>,
    pub pinned: Vec<PinEntry>,
    pub policy: WindowPolicy,
    pub selected: Vec<SelectedItem>,
}

impl Lane {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            status: LaneStatus::Enabled,
            include_tags_any: Vec::new(),
            pinned: Vec::new(),
            policy: WindowPolicy::default_lane(),
            selected: Vec::new(),
        }
    }

    /// Returns `Some((old, new))` iff the status actually changed.
    pub fn set_status(&mut self, status: LaneStatus) -> Option<(LaneStatus, LaneStatus)> {
        if self.status == status {
            return None;
        }
        let old = self.status;
        self.status = status;
        Some((old, status))
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    pub fn set_include_tags_any(&mut self, patterns: Vec<Tag>) {
        self.include_tags_any = patterns;
    }

    pub fn set_window_policy(&mut self, policy: WindowPolicy) {
        self.policy = policy;
    }

    /// Pin a ref. Returns `true` iff the pinned flag actually changed
    /// (new entry, or an existing entry flipped to `true`).
    pub fn pin(&mut self, r: Ref) -> bool {
        self.set_pin(r, true)
    }

    /// Tombstone a ref: records `pinned: false`, allowing unpinning
    /// without losing the entry.
    pub fn unpin(&mut self, r: Ref) -> bool {
        self.set_pin(r, false)
    }

    fn set_pin(&mut self, r: Ref, pinned: bool) -> bool {
        if let Some(entry) = self.pinned.iter_mut().find(|e| e.r == r) {
            if entry.pinned == pinned {
                return false;
            }
            entry.pinned = pinned;
            return true;
        }
        self.pinned.push(PinEntry { r, pinned });
        true
    }

    fn pin_state(&self, r: &Ref) -> Option<bool> {
        self.pinned.iter().find(|e| &e.r == r).map(|e| e.pinned)
    }

    /// The seven-step refresh algorithm from §4.4.
    pub fn refresh(&mut self, store: &KnowledgeStore, now: DateTime<Utc>) {
        debug!(lane_id = %self.id, status = %self.status, "Starting lane refresh");

        if self.status == LaneStatus::Disabled {
            self.selected.clear();
            debug!(lane_id = %self.id, "Lane refresh complete (disabled, selection cleared)");
            return;
        }

        let explicit_pins: Vec<Ref> = self
            .pinned
            .iter()
            .filter(|e| e.pinned)
            .map(|e| e.r.clone())
            .collect();

        let mut candidates: Vec<Ref> = store
            .all_active_refs()
            .into_iter()
            .filter(|r| crate::tags::tags_match_any(&store.get_item_tags(r), &self.include_tags_any))
            .collect();

        for r in &explicit_pins {
            if store.get(r).is_some() && !candidates.contains(r) {
                candidates.push(r.clone());
            }
        }

        let mut scored: Vec<SelectedItem> = Vec::with_capacity(candidates.len());
        for r in candidates {
            let Some(snapshot) = store.get(&r) else {
                continue;
            };
            let pinned = self.pin_state(&r).unwrap_or(false);
            let s = scoring::score(&self.policy, &snapshot, pinned, now);
            if s == f64::NEG_INFINITY {
                continue;
            }
            scored.push(SelectedItem { r, score: s, pinned });
        }

        sort_selection(&mut scored, store);
        scored.truncate(self.policy.max_items);
        self.selected = scored;

        debug!(lane_id = %self.id, selected = self.selected.len(), "Lane refresh complete");
    }
}

/// Sort by `(pinned first, score desc, updated_at desc, id asc)` — the
/// contract shared by lane refresh and active-window merge.
pub(crate) fn sort_selection(items: &mut [SelectedItem], store: &KnowledgeStore) {
    items.sort_by(|a, b| {
        b.pinned
            .cmp(&a.pinned)
            .then_with(|| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal))
            .then_with(|| {
                let a_updated = store.get(&a.r).map(|s| s.common().updated_at);
                let b_updated = store.get(&b.r).map(|s| s.common().updated_at);
                b_updated.cmp(&a_updated)
            })
            .then_with(|| a.r.id.cmp(&b.r.id))
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::GoalPayload;

    fn goal(store: &mut KnowledgeStore, id: &str, tags: Vec<Tag>, now: DateTime<Utc>) {
        store
            .upsert_goal(
                id,
                GoalPayload {
                    title: Some(id.to_string()),
                    tags: Some(tags),
                    ..Default::default()
                },
                now,
            )
            .unwrap();
    }

    #[test]
    fn test_disabled_lane_clears_selection() {
        let mut store = KnowledgeStore::new();
        let now = Utc::now();
        goal(&mut store, "g-1", vec![], now);
        let mut lane = Lane::new("task", "Task");
        lane.refresh(&store, now);
        assert_eq!(lane.selected.len(), 1);
        lane.set_status(LaneStatus::Disabled);
        lane.refresh(&store, now);
        assert!(lane.selected.is_empty());
    }

    #[test]
    fn test_refresh_filters_by_tag() {
        let mut store = KnowledgeStore::new();
        let now = Utc::now();
        goal(&mut store, "g-1", vec![Tag::with_value("lane", "task")], now);
        goal(&mut store, "g-2", vec![Tag::with_value("lane", "legal")], now);

        let mut lane = Lane::new("task", "Task");
        lane.set_include_tags_any(vec![Tag::with_value("lane", "task")]);
        lane.refresh(&store, now);
        assert_eq!(lane.selected.len(), 1);
        assert_eq!(lane.selected[0].r.id, "g-1");
    }

    #[test]
    fn test_pin_surfaces_item_outside_tag_filter() {
        let mut store = KnowledgeStore::new();
        let now = Utc::now();
        goal(&mut store, "g-1", vec![], now);

        let mut lane = Lane::new("task", "Task");
        lane.set_include_tags_any(vec![Tag::with_value("lane", "nonexistent")]);
        lane.pin(Ref::new(Kind::Goal, "g-1"));
        lane.refresh(&store, now);
        assert_eq!(lane.selected.len(), 1);
        assert!(lane.selected[0].pinned);
    }

    #[test]
    fn test_tombstone_pin_does_not_boost() {
        let mut store = KnowledgeStore::new();
        let now = Utc::now();
        goal(&mut store, "g-1", vec![], now);

        let mut lane = Lane::new("task", "Task");
        lane.pin(Ref::new(Kind::Goal, "g-1"));
        let changed = lane.unpin(Ref::new(Kind::Goal, "g-1"));
        assert!(changed);
        lane.refresh(&store, now);
        assert!(lane.selected.is_empty(), "tombstoned ref with no tag match should not surface");
    }

    #[test]
    fn test_max_items_truncates() {
        let mut store = KnowledgeStore::new();
        let now = Utc::now();
        for i in 0..5 {
            goal(&mut store, &format!("g-{i}"), vec![], now);
        }
        let mut lane = Lane::new("task", "Task");
        lane.policy.max_items = 2;
        lane.refresh(&store, now);
        assert_eq!(lane.selected.len(), 2);
    }

    #[test]
    fn test_set_status_returns_none_when_unchanged() {
        let mut lane = Lane::new("task", "Task");
        assert!(lane.set_status(LaneStatus::Enabled).is_none());
        assert_eq!(lane.set_status(LaneStatus::Muted), Some((LaneStatus::Enabled, LaneStatus::Muted)));
    }
}
