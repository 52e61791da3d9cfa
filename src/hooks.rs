//! Hook bus (C8) — in-process, synchronous, typed event emitter.
//!
//! Unlike the broadcast-channel event bus this crate's ambient stack is
//! otherwise modeled on, delivery here must be synchronous and
//! in-registration-order within the same call (§4.7, §5): all listeners
//! for an event must have run by the time the public operation that
//! raised it returns. A channel-based bus cannot give that guarantee
//! without the caller polling a receiver, so subscriptions here are
//! plain in-process callbacks invoked directly from `emit`, with
//! `unsubscribe` modeled as an id handle rather than a returned closure.

use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::model::{Kind, Snapshot};

/// All events the engine can emit, tagged by `type` per §4.7's taxonomy.
/// Each variant carries `timestamp` and `context_id` plus its own
/// payload fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum EngineEvent {
    KnowledgeObjectUpserted {
        context_id: String,
        timestamp: DateTime<Utc>,
        kind: Kind,
        id: String,
        is_new: bool,
        item: Box<Snapshot>,
    },
    LaneCreated {
        context_id: String,
        timestamp: DateTime<Utc>,
        lane_id: String,
        name: String,
    },
    LaneRemoved {
        context_id: String,
        timestamp: DateTime<Utc>,
        lane_id: String,
    },
    LaneStatusChanged {
        context_id: String,
        timestamp: DateTime<Utc>,
        lane_id: String,
        old_status: String,
        new_status: String,
    },
    LanePinChanged {
        context_id: String,
        timestamp: DateTime<Utc>,
        lane_id: String,
        kind: Kind,
        id: String,
        pinned: bool,
    },
    LaneRefreshed {
        context_id: String,
        timestamp: DateTime<Utc>,
        lane_id: String,
        selected_count: usize,
        selected: Vec<crate::lane::SelectedItem>,
    },
    LanesRefreshedAll {
        context_id: String,
        timestamp: DateTime<Utc>,
        lane_ids: Vec<String>,
    },
    ActiveWindowMerged {
        context_id: String,
        timestamp: DateTime<Utc>,
        from_lanes: Vec<String>,
        selected: Vec<crate::lane::SelectedItem>,
    },
    ArchiveCreated {
        context_id: String,
        timestamp: DateTime<Utc>,
        archive_id: String,
    },
    WorkingMemorySynthesized {
        context_id: String,
        timestamp: DateTime<Utc>,
        token_budget: u64,
        text: String,
        archive_id: String,
    },
    EvidenceIngested {
        context_id: String,
        timestamp: DateTime<Utc>,
        evidence_id: String,
        synthesized: bool,
    },
}

impl EngineEvent {
    /// The event's `type` discriminator, exactly as listed in the
    /// taxonomy table (e.g. `"knowledgeObject:upserted"`).
    pub fn event_type(&self) -> &'static str {
        match self {
            EngineEvent::KnowledgeObjectUpserted { .. } => "knowledgeObject:upserted",
            EngineEvent::LaneCreated { .. } => "lane:created",
            EngineEvent::LaneRemoved { .. } => "lane:removed",
            EngineEvent::LaneStatusChanged { .. } => "lane:statusChanged",
            EngineEvent::LanePinChanged { .. } => "lane:pinChanged",
            EngineEvent::LaneRefreshed { .. } => "lane:refreshed",
            EngineEvent::LanesRefreshedAll { .. } => "lanes:refreshedAll",
            EngineEvent::ActiveWindowMerged { .. } => "activeWindow:merged",
            EngineEvent::ArchiveCreated { .. } => "archive:created",
            EngineEvent::WorkingMemorySynthesized { .. } => "workingMemory:synthesized",
            EngineEvent::EvidenceIngested { .. } => "evidence:ingested",
        }
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            EngineEvent::KnowledgeObjectUpserted { timestamp, .. }
            | EngineEvent::LaneCreated { timestamp, .. }
            | EngineEvent::LaneRemoved { timestamp, .. }
            | EngineEvent::LaneStatusChanged { timestamp, .. }
            | EngineEvent::LanePinChanged { timestamp, .. }
            | EngineEvent::LaneRefreshed { timestamp, .. }
            | EngineEvent::LanesRefreshedAll { timestamp, .. }
            | EngineEvent::ActiveWindowMerged { timestamp, .. }
            | EngineEvent::ArchiveCreated { timestamp, .. }
            | EngineEvent::WorkingMemorySynthesized { timestamp, .. }
            | EngineEvent::EvidenceIngested { timestamp, .. } => *timestamp,
        }
    }

    pub fn context_id(&self) -> &str {
        match self {
            EngineEvent::KnowledgeObjectUpserted { context_id, .. }
            | EngineEvent::LaneCreated { context_id, .. }
            | EngineEvent::LaneRemoved { context_id, .. }
            | EngineEvent::LaneStatusChanged { context_id, .. }
            | EngineEvent::LanePinChanged { context_id, .. }
            | EngineEvent::LaneRefreshed { context_id, .. }
            | EngineEvent::LanesRefreshedAll { context_id, .. }
            | EngineEvent::ActiveWindowMerged { context_id, .. }
            | EngineEvent::ArchiveCreated { context_id, .. }
            | EngineEvent::WorkingMemorySynthesized { context_id, .. }
            | EngineEvent::EvidenceIngested { context_id, .. } => context_id,
        }
    }
}

/// Opaque handle returned by `on`/`once`/`on_any`, used with
/// [`HookBus::unsubscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(Uuid);

type Listener = Box<dyn Fn(&EngineEvent) + 'static>;

struct Entry {
    id: ListenerId,
    once: bool,
    f: Listener,
}

/// In-process event emitter with per-type listeners, a wildcard list,
/// one-shot listeners, and panic isolation.
#[derive(Default)]
pub struct HookBus {
    by_type: HashMap<&'static str, Vec<Entry>>,
    any: Vec<Entry>,
}

impl HookBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener for one event type. Returns a handle for
    /// [`HookBus::unsubscribe`].
    pub fn on(&mut self, event_type: &'static str, cb: impl Fn(&EngineEvent) + 'static) -> ListenerId {
        let id = ListenerId(Uuid::new_v4());
        self.by_type.entry(event_type).or_default().push(Entry {
            id,
            once: false,
            f: Box::new(cb),
        });
        id
    }

    /// Like `on`, but the listener is removed after it fires once.
    pub fn once(&mut self, event_type: &'static str, cb: impl Fn(&EngineEvent) + 'static) -> ListenerId {
        let id = ListenerId(Uuid::new_v4());
        self.by_type.entry(event_type).or_default().push(Entry {
            id,
            once: true,
            f: Box::new(cb),
        });
        id
    }

    /// Register a listener that fires for every event, after all typed
    /// listeners for that same event have run.
    pub fn on_any(&mut self, cb: impl Fn(&EngineEvent) + 'static) -> ListenerId {
        let id = ListenerId(Uuid::new_v4());
        self.any.push(Entry {
            id,
            once: false,
            f: Box::new(cb),
        });
        id
    }

    /// Remove a single listener by handle, wherever it is registered.
    pub fn unsubscribe(&mut self, id: ListenerId) {
        for entries in self.by_type.values_mut() {
            entries.retain(|e| e.id != id);
        }
        self.any.retain(|e| e.id != id);
    }

    /// Remove all listeners for one event type. With `None`, remove all
    /// typed listeners across every event type (wildcard listeners are
    /// untouched — use [`HookBus::off_all`] to clear everything).
    pub fn off(&mut self, event_type: Option<&str>) {
        match event_type {
            Some(t) => {
                self.by_type.remove(t);
            }
            None => self.by_type.clear(),
        }
    }

    /// Remove every listener, typed and wildcard.
    pub fn off_all(&mut self) {
        self.by_type.clear();
        self.any.clear();
    }

    /// Total number of currently registered listeners, typed plus
    /// wildcard.
    pub fn listener_count(&self) -> usize {
        self.by_type.values().map(Vec::len).sum::<usize>() + self.any.len()
    }

    /// Dispatch `event` synchronously: typed listeners for its type
    /// first, in registration order, then wildcard listeners. Listener
    /// panics are caught and logged, never propagated.
    pub fn emit(&mut self, event: EngineEvent) {
        let event_type = event.event_type();

        if let Some(entries) = self.by_type.get(event_type) {
            for entry in entries.iter() {
                dispatch_one(entry, &event);
            }
            if let Some(entries) = self.by_type.get_mut(event_type) {
                entries.retain(|e| !e.once);
            }
        }

        for entry in self.any.iter() {
            dispatch_one(entry, &event);
        }
        self.any.retain(|e| !e.once);
    }
}

fn dispatch_one(entry: &Entry, event: &EngineEvent) {
    let result = panic::catch_unwind(AssertUnwindSafe(|| (entry.f)(event)));
    if let Err(payload) = result {
        let detail = panic_message(&payload);
        tracing::warn!(event_type = event.event_type(), detail, "hook listener panicked");
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
