//! Context façade (C9) — owns every other component and exposes the
//! engine's public operations.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::archive::Archive;
use crate::error::{ContextError, Result};
use crate::hooks::{EngineEvent, HookBus, ListenerId};
use crate::lane::{Lane, LaneStatus, SelectedItem};
use crate::model::{Kind, Ref, Snapshot, Tag};
use crate::scoring::WindowPolicy;
use crate::store::{
    AssumptionPayload, ConstraintPayload, DecisionPayload, EvidencePayload, GoalPayload,
    KnowledgeStore, QuestionPayload, UpsertOutcome,
};
use crate::synth::{self, CharQuartileEstimator, SynthesizeOptions, TokenEstimator, WorkingMemory};
use crate::window::ActiveWindow;

/// Optional overrides applied to a lane's window policy. `None` fields
/// leave the corresponding value untouched.
#[derive(Debug, Clone, Copy, Default)]
pub struct WindowPolicyPatch {
    pub w_severity: Option<f64>,
    pub w_confidence: Option<f64>,
    pub w_priority: Option<f64>,
    pub w_recency: Option<f64>,
    pub w_pinned_boost: Option<f64>,
    pub max_items: Option<usize>,
}

/// Options for `synthesize_working_memory`/`synthesize_from_lanes`.
#[derive(Debug, Clone, Copy)]
pub struct SynthesizeOpts {
    pub token_budget: u64,
    pub archive_raw_items: bool,
}

/// Options for `ingest_evidence`.
#[derive(Debug, Clone, Copy)]
pub struct IngestEvidenceOpts {
    pub synthesize: bool,
    pub token_budget: u64,
}

/// The `buildLLMContextPayload()` shape, stable for external consumers.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LlmContextPayload {
    pub meta_context_id: String,
    pub name: Option<String>,
    pub selected_count: usize,
    pub goals: Vec<String>,
    pub constraints: Vec<String>,
    pub assumptions: Vec<String>,
    pub evidence: Vec<String>,
    pub questions: Vec<String>,
    pub decisions: Vec<String>,
    pub working_memory: WorkingMemoryView,
    pub generated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkingMemoryView {
    pub text: String,
    pub updated_at: Option<DateTime<Utc>>,
    pub last_archive_id: Option<String>,
}

/// A single active meta-context instance. Owns all state exclusively;
/// must not be accessed concurrently from more than one thread at a
/// time (§5).
pub struct Context {
    id: String,
    name: Option<String>,
    store: KnowledgeStore,
    /// Insertion order of `ensure_lane` calls, the only order this
    /// engine guarantees for `refresh_all_lanes` (§9 resolved open
    /// question).
    lanes: Vec<Lane>,
    active_window: ActiveWindow,
    archive: Archive,
    working_memory: WorkingMemory,
    hooks: HookBus,
    tokenizer: Box<dyn TokenEstimator>,
}

impl Context {
    /// `createContext({id, name?})`.
    pub fn new(id: impl Into<String>, name: Option<String>) -> Self {
        Self {
            id: id.into(),
            name,
            store: KnowledgeStore::new(),
            lanes: Vec::new(),
            active_window: ActiveWindow::new(20),
            archive: Archive::new(),
            working_memory: WorkingMemory::default(),
            hooks: HookBus::new(),
            tokenizer: Box::new(CharQuartileEstimator),
        }
    }

    /// `createDefaultContext(id)` — preconfigures the five named lanes
    /// per §6's factory description.
    pub fn new_default(id: impl Into<String>) -> Self {
        let mut ctx = Self::new(id, None);
        let lane_specs: [(&str, usize); 5] = [
            ("task", 20),
            ("legal", 20),
            ("personal", 10),
            ("threat-model", 15),
            ("implementation", 25),
        ];
        for (lane_id, max_items) in lane_specs {
            ctx.ensure_lane(lane_id, None);
            let lane = ctx.lanes.iter_mut().find(|l| l.id == lane_id).expect("just inserted");
            lane.set_include_tags_any(vec![Tag::with_value("lane", lane_id)]);
            lane.policy.max_items = max_items;
        }
        ctx.active_window.policy.max_items = 35;
        ctx
    }

    /// Swap in a different tokenizer. Production callers substitute a
    /// real one here without changing any other synthesis semantics.
    pub fn set_tokenizer(&mut self, tokenizer: Box<dyn TokenEstimator>) {
        self.tokenizer = tokenizer;
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn emit(&mut self, event: EngineEvent) {
        self.hooks.emit(event);
    }

    fn emit_upserted(&mut self, kind: Kind, id: &str, outcome: &UpsertOutcome, now: DateTime<Utc>) {
        self.emit(EngineEvent::KnowledgeObjectUpserted {
            context_id: self.id.clone(),
            timestamp: now,
            kind,
            id: id.to_string(),
            is_new: outcome.is_new,
            item: Box::new(outcome.snapshot.clone()),
        });
    }

    // ---- Knowledge store entry points ----------------------------------

    pub fn upsert_goal(&mut self, id: &str, payload: GoalPayload) -> Result<Snapshot> {
        let now = self.now();
        let outcome = self.store.upsert_goal(id, payload, now)?;
        self.emit_upserted(Kind::Goal, id, &outcome, now);
        Ok(outcome.snapshot)
    }

    pub fn upsert_constraint(&mut self, id: &str, payload: ConstraintPayload) -> Result<Snapshot> {
        let now = self.now();
        let outcome = self.store.upsert_constraint(id, payload, now)?;
        self.emit_upserted(Kind::Constraint, id, &outcome, now);
        Ok(outcome.snapshot)
    }

    pub fn upsert_assumption(&mut self, id: &str, payload: AssumptionPayload) -> Result<Snapshot> {
        let now = self.now();
        let outcome = self.store.upsert_assumption(id, payload, now)?;
        self.emit_upserted(Kind::Assumption, id, &outcome, now);
        Ok(outcome.snapshot)
    }

    pub fn upsert_evidence(&mut self, id: &str, payload: EvidencePayload) -> Result<Snapshot> {
        let now = self.now();
        let outcome = self.store.upsert_evidence(id, payload, now)?;
        self.emit_upserted(Kind::Evidence, id, &outcome, now);
        Ok(outcome.snapshot)
    }

    pub fn upsert_question(&mut self, id: &str, payload: QuestionPayload) -> Result<Snapshot> {
        let now = self.now();
        let outcome = self.store.upsert_question(id, payload, now)?;
        self.emit_upserted(Kind::Question, id, &outcome, now);
        Ok(outcome.snapshot)
    }

    pub fn upsert_decision(&mut self, id: &str, payload: DecisionPayload) -> Result<Snapshot> {
        let now = self.now();
        let outcome = self.store.upsert_decision(id, payload, now)?;
        self.emit_upserted(Kind::Decision, id, &outcome, now);
        Ok(outcome.snapshot)
    }

    /// Store-level status setter. Emits `knowledgeObject:upserted` (not
    /// a dedicated status-change event — the taxonomy names one only
    /// for lanes) iff the status actually changed.
    pub fn set_status(&mut self, r: &Ref, status_name: &str) -> Result<bool> {
        let now = self.now();
        let changed = self.store.set_status(r, status_name, now)?;
        if changed {
            if let Some(snapshot) = self.store.get(r) {
                self.emit(EngineEvent::KnowledgeObjectUpserted {
                    context_id: self.id.clone(),
                    timestamp: now,
                    kind: r.kind,
                    id: r.id.clone(),
                    is_new: false,
                    item: Box::new(snapshot),
                });
            }
        }
        Ok(changed)
    }

    // ---- Lane entry points ----------------------------------------------

    /// Create a lane if it does not already exist; idempotent.
    pub fn ensure_lane(&mut self, id: &str, name: Option<String>) -> &Lane {
        if !self.lanes.iter().any(|l| l.id == id) {
            let name = name.unwrap_or_else(|| id.to_string());
            self.lanes.push(Lane::new(id, name.clone()));
            self.emit(EngineEvent::LaneCreated {
                context_id: self.id.clone(),
                timestamp: self.now(),
                lane_id: id.to_string(),
                name,
            });
        }
        self.lanes.iter().find(|l| l.id == id).expect("just ensured")
    }

    /// Removes a lane entirely, clearing its pins. Per P8, re-adding the
    /// same id yields an empty selection with no memory of prior pins.
    pub fn remove_lane(&mut self, id: &str) -> Result<()> {
        let idx = self
            .lanes
            .iter()
            .position(|l| l.id == id)
            .ok_or_else(|| ContextError::unknown_lane(id))?;
        self.lanes.remove(idx);
        self.emit(EngineEvent::LaneRemoved {
            context_id: self.id.clone(),
            timestamp: self.now(),
            lane_id: id.to_string(),
        });
        Ok(())
    }

    fn lane_mut(&mut self, id: &str) -> Result<&mut Lane> {
        self.lanes
            .iter_mut()
            .find(|l| l.id == id)
            .ok_or_else(|| ContextError::unknown_lane(id))
    }

    pub fn set_lane_status(&mut self, id: &str, status: LaneStatus) -> Result<()> {
        let now = self.now();
        let context_id = self.id.clone();
        let transition = self.lane_mut(id)?.set_status(status);
        if let Some((old, new)) = transition {
            self.emit(EngineEvent::LaneStatusChanged {
                context_id,
                timestamp: now,
                lane_id: id.to_string(),
                old_status: old.to_string(),
                new_status: new.to_string(),
            });
        }
        Ok(())
    }

    pub fn set_lane_name(&mut self, id: &str, name: impl Into<String>) -> Result<()> {
        self.lane_mut(id)?.set_name(name);
        Ok(())
    }

    pub fn set_lane_include_tags_any(&mut self, id: &str, patterns: Vec<Tag>) -> Result<()> {
        self.lane_mut(id)?.set_include_tags_any(patterns);
        Ok(())
    }

    pub fn set_lane_window_policy(&mut self, id: &str, patch: WindowPolicyPatch) -> Result<()> {
        let lane = self.lane_mut(id)?;
        let mut policy = lane.policy;
        if let Some(v) = patch.w_severity {
            policy.w_severity = v;
        }
        if let Some(v) = patch.w_confidence {
            policy.w_confidence = v;
        }
        if let Some(v) = patch.w_priority {
            policy.w_priority = v;
        }
        if let Some(v) = patch.w_recency {
            policy.w_recency = v;
        }
        if let Some(v) = patch.w_pinned_boost {
            policy.w_pinned_boost = v;
        }
        if let Some(v) = patch.max_items {
            policy.max_items = v;
        }
        lane.set_window_policy(policy);
        Ok(())
    }

    pub fn pin_in_lane(&mut self, lane_id: &str, r: Ref) -> Result<bool> {
        if self.store.get(&r).is_none() {
            return Err(ContextError::unknown_ref(r.kind, r.id));
        }
        let now = self.now();
        let context_id = self.id.clone();
        let changed = self.lane_mut(lane_id)?.pin(r.clone());
        if changed {
            self.emit(EngineEvent::LanePinChanged {
                context_id,
                timestamp: now,
                lane_id: lane_id.to_string(),
                kind: r.kind,
                id: r.id,
                pinned: true,
            });
        }
        Ok(changed)
    }

    pub fn unpin_in_lane(&mut self, lane_id: &str, r: Ref) -> Result<bool> {
        let now = self.now();
        let context_id = self.id.clone();
        let changed = self.lane_mut(lane_id)?.unpin(r.clone());
        if changed {
            self.emit(EngineEvent::LanePinChanged {
                context_id,
                timestamp: now,
                lane_id: lane_id.to_string(),
                kind: r.kind,
                id: r.id,
                pinned: false,
            });
        }
        Ok(changed)
    }

    // ---- Pipeline entry points -------------------------------------------

    pub fn refresh_lane_selection(&mut self, id: &str) -> Result<()> {
        let now = self.now();
        let context_id = self.id.clone();
        if !self.lanes.iter().any(|l| l.id == id) {
            return Err(ContextError::unknown_lane(id));
        }
        // Borrow `self.lanes` and `self.store` as disjoint fields directly
        // (not through the `lane_mut` helper) so both can be read at once.
        let lane = self.lanes.iter_mut().find(|l| l.id == id).expect("checked above");
        lane.refresh(&self.store, now);
        let selected_count = lane.selected.len();
        let selected = lane.selected.clone();
        self.emit(EngineEvent::LaneRefreshed {
            context_id,
            timestamp: now,
            lane_id: id.to_string(),
            selected_count,
            selected,
        });
        Ok(())
    }

    pub fn refresh_all_lanes(&mut self) {
        let now = self.now();
        let lane_ids: Vec<String> = self.lanes.iter().map(|l| l.id.clone()).collect();
        debug!(context_id = %self.id, lanes = lane_ids.len(), "Starting refresh of all lanes");
        for id in &lane_ids {
            // lane_mut/refresh inlined to avoid re-borrowing self.store while self is borrowed mutably
            let lane = self.lanes.iter_mut().find(|l| &l.id == id).expect("from lane_ids");
            lane.refresh(&self.store, now);
            let selected_count = lane.selected.len();
            let selected = lane.selected.clone();
            self.hooks.emit(EngineEvent::LaneRefreshed {
                context_id: self.id.clone(),
                timestamp: now,
                lane_id: id.clone(),
                selected_count,
                selected,
            });
        }
        debug!(context_id = %self.id, "Refresh of all lanes complete");
        self.emit(EngineEvent::LanesRefreshedAll {
            context_id: self.id.clone(),
            timestamp: now,
            lane_ids,
        });
    }

    pub fn merge_lanes_to_active_window(&mut self) {
        let now = self.now();
        let from_lanes = self.active_window.merge(&self.lanes, &self.store);
        let selected = self.active_window.selected.clone();
        debug!(
            context_id = %self.id,
            from_lanes = from_lanes.len(),
            selected = selected.len(),
            "Active window merge recorded"
        );
        self.emit(EngineEvent::ActiveWindowMerged {
            context_id: self.id.clone(),
            timestamp: now,
            from_lanes,
            selected,
        });
    }

    pub fn synthesize_working_memory(&mut self, opts: SynthesizeOpts) -> String {
        let now = self.now();
        let new_id = Uuid::new_v4().to_string();
        let result = synth::synthesize_working_memory(
            &mut self.store,
            &self.active_window,
            &mut self.archive,
            &mut self.working_memory,
            self.tokenizer.as_ref(),
            SynthesizeOptions {
                token_budget: opts.token_budget,
                archive_raw_items: opts.archive_raw_items,
            },
            now,
            new_id,
        );

        self.emit(EngineEvent::ArchiveCreated {
            context_id: self.id.clone(),
            timestamp: now,
            archive_id: result.archive_id.clone(),
        });
        self.emit(EngineEvent::WorkingMemorySynthesized {
            context_id: self.id.clone(),
            timestamp: now,
            token_budget: opts.token_budget,
            text: result.text.clone(),
            archive_id: result.archive_id.clone(),
        });

        for r in &result.archived_refs {
            if let Some(snapshot) = self.store.get(r) {
                self.emit(EngineEvent::KnowledgeObjectUpserted {
                    context_id: self.id.clone(),
                    timestamp: now,
                    kind: r.kind,
                    id: r.id.clone(),
                    is_new: false,
                    item: Box::new(snapshot),
                });
            }
        }

        result.text
    }

    /// `refreshAllLanes → mergeLanesToActiveWindow → synthesizeWorkingMemory`,
    /// the preferred caller entry point (§4.6). Event order is exactly
    /// `lanes:refreshedAll, activeWindow:merged, archive:created,
    /// workingMemory:synthesized` (P7).
    pub fn synthesize_from_lanes(&mut self, opts: SynthesizeOpts) -> String {
        debug!(context_id = %self.id, token_budget = opts.token_budget, "Starting synthesize_from_lanes pipeline");
        self.refresh_all_lanes();
        self.merge_lanes_to_active_window();
        let text = self.synthesize_working_memory(opts);
        debug!(context_id = %self.id, "synthesize_from_lanes pipeline complete");
        text
    }

    /// `ingestEvidence(payload, opts)`.
    pub async fn ingest_evidence(&mut self, id: &str, payload: EvidencePayload, opts: IngestEvidenceOpts) -> Result<Snapshot> {
        let snapshot = self.upsert_evidence(id, payload)?;
        self.refresh_all_lanes();

        let synthesized = opts.synthesize;
        if synthesized {
            self.merge_lanes_to_active_window();
            self.synthesize_working_memory(SynthesizeOpts {
                token_budget: opts.token_budget,
                archive_raw_items: false,
            });
        }

        self.emit(EngineEvent::EvidenceIngested {
            context_id: self.id.clone(),
            timestamp: self.now(),
            evidence_id: id.to_string(),
            synthesized,
        });

        Ok(snapshot)
    }

    // ---- View entry points -------------------------------------------------

    pub fn get_all_ids_by_kind(&self, kind: Kind) -> Vec<String> {
        self.store.get_all_ids_by_kind(kind)
    }

    pub fn summarize_ref(&self, r: &Ref) -> String {
        self.store.summarize_ref(r)
    }

    pub fn is_active(&self, r: &Ref) -> bool {
        self.store.is_active(r)
    }

    pub fn get_item_tags(&self, r: &Ref) -> Vec<Tag> {
        self.store.get_item_tags(r)
    }

    pub fn lane_list(&self) -> &[Lane] {
        &self.lanes
    }

    pub fn active_selected(&self) -> &[SelectedItem] {
        &self.active_window.selected
    }

    pub fn active_selected_summaries(&self) -> Vec<String> {
        self.active_window.selected.iter().map(|i| self.store.summarize_ref(&i.r)).collect()
    }

    pub fn working_memory(&self) -> &WorkingMemory {
        &self.working_memory
    }

    pub fn archive_len(&self) -> usize {
        self.archive.len()
    }

    pub fn archive_contains(&self, id: &str) -> bool {
        self.archive.get(id).is_some()
    }

    pub fn build_llm_context_payload(&self) -> LlmContextPayload {
        let mut by_kind: [Vec<String>; 6] = Default::default();
        for item in &self.active_window.selected {
            let idx = Kind::ALL.iter().position(|&k| k == item.r.kind).expect("exhaustive");
            by_kind[idx].push(self.store.summarize_ref(&item.r));
        }

        LlmContextPayload {
            meta_context_id: self.id.clone(),
            name: self.name.clone(),
            selected_count: self.active_window.selected.len(),
            goals: by_kind[0].clone(),
            constraints: by_kind[1].clone(),
            assumptions: by_kind[2].clone(),
            evidence: by_kind[3].clone(),
            questions: by_kind[4].clone(),
            decisions: by_kind[5].clone(),
            working_memory: WorkingMemoryView {
                text: self.working_memory.text.clone(),
                updated_at: self.working_memory.updated_at,
                last_archive_id: self.working_memory.last_archive_id.clone(),
            },
            generated_at: self.now(),
        }
    }

    // ---- Hooks --------------------------------------------------------------

    pub fn on(&mut self, event_type: &'static str, cb: impl Fn(&EngineEvent) + 'static) -> ListenerId {
        self.hooks.on(event_type, cb)
    }

    pub fn once(&mut self, event_type: &'static str, cb: impl Fn(&EngineEvent) + 'static) -> ListenerId {
        self.hooks.once(event_type, cb)
    }

    pub fn on_any(&mut self, cb: impl Fn(&EngineEvent) + 'static) -> ListenerId {
        self.hooks.on_any(cb)
    }

    pub fn off(&mut self, event_type: Option<&str>) {
        self.hooks.off(event_type)
    }

    pub fn off_all(&mut self) {
        self.hooks.off_all()
    }

    pub fn listener_count(&self) -> usize {
        self.hooks.listener_count()
    }

    pub fn unsubscribe(&mut self, id: ListenerId) {
        self.hooks.unsubscribe(id)
    }
}

/// `createContext({id, name?})`.
pub fn create_context(id: impl Into<String>, name: Option<String>) -> Context {
    Context::new(id, name)
}

/// `createDefaultContext(id)`.
pub fn create_default_context(id: impl Into<String>) -> Context {
    Context::new_default(id)
}
