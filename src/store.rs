//! Knowledge store (C1) — typed maps from id to object, one per kind.
//!
//! Each kind owns its own `HashMap<String, T>`. Upserting never deletes
//! anything, it only sets or overwrites fields; removal happens via
//! status transitions, never physical deletion, per the lifecycle rule.

use std::collections::HashMap;

use chrono::{DateTime, Utc};

use crate::error::{ContextError, Result};
use crate::model::{
    Assumption, Common, Confidence, Constraint, ConstraintStatus, Decision, DecisionStatus,
    Evidence, Goal, GoalStatus, Kind, Priority, Provenance, ProvenanceSource, Question,
    QuestionStatus, Ref, Severity, Snapshot, Tag,
};

/// Payload accepted by `upsert_goal`. `None` fields are left untouched on
/// update and defaulted on insert, per §4.1.
#[derive(Debug, Clone, Default)]
pub struct GoalPayload {
    pub title: Option<String>,
    pub description: Option<String>,
    pub priority: Option<Priority>,
    pub status: Option<GoalStatus>,
    pub tags: Option<Vec<Tag>>,
    pub provenance: Option<Provenance>,
}

#[derive(Debug, Clone, Default)]
pub struct ConstraintPayload {
    pub statement: Option<String>,
    pub priority: Option<Priority>,
    pub status: Option<ConstraintStatus>,
    pub tags: Option<Vec<Tag>>,
    pub provenance: Option<Provenance>,
}

#[derive(Debug, Clone, Default)]
pub struct AssumptionPayload {
    pub statement: Option<String>,
    pub confidence: Option<Confidence>,
    pub tags: Option<Vec<Tag>>,
    pub provenance: Option<Provenance>,
}

#[derive(Debug, Clone, Default)]
pub struct EvidencePayload {
    pub summary: Option<String>,
    pub detail: Option<String>,
    pub severity: Option<Severity>,
    pub confidence: Option<Confidence>,
    pub tags: Option<Vec<Tag>>,
    pub provenance: Option<Provenance>,
}

#[derive(Debug, Clone, Default)]
pub struct QuestionPayload {
    pub question: Option<String>,
    pub priority: Option<Priority>,
    pub status: Option<QuestionStatus>,
    pub tags: Option<Vec<Tag>>,
    pub provenance: Option<Provenance>,
}

#[derive(Debug, Clone, Default)]
pub struct DecisionPayload {
    pub statement: Option<String>,
    pub rationale: Option<String>,
    pub status: Option<DecisionStatus>,
    pub tags: Option<Vec<Tag>>,
    pub provenance: Option<Provenance>,
}

/// Outcome of an upsert: the resulting snapshot and whether the id was
/// new (used to pick `isNew` for the `knowledgeObject:upserted` event).
pub struct UpsertOutcome {
    pub snapshot: Snapshot,
    pub is_new: bool,
}

/// In-memory typed maps for all six kinds.
#[derive(Debug, Default)]
pub struct KnowledgeStore {
    goals: HashMap<String, Goal>,
    constraints: HashMap<String, Constraint>,
    assumptions: HashMap<String, Assumption>,
    evidence: HashMap<String, Evidence>,
    questions: HashMap<String, Question>,
    decisions: HashMap<String, Decision>,
}

impl KnowledgeStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn upsert_goal(&mut self, id: &str, payload: GoalPayload, now: DateTime<Utc>) -> Result<UpsertOutcome> {
        let is_new = !self.goals.contains_key(id);
        if is_new {
            let title = payload
                .title
                .ok_or_else(|| ContextError::invalid_payload(Kind::Goal, "missing required field: title"))?;
            let provenance = payload
                .provenance
                .unwrap_or_else(|| Provenance::new(ProvenanceSource::User, now));
            let mut common = Common::new(id, now, provenance);
            common.tags = payload.tags.unwrap_or_default();
            self.goals.insert(
                id.to_string(),
                Goal {
                    common,
                    title,
                    description: payload.description,
                    priority: payload.priority.unwrap_or_default(),
                    status: payload.status.unwrap_or_default(),
                },
            );
        } else {
            let obj = self.goals.get_mut(id).expect("checked contains_key");
            if let Some(title) = payload.title {
                obj.title = title;
            }
            if payload.description.is_some() {
                obj.description = payload.description;
            }
            if let Some(priority) = payload.priority {
                obj.priority = priority;
            }
            if let Some(status) = payload.status {
                obj.status = status;
            }
            if let Some(tags) = payload.tags {
                obj.common.tags = tags;
            }
            if let Some(provenance) = payload.provenance {
                obj.common.provenance = provenance;
            }
            obj.common.touch(now);
        }
        Ok(UpsertOutcome {
            snapshot: Snapshot::Goal(self.goals[id].clone()),
            is_new,
        })
    }

    pub fn upsert_constraint(
        &mut self,
        id: &str,
        payload: ConstraintPayload,
        now: DateTime<Utc>,
    ) -> Result<UpsertOutcome> {
        let is_new = !self.constraints.contains_key(id);
        if is_new {
            let statement = payload.statement.ok_or_else(|| {
                ContextError::invalid_payload(Kind::Constraint, "missing required field: statement")
            })?;
            let provenance = payload
                .provenance
                .unwrap_or_else(|| Provenance::new(ProvenanceSource::User, now));
            let mut common = Common::new(id, now, provenance);
            common.tags = payload.tags.unwrap_or_default();
            self.constraints.insert(
                id.to_string(),
                Constraint {
                    common,
                    statement,
                    priority: payload.priority.unwrap_or_default(),
                    status: payload.status.unwrap_or_default(),
                },
            );
        } else {
            let obj = self.constraints.get_mut(id).expect("checked contains_key");
            if let Some(statement) = payload.statement {
                obj.statement = statement;
            }
            if let Some(priority) = payload.priority {
                obj.priority = priority;
            }
            if let Some(status) = payload.status {
                obj.status = status;
            }
            if let Some(tags) = payload.tags {
                obj.common.tags = tags;
            }
            if let Some(provenance) = payload.provenance {
                obj.common.provenance = provenance;
            }
            obj.common.touch(now);
        }
        Ok(UpsertOutcome {
            snapshot: Snapshot::Constraint(self.constraints[id].clone()),
            is_new,
        })
    }

    pub fn upsert_assumption(
        &mut self,
        id: &str,
        payload: AssumptionPayload,
        now: DateTime<Utc>,
    ) -> Result<UpsertOutcome> {
        let is_new = !self.assumptions.contains_key(id);
        if is_new {
            let statement = payload.statement.ok_or_else(|| {
                ContextError::invalid_payload(Kind::Assumption, "missing required field: statement")
            })?;
            let provenance = payload
                .provenance
                .unwrap_or_else(|| Provenance::new(ProvenanceSource::Inference, now));
            let mut common = Common::new(id, now, provenance);
            common.tags = payload.tags.unwrap_or_default();
            self.assumptions.insert(
                id.to_string(),
                Assumption {
                    common,
                    statement,
                    confidence: payload.confidence.unwrap_or_default(),
                },
            );
        } else {
            let obj = self.assumptions.get_mut(id).expect("checked contains_key");
            if let Some(statement) = payload.statement {
                obj.statement = statement;
            }
            if let Some(confidence) = payload.confidence {
                obj.confidence = confidence;
            }
            if let Some(tags) = payload.tags {
                obj.common.tags = tags;
            }
            if let Some(provenance) = payload.provenance {
                obj.common.provenance = provenance;
            }
            obj.common.touch(now);
        }
        Ok(UpsertOutcome {
            snapshot: Snapshot::Assumption(self.assumptions[id].clone()),
            is_new,
        })
    }

    pub fn upsert_evidence(
        &mut self,
        id: &str,
        payload: EvidencePayload,
        now: DateTime<Utc>,
    ) -> Result<UpsertOutcome> {
        let is_new = !self.evidence.contains_key(id);
        if is_new {
            let summary = payload.summary.ok_or_else(|| {
                ContextError::invalid_payload(Kind::Evidence, "missing required field: summary")
            })?;
            let provenance = payload
                .provenance
                .unwrap_or_else(|| Provenance::new(ProvenanceSource::User, now));
            let mut common = Common::new(id, now, provenance);
            common.tags = payload.tags.unwrap_or_default();
            self.evidence.insert(
                id.to_string(),
                Evidence {
                    common,
                    summary,
                    detail: payload.detail,
                    severity: payload.severity.unwrap_or_default(),
                    confidence: payload.confidence.unwrap_or_default(),
                },
            );
        } else {
            let obj = self.evidence.get_mut(id).expect("checked contains_key");
            if let Some(summary) = payload.summary {
                obj.summary = summary;
            }
            if payload.detail.is_some() {
                obj.detail = payload.detail;
            }
            if let Some(severity) = payload.severity {
                obj.severity = severity;
            }
            if let Some(confidence) = payload.confidence {
                obj.confidence = confidence;
            }
            if let Some(tags) = payload.tags {
                obj.common.tags = tags;
            }
            if let Some(provenance) = payload.provenance {
                obj.common.provenance = provenance;
            }
            obj.common.touch(now);
        }
        Ok(UpsertOutcome {
            snapshot: Snapshot::Evidence(self.evidence[id].clone()),
            is_new,
        })
    }

    pub fn upsert_question(
        &mut self,
        id: &str,
        payload: QuestionPayload,
        now: DateTime<Utc>,
    ) -> Result<UpsertOutcome> {
        let is_new = !self.questions.contains_key(id);
        if is_new {
            let question = payload.question.ok_or_else(|| {
                ContextError::invalid_payload(Kind::Question, "missing required field: question")
            })?;
            let provenance = payload
                .provenance
                .unwrap_or_else(|| Provenance::new(ProvenanceSource::User, now));
            let mut common = Common::new(id, now, provenance);
            common.tags = payload.tags.unwrap_or_default();
            self.questions.insert(
                id.to_string(),
                Question {
                    common,
                    question,
                    priority: payload.priority.unwrap_or_default(),
                    status: payload.status.unwrap_or_default(),
                },
            );
        } else {
            let obj = self.questions.get_mut(id).expect("checked contains_key");
            if let Some(question) = payload.question {
                obj.question = question;
            }
            if let Some(priority) = payload.priority {
                obj.priority = priority;
            }
            if let Some(status) = payload.status {
                obj.status = status;
            }
            if let Some(tags) = payload.tags {
                obj.common.tags = tags;
            }
            if let Some(provenance) = payload.provenance {
                obj.common.provenance = provenance;
            }
            obj.common.touch(now);
        }
        Ok(UpsertOutcome {
            snapshot: Snapshot::Question(self.questions[id].clone()),
            is_new,
        })
    }

    pub fn upsert_decision(
        &mut self,
        id: &str,
        payload: DecisionPayload,
        now: DateTime<Utc>,
    ) -> Result<UpsertOutcome> {
        let is_new = !self.decisions.contains_key(id);
        if is_new {
            let statement = payload.statement.ok_or_else(|| {
                ContextError::invalid_payload(Kind::Decision, "missing required field: statement")
            })?;
            let provenance = payload
                .provenance
                .unwrap_or_else(|| Provenance::new(ProvenanceSource::User, now));
            let mut common = Common::new(id, now, provenance);
            common.tags = payload.tags.unwrap_or_default();
            self.decisions.insert(
                id.to_string(),
                Decision {
                    common,
                    statement,
                    rationale: payload.rationale,
                    status: payload.status.unwrap_or_default(),
                },
            );
        } else {
            let obj = self.decisions.get_mut(id).expect("checked contains_key");
            if let Some(statement) = payload.statement {
                obj.statement = statement;
            }
            if payload.rationale.is_some() {
                obj.rationale = payload.rationale;
            }
            if let Some(status) = payload.status {
                obj.status = status;
            }
            if let Some(tags) = payload.tags {
                obj.common.tags = tags;
            }
            if let Some(provenance) = payload.provenance {
                obj.common.provenance = provenance;
            }
            obj.common.touch(now);
        }
        Ok(UpsertOutcome {
            snapshot: Snapshot::Decision(self.decisions[id].clone()),
            is_new,
        })
    }

    /// Snapshot accessor for a single ref, regardless of kind.
    pub fn get(&self, r: &Ref) -> Option<Snapshot> {
        match r.kind {
            Kind::Goal => self.goals.get(&r.id).cloned().map(Snapshot::Goal),
            Kind::Constraint => self.constraints.get(&r.id).cloned().map(Snapshot::Constraint),
            Kind::Assumption => self.assumptions.get(&r.id).cloned().map(Snapshot::Assumption),
            Kind::Evidence => self.evidence.get(&r.id).cloned().map(Snapshot::Evidence),
            Kind::Question => self.questions.get(&r.id).cloned().map(Snapshot::Question),
            Kind::Decision => self.decisions.get(&r.id).cloned().map(Snapshot::Decision),
        }
    }

    /// True iff the ref exists and is active (invariant 1).
    pub fn is_active(&self, r: &Ref) -> bool {
        self.get(r).map(|s| s.is_active()).unwrap_or(false)
    }

    /// All ids of a given kind, insertion order not guaranteed (hash map).
    pub fn get_all_ids_by_kind(&self, kind: Kind) -> Vec<String> {
        match kind {
            Kind::Goal => self.goals.keys().cloned().collect(),
            Kind::Constraint => self.constraints.keys().cloned().collect(),
            Kind::Assumption => self.assumptions.keys().cloned().collect(),
            Kind::Evidence => self.evidence.keys().cloned().collect(),
            Kind::Question => self.questions.keys().cloned().collect(),
            Kind::Decision => self.decisions.keys().cloned().collect(),
        }
    }

    pub fn get_item_tags(&self, r: &Ref) -> Vec<Tag> {
        self.get(r).map(|s| s.common().tags.clone()).unwrap_or_default()
    }

    /// Primary human-readable field for a ref, `""` if it does not exist,
    /// per §4.2's `summarizeRef`.
    pub fn summarize_ref(&self, r: &Ref) -> String {
        self.get(r).map(|s| s.primary_text().to_string()).unwrap_or_default()
    }

    /// All active refs across all kinds, used by lane refresh to build
    /// its candidate set.
    pub fn all_active_refs(&self) -> Vec<Ref> {
        Kind::ALL
            .iter()
            .flat_map(|&kind| {
                self.get_all_ids_by_kind(kind)
                    .into_iter()
                    .map(move |id| Ref::new(kind, id))
            })
            .filter(|r| self.is_active(r))
            .collect()
    }

    /// Update a ref's status. No-op (returns `Ok(false)`) if the status is
    /// unchanged, per §4.1 — callers use this to decide whether to emit a
    /// status-changed event.
    pub fn set_status(&mut self, r: &Ref, status_name: &str, now: DateTime<Utc>) -> Result<bool> {
        match r.kind {
            Kind::Goal => {
                let obj = self
                    .goals
                    .get_mut(&r.id)
                    .ok_or_else(|| ContextError::unknown_ref(r.kind, r.id.clone()))?;
                let status = parse_goal_status(status_name, r)?;
                if obj.status == status {
                    return Ok(false);
                }
                obj.status = status;
                obj.common.touch(now);
                Ok(true)
            }
            Kind::Constraint => {
                let obj = self
                    .constraints
                    .get_mut(&r.id)
                    .ok_or_else(|| ContextError::unknown_ref(r.kind, r.id.clone()))?;
                let status = parse_constraint_status(status_name, r)?;
                if obj.status == status {
                    return Ok(false);
                }
                obj.status = status;
                obj.common.touch(now);
                Ok(true)
            }
            Kind::Question => {
                let obj = self
                    .questions
                    .get_mut(&r.id)
                    .ok_or_else(|| ContextError::unknown_ref(r.kind, r.id.clone()))?;
                let status = parse_question_status(status_name, r)?;
                if obj.status == status {
                    return Ok(false);
                }
                obj.status = status;
                obj.common.touch(now);
                Ok(true)
            }
            Kind::Decision => {
                let obj = self
                    .decisions
                    .get_mut(&r.id)
                    .ok_or_else(|| ContextError::unknown_ref(r.kind, r.id.clone()))?;
                let status = parse_decision_status(status_name, r)?;
                if obj.status == status {
                    return Ok(false);
                }
                obj.status = status;
                obj.common.touch(now);
                Ok(true)
            }
            Kind::Assumption | Kind::Evidence => {
                Err(ContextError::invalid_payload(r.kind, "this kind has no status field"))
            }
        }
    }

    /// Transition `r` to `archived` iff its kind has a status field and it
    /// is currently active/open. Evidence and assumption are left alone,
    /// per §4.6 step 7. Returns whether a transition happened.
    pub fn archive_if_has_status(&mut self, r: &Ref, now: DateTime<Utc>) -> bool {
        match r.kind {
            Kind::Goal => {
                if let Some(obj) = self.goals.get_mut(&r.id) {
                    if obj.status.is_active() {
                        obj.status = GoalStatus::Archived;
                        obj.common.touch(now);
                        return true;
                    }
                }
                false
            }
            Kind::Constraint => {
                if let Some(obj) = self.constraints.get_mut(&r.id) {
                    if obj.status.is_active() {
                        obj.status = ConstraintStatus::Archived;
                        obj.common.touch(now);
                        return true;
                    }
                }
                false
            }
            Kind::Question => {
                if let Some(obj) = self.questions.get_mut(&r.id) {
                    if obj.status.is_active() {
                        obj.status = QuestionStatus::Archived;
                        obj.common.touch(now);
                        return true;
                    }
                }
                false
            }
            Kind::Decision => {
                if let Some(obj) = self.decisions.get_mut(&r.id) {
                    if obj.status.is_active() {
                        obj.status = DecisionStatus::Archived;
                        obj.common.touch(now);
                        return true;
                    }
                }
                false
            }
            Kind::Assumption | Kind::Evidence => false,
        }
    }
}

fn parse_goal_status(name: &str, r: &Ref) -> Result<GoalStatus> {
    match name {
        "active" => Ok(GoalStatus::Active),
        "done" => Ok(GoalStatus::Done),
        "archived" => Ok(GoalStatus::Archived),
        other => Err(ContextError::invalid_payload(
            r.kind,
            format!("unknown status for goal: {other}"),
        )),
    }
}

fn parse_constraint_status(name: &str, r: &Ref) -> Result<ConstraintStatus> {
    match name {
        "active" => Ok(ConstraintStatus::Active),
        "archived" => Ok(ConstraintStatus::Archived),
        other => Err(ContextError::invalid_payload(
            r.kind,
            format!("unknown status for constraint: {other}"),
        )),
    }
}

fn parse_question_status(name: &str, r: &Ref) -> Result<QuestionStatus> {
    match name {
        "open" | "active" => Ok(QuestionStatus::Open),
        "done" => Ok(QuestionStatus::Done),
        "archived" => Ok(QuestionStatus::Archived),
        other => Err(ContextError::invalid_payload(
            r.kind,
            format!("unknown status for question: {other}"),
        )),
    }
}

fn parse_decision_status(name: &str, r: &Ref) -> Result<DecisionStatus> {
    match name {
        "active" => Ok(DecisionStatus::Active),
        "archived" => Ok(DecisionStatus::Archived),
        other => Err(ContextError::invalid_payload(
            r.kind,
            format!("unknown status for decision: {other}"),
        )),
    }
}
