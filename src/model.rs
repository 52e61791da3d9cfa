//! Knowledge-object data model.
//!
//! Six kinds (goal, constraint, assumption, evidence, question, decision)
//! are first-class tagged variants rather than one loosely-typed struct —
//! each kind gets its own Rust type with only the fields that kind has,
//! and the `Kind` enum is the discriminator used everywhere a caller
//! needs to talk about a kind without holding an instance.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Discriminator for the six knowledge-object kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Kind {
    Goal,
    Constraint,
    Assumption,
    Evidence,
    Question,
    Decision,
}

impl Kind {
    /// All six kinds, in the canonical section order used by synthesis.
    pub const ALL: [Kind; 6] = [
        Kind::Goal,
        Kind::Constraint,
        Kind::Assumption,
        Kind::Evidence,
        Kind::Question,
        Kind::Decision,
    ];

    /// Section label used when rendering working memory.
    pub fn section_label(&self) -> &'static str {
        match self {
            Kind::Goal => "Goals",
            Kind::Constraint => "Constraints",
            Kind::Assumption => "Assumptions",
            Kind::Evidence => "Evidence",
            Kind::Question => "Questions",
            Kind::Decision => "Decisions",
        }
    }
}

impl std::fmt::Display for Kind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Kind::Goal => write!(f, "goal"),
            Kind::Constraint => write!(f, "constraint"),
            Kind::Assumption => write!(f, "assumption"),
            Kind::Evidence => write!(f, "evidence"),
            Kind::Question => write!(f, "question"),
            Kind::Decision => write!(f, "decision"),
        }
    }
}

/// A `(kind, id)` pair uniquely identifying a knowledge object.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Ref {
    pub kind: Kind,
    pub id: String,
}

impl Ref {
    pub fn new(kind: Kind, id: impl Into<String>) -> Self {
        Self {
            kind,
            id: id.into(),
        }
    }
}

/// A structural tag: a bare key, or a key/value pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub key: String,
    pub value: Option<String>,
}

impl Tag {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: None,
        }
    }

    pub fn with_value(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: Some(value.into()),
        }
    }

    /// Whether this tag, used as a *pattern*, matches `item_tag`.
    ///
    /// Keys compare case-sensitively. A pattern with no `value` matches
    /// any value for that key.
    pub fn matches(&self, item_tag: &Tag) -> bool {
        if self.key != item_tag.key {
            return false;
        }
        match &self.value {
            None => true,
            Some(v) => item_tag.value.as_deref() == Some(v.as_str()),
        }
    }
}

/// Where a knowledge object came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProvenanceSource {
    User,
    System,
    Inference,
    Web,
    Tool,
}

/// Provenance metadata attached to every knowledge object.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Provenance {
    pub source: ProvenanceSource,
    /// Opaque pointer into the source system (a URL, a tool-call id, …).
    pub reference: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Provenance {
    pub fn new(source: ProvenanceSource, now: DateTime<Utc>) -> Self {
        Self {
            source,
            reference: None,
            created_at: now,
        }
    }

    pub fn with_reference(mut self, reference: impl Into<String>) -> Self {
        self.reference = Some(reference.into());
        self
    }
}

/// Priority used by goal/constraint/question/decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    P0,
    P1,
    P2,
    P3,
}

impl Priority {
    /// `p0=3 .. p3=0`, as used by the scoring function's `P` term.
    pub fn value(self) -> u8 {
        match self {
            Priority::P0 => 3,
            Priority::P1 => 2,
            Priority::P2 => 1,
            Priority::P3 => 0,
        }
    }
}

impl Default for Priority {
    fn default() -> Self {
        Priority::P2
    }
}

/// Severity used by evidence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    /// `low=1 .. critical=4` — shared by the scoring `S` term and the
    /// evidence weight formula's `severityScore`.
    pub fn score(self) -> u8 {
        match self {
            Severity::Low => 1,
            Severity::Medium => 2,
            Severity::High => 3,
            Severity::Critical => 4,
        }
    }
}

impl Default for Severity {
    fn default() -> Self {
        Severity::Medium
    }
}

/// Confidence used by assumption/evidence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Confidence {
    Low,
    Medium,
    High,
}

impl Confidence {
    /// `low=1, medium=2, high=3` — the scoring function's `C` term.
    pub fn value(self) -> u8 {
        match self {
            Confidence::Low => 1,
            Confidence::Medium => 2,
            Confidence::High => 3,
        }
    }

    /// `low=0.7, medium=1.0, high=1.3` — the evidence weight's
    /// `confidenceFactor`, a distinct scale from `value()`.
    pub fn factor(self) -> f64 {
        match self {
            Confidence::Low => 0.7,
            Confidence::Medium => 1.0,
            Confidence::High => 1.3,
        }
    }
}

impl Default for Confidence {
    fn default() -> Self {
        Confidence::Medium
    }
}

/// Fields shared by every knowledge object, regardless of kind.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Common {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub tags: Vec<Tag>,
    pub provenance: Provenance,
}

impl Common {
    pub fn new(id: impl Into<String>, now: DateTime<Utc>, provenance: Provenance) -> Self {
        Self {
            id: id.into(),
            created_at: now,
            updated_at: now,
            tags: Vec::new(),
            provenance,
        }
    }

    /// Bump `updated_at`, preserving `created_at` — every upsert touches
    /// this, per invariant 2.
    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.updated_at = now;
    }
}

/// Status of a goal. A goal is active iff not `Done`/`Archived`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GoalStatus {
    Active,
    Done,
    Archived,
}

impl GoalStatus {
    pub fn is_active(self) -> bool {
        matches!(self, GoalStatus::Active)
    }
}

impl Default for GoalStatus {
    fn default() -> Self {
        GoalStatus::Active
    }
}

/// Status of a constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConstraintStatus {
    Active,
    Archived,
}

impl ConstraintStatus {
    pub fn is_active(self) -> bool {
        matches!(self, ConstraintStatus::Active)
    }
}

impl Default for ConstraintStatus {
    fn default() -> Self {
        ConstraintStatus::Active
    }
}

/// Status of a question. `Open` is this kind's "active" value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionStatus {
    Open,
    Done,
    Archived,
}

impl QuestionStatus {
    pub fn is_active(self) -> bool {
        matches!(self, QuestionStatus::Open)
    }
}

impl Default for QuestionStatus {
    fn default() -> Self {
        QuestionStatus::Open
    }
}

/// Status of a decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionStatus {
    Active,
    Archived,
}

impl DecisionStatus {
    pub fn is_active(self) -> bool {
        matches!(self, DecisionStatus::Active)
    }
}

impl Default for DecisionStatus {
    fn default() -> Self {
        DecisionStatus::Active
    }
}

/// A goal: something the task is trying to accomplish.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Goal {
    pub common: Common,
    pub title: String,
    pub description: Option<String>,
    pub priority: Priority,
    pub status: GoalStatus,
}

/// A constraint: a hard bound the task must respect.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Constraint {
    pub common: Common,
    pub statement: String,
    pub priority: Priority,
    pub status: ConstraintStatus,
}

/// An assumption: something taken as given, usually inferred.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Assumption {
    pub common: Common,
    pub statement: String,
    pub confidence: Confidence,
}

/// A piece of evidence: an observation bearing on the task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Evidence {
    pub common: Common,
    pub summary: String,
    pub detail: Option<String>,
    pub severity: Severity,
    pub confidence: Confidence,
}

impl Evidence {
    /// `weight = severityScore(severity) * confidenceFactor(confidence)`.
    pub fn weight(&self) -> f64 {
        f64::from(self.severity.score()) * self.confidence.factor()
    }
}

/// An open question blocking progress.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Question {
    pub common: Common,
    pub question: String,
    pub priority: Priority,
    pub status: QuestionStatus,
}

/// A decision that has been made.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Decision {
    pub common: Common,
    pub statement: String,
    pub rationale: Option<String>,
    pub status: DecisionStatus,
}

/// A type-erased snapshot of any knowledge object, tagged by kind.
///
/// Used wherever code needs to cross kinds uniformly — event payloads,
/// scoring, tag matching, summarization — without giving up the
/// strongly-typed per-kind structs the store itself maintains.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Snapshot {
    Goal(Goal),
    Constraint(Constraint),
    Assumption(Assumption),
    Evidence(Evidence),
    Question(Question),
    Decision(Decision),
}

impl Snapshot {
    pub fn kind(&self) -> Kind {
        match self {
            Snapshot::Goal(_) => Kind::Goal,
            Snapshot::Constraint(_) => Kind::Constraint,
            Snapshot::Assumption(_) => Kind::Assumption,
            Snapshot::Evidence(_) => Kind::Evidence,
            Snapshot::Question(_) => Kind::Question,
            Snapshot::Decision(_) => Kind::Decision,
        }
    }

    pub fn common(&self) -> &Common {
        match self {
            Snapshot::Goal(o) => &o.common,
            Snapshot::Constraint(o) => &o.common,
            Snapshot::Assumption(o) => &o.common,
            Snapshot::Evidence(o) => &o.common,
            Snapshot::Question(o) => &o.common,
            Snapshot::Decision(o) => &o.common,
        }
    }

    /// Activeness rule from invariant 1: evidence and assumption are
    /// always active; everything else follows its own status field.
    pub fn is_active(&self) -> bool {
        match self {
            Snapshot::Goal(o) => o.status.is_active(),
            Snapshot::Constraint(o) => o.status.is_active(),
            Snapshot::Assumption(_) => true,
            Snapshot::Evidence(_) => true,
            Snapshot::Question(o) => o.status.is_active(),
            Snapshot::Decision(o) => o.status.is_active(),
        }
    }

    /// Priority value for scoring's `P` term, 0 if this kind has none.
    pub fn priority_value(&self) -> u8 {
        match self {
            Snapshot::Goal(o) => o.priority.value(),
            Snapshot::Constraint(o) => o.priority.value(),
            Snapshot::Question(o) => o.priority.value(),
            _ => 0,
        }
    }

    /// Severity value for scoring's `S` term, 0 if this kind has none.
    pub fn severity_value(&self) -> u8 {
        match self {
            Snapshot::Evidence(o) => o.severity.score(),
            _ => 0,
        }
    }

    /// Confidence value for scoring's `C` term, 0 if this kind has none.
    pub fn confidence_value(&self) -> u8 {
        match self {
            Snapshot::Assumption(o) => o.confidence.value(),
            Snapshot::Evidence(o) => o.confidence.value(),
            _ => 0,
        }
    }

    /// The primary human-readable field, per §4.2's `summarizeRef`.
    pub fn primary_text(&self) -> &str {
        match self {
            Snapshot::Goal(o) => &o.title,
            Snapshot::Constraint(o) => &o.statement,
            Snapshot::Assumption(o) => &o.statement,
            Snapshot::Evidence(o) => &o.summary,
            Snapshot::Question(o) => &o.question,
            Snapshot::Decision(o) => &o.statement,
        }
    }
}
