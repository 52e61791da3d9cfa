//! Active meta-context engine.
//!
//! Curates the finite working set of information a large language model
//! is allowed to see for a single task: callers register typed
//! knowledge objects (goals, constraints, assumptions, evidence, open
//! questions, decisions), organize them into named lanes, and on demand
//! synthesize a bounded-size working-memory text under a token budget.
//!
//! The engine owns its state in-process and performs no I/O; callers
//! who need persistence serialize the types themselves (every public
//! value type derives `Serialize`/`Deserialize`). It does not initialize
//! a `tracing` subscriber — wire one up at the binary/application edge.

#![allow(dead_code)]

pub mod archive;
pub mod context;
pub mod error;
pub mod hooks;
pub mod lane;
pub mod model;
pub mod scoring;
pub mod store;
pub mod synth;
pub mod tags;
pub mod window;

pub use archive::{Archive, ArchiveRecord};
pub use context::{
    create_context, create_default_context, Context, IngestEvidenceOpts, LlmContextPayload,
    SynthesizeOpts, WindowPolicyPatch, WorkingMemoryView,
};
pub use error::{ContextError, Result};
pub use hooks::{EngineEvent, HookBus, ListenerId};
pub use lane::{Lane, LaneStatus, PinEntry, SelectedItem};
pub use model::{
    Assumption, Common, Confidence, Constraint, ConstraintStatus, Decision, DecisionStatus,
    Evidence, Goal, GoalStatus, Kind, Priority, Provenance, ProvenanceSource, Question,
    QuestionStatus, Ref, Severity, Snapshot, Tag,
};
pub use scoring::{recency_value, score, WindowPolicy, DEFAULT_RECENCY_TAU_SECS};
pub use store::{
    AssumptionPayload, ConstraintPayload, DecisionPayload, EvidencePayload, GoalPayload,
    KnowledgeStore, QuestionPayload, UpsertOutcome,
};
pub use synth::{CharQuartileEstimator, SynthesizeOptions, SynthesisResult, TokenEstimator, WorkingMemory};
pub use tags::tags_match_any;
pub use window::ActiveWindow;
