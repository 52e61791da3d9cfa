//! Crate-wide error taxonomy.
//!
//! Every public operation that can fail returns one of these variants.
//! `ListenerFault` is never constructed as a returned error — see
//! [`crate::hooks`] — it exists so the taxonomy documents the full set of
//! failure classes named in the design (SPEC_FULL §7).

use crate::model::Kind;

/// Errors surfaced by the active meta-context engine.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ContextError {
    /// A knowledge-object payload was missing a required field or used an
    /// enum value outside the allowed set.
    #[error("invalid payload for {kind}: {detail}")]
    InvalidPayload {
        /// Kind the payload was for.
        kind: Kind,
        /// What was wrong with it.
        detail: String,
    },

    /// An operation referenced a lane id that was never created with
    /// `ensure_lane`.
    #[error("unknown lane: {lane_id}")]
    UnknownLane {
        /// The lane id that was not found.
        lane_id: String,
    },

    /// An operation referenced a `(kind, id)` that does not resolve to an
    /// existing knowledge object.
    #[error("unknown ref: {kind} {id}")]
    UnknownRef {
        /// Kind of the missing ref.
        kind: Kind,
        /// Id of the missing ref.
        id: String,
    },

    /// A listener attached to the hook bus panicked. Never returned to a
    /// public-operation caller; retained for documentation completeness.
    #[error("listener fault: {detail}")]
    ListenerFault {
        /// Diagnostic detail captured from the panic payload.
        detail: String,
    },
}

/// Convenience result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, ContextError>;

impl ContextError {
    /// Build an `InvalidPayload` error.
    pub fn invalid_payload(kind: Kind, detail: impl Into<String>) -> Self {
        Self::InvalidPayload {
            kind,
            detail: detail.into(),
        }
    }

    /// Build an `UnknownLane` error.
    pub fn unknown_lane(lane_id: impl Into<String>) -> Self {
        Self::UnknownLane {
            lane_id: lane_id.into(),
        }
    }

    /// Build an `UnknownRef` error.
    pub fn unknown_ref(kind: Kind, id: impl Into<String>) -> Self {
        Self::UnknownRef {
            kind,
            id: id.into(),
        }
    }
}
