//! Scoring function (C3) — pure, deterministic, no hidden state beyond
//! the caller-supplied `now`. Kept free of any store/lane dependency so
//! it is independently unit-testable and so weight tuning is just a
//! configuration change, per the design notes.

use chrono::{DateTime, Utc};

use crate::model::Snapshot;

/// Default recency decay constant, in seconds. Exposed as a named
/// constant rather than hardcoded into `recency_value` so callers can
/// retune without forking the crate (the source left this unspecified;
/// this is the resolved default).
pub const DEFAULT_RECENCY_TAU_SECS: f64 = 3600.0;

/// The numeric weights and caps governing scoring and window size for a
/// lane or the active window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WindowPolicy {
    pub w_severity: f64,
    pub w_confidence: f64,
    pub w_priority: f64,
    pub w_recency: f64,
    pub w_pinned_boost: f64,
    pub max_items: usize,
}

impl WindowPolicy {
    /// Default lane policy per §6's factory description.
    pub fn default_lane() -> Self {
        Self {
            w_severity: 1.0,
            w_confidence: 0.7,
            w_priority: 0.8,
            w_recency: 0.3,
            w_pinned_boost: 1e6,
            max_items: 20,
        }
    }
}

/// Maps `updated_at` to a value in `[0, 1]`, monotonically decreasing
/// with age. Clamped to absorb clock skew where `updated_at` is
/// slightly ahead of `now` (Δ would otherwise go negative).
pub fn recency_value(updated_at: DateTime<Utc>, now: DateTime<Utc>, tau_secs: f64) -> f64 {
    let delta_secs = (now - updated_at).num_milliseconds() as f64 / 1000.0;
    let delta_secs = delta_secs.max(0.0);
    (-delta_secs / tau_secs).exp().clamp(0.0, 1.0)
}

/// `score(policy, ref, pinned)` from §4.3.
///
/// Returns `f64::NEG_INFINITY` for an inactive, unpinned object so it
/// never survives a selection's sort/truncate.
pub fn score(policy: &WindowPolicy, snapshot: &Snapshot, pinned: bool, now: DateTime<Utc>) -> f64 {
    score_with_tau(policy, snapshot, pinned, now, DEFAULT_RECENCY_TAU_SECS)
}

/// Same as [`score`] with an explicit recency decay constant, mainly
/// for tests that want to exercise the shape of the curve directly.
pub fn score_with_tau(
    policy: &WindowPolicy,
    snapshot: &Snapshot,
    pinned: bool,
    now: DateTime<Utc>,
    tau_secs: f64,
) -> f64 {
    if pinned {
        return policy.w_pinned_boost;
    }
    if !snapshot.is_active() {
        return f64::NEG_INFINITY;
    }
    let p = f64::from(snapshot.priority_value());
    let s = f64::from(snapshot.severity_value());
    let c = f64::from(snapshot.confidence_value());
    let r = recency_value(snapshot.common().updated_at, now, tau_secs);
    p * policy.w_priority + s * policy.w_severity + c * policy.w_confidence + r * policy.w_recency
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Common, Goal, GoalStatus, Priority, Provenance, ProvenanceSource};

    fn goal(now: DateTime<Utc>, updated_at: DateTime<Utc>, priority: Priority, status: GoalStatus) -> Snapshot {
        let mut common = Common::new("g-1", now, Provenance::new(ProvenanceSource::User, now));
        common.updated_at = updated_at;
        Snapshot::Goal(Goal {
            common,
            title: "t".into(),
            description: None,
            priority,
            status,
        })
    }

    #[test]
    fn test_pinned_always_beats_unpinned_with_default_policy() {
        let policy = WindowPolicy::default_lane();
        let now = Utc::now();
        let unpinned = score(&policy, &goal(now, now, Priority::P0, GoalStatus::Active), false, now);
        let pinned = score(&policy, &goal(now, now, Priority::P0, GoalStatus::Active), true, now);
        assert!(pinned > unpinned);
        assert_eq!(pinned, policy.w_pinned_boost);
    }

    #[test]
    fn test_inactive_unpinned_is_neg_infinity() {
        let policy = WindowPolicy::default_lane();
        let now = Utc::now();
        let s = score(&policy, &goal(now, now, Priority::P0, GoalStatus::Archived), false, now);
        assert_eq!(s, f64::NEG_INFINITY);
    }

    #[test]
    fn test_tombstone_pin_does_not_get_boost() {
        let policy = WindowPolicy::default_lane();
        let now = Utc::now();
        let active = score(&policy, &goal(now, now, Priority::P2, GoalStatus::Active), false, now);
        assert!(active.is_finite());
    }

    #[test]
    fn test_monotone_in_priority() {
        let policy = WindowPolicy::default_lane();
        let now = Utc::now();
        let low = score(&policy, &goal(now, now, Priority::P3, GoalStatus::Active), false, now);
        let high = score(&policy, &goal(now, now, Priority::P0, GoalStatus::Active), false, now);
        assert!(high > low);
    }

    #[test]
    fn test_recency_value_decreasing_with_age() {
        let now = Utc::now();
        let fresh = recency_value(now, now, DEFAULT_RECENCY_TAU_SECS);
        let hour_old = recency_value(now - chrono::Duration::hours(1), now, DEFAULT_RECENCY_TAU_SECS);
        let day_old = recency_value(now - chrono::Duration::days(1), now, DEFAULT_RECENCY_TAU_SECS);
        assert!(fresh > hour_old);
        assert!(hour_old > day_old);
        assert!((fresh - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_recency_value_clock_skew_clamped() {
        let now = Utc::now();
        let future = now + chrono::Duration::seconds(30);
        let r = recency_value(future, now, DEFAULT_RECENCY_TAU_SECS);
        assert!((r - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_score_is_pure() {
        let policy = WindowPolicy::default_lane();
        let now = Utc::now();
        let snap = goal(now, now, Priority::P1, GoalStatus::Active);
        let a = score(&policy, &snap, false, now);
        let b = score(&policy, &snap, false, now);
        assert_eq!(a, b);
    }
}
