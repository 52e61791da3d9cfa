//! Working-memory synthesizer (C6) — budgeted textual rendering of the
//! active selection, grouped by kind, with an append to the archive.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::archive::Archive;
use crate::model::{Kind, Ref};
use crate::store::KnowledgeStore;
use crate::window::ActiveWindow;

/// Pluggable token counter. The 4-char approximation is a placeholder;
/// production callers substitute a real tokenizer without changing any
/// other synthesis semantics.
pub trait TokenEstimator {
    fn estimate(&self, text: &str) -> u64;

    fn name(&self) -> &str;
}

/// Default estimator: `ceil(len(s) / 4)`.
#[derive(Debug, Clone, Default)]
pub struct CharQuartileEstimator;

impl TokenEstimator for CharQuartileEstimator {
    fn estimate(&self, text: &str) -> u64 {
        ((text.len() as f64) / 4.0).ceil() as u64
    }

    fn name(&self) -> &str {
        "char_quartile"
    }
}

/// The budgeted textual rendering of the active window, intended as
/// LLM context. Replaced wholesale by each synthesis.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct WorkingMemory {
    pub text: String,
    pub updated_at: Option<DateTime<Utc>>,
    pub last_archive_id: Option<String>,
}

/// Options for `synthesize_working_memory`.
#[derive(Debug, Clone, Copy)]
pub struct SynthesizeOptions {
    pub token_budget: u64,
    pub archive_raw_items: bool,
}

/// Outcome of one synthesis, used by the façade to decide which events
/// to emit and in what order.
pub struct SynthesisResult {
    pub archive_id: String,
    pub text: String,
    pub archived_refs: Vec<Ref>,
}

/// The seven-step `synthesizeWorkingMemory` algorithm from §4.6.
///
/// `new_id` supplies the archive id (minted by the caller so this
/// function stays free of any id-generation policy).
pub fn synthesize_working_memory(
    store: &mut KnowledgeStore,
    window: &ActiveWindow,
    archive: &mut Archive,
    working_memory: &mut WorkingMemory,
    estimator: &dyn TokenEstimator,
    opts: SynthesizeOptions,
    now: DateTime<Utc>,
    new_id: String,
) -> SynthesisResult {
    debug!(
        archive_id = %new_id,
        candidates = window.selected.len(),
        token_budget = opts.token_budget,
        "Starting working memory synthesis"
    );

    let text = render_text(store, window, estimator, opts.token_budget);

    working_memory.text = text.clone();
    working_memory.updated_at = Some(now);
    working_memory.last_archive_id = Some(new_id.clone());

    let merged_selected: Vec<Ref> = window.selected.iter().map(|i| i.r.clone()).collect();
    archive.append(new_id.clone(), now, merged_selected, text.clone());

    let mut archived_refs = Vec::new();
    if opts.archive_raw_items {
        for item in &window.selected {
            if store.archive_if_has_status(&item.r, now) {
                archived_refs.push(item.r.clone());
            }
        }
    }

    info!(
        archive_id = %new_id,
        rendered_chars = text.len(),
        archived_refs = archived_refs.len(),
        "Working memory synthesis complete"
    );

    SynthesisResult {
        archive_id: new_id,
        text,
        archived_refs,
    }
}

/// Steps 1-4: build the canonical sections and truncate to budget,
/// never emitting a partial item.
fn render_text(store: &KnowledgeStore, window: &ActiveWindow, estimator: &dyn TokenEstimator, token_budget: u64) -> String {
    let mut sections: Vec<(Kind, Vec<String>)> = Kind::ALL.iter().map(|&k| (k, Vec::new())).collect();

    for item in &window.selected {
        let line = format!("- {}\n", store.summarize_ref(&item.r));
        let idx = Kind::ALL.iter().position(|&k| k == item.r.kind).expect("Kind::ALL is exhaustive");
        sections[idx].1.push(line);
    }

    let mut text = String::new();
    let mut running_tokens: u64 = 0;

    for (kind, lines) in sections {
        if lines.is_empty() {
            continue;
        }

        let header = format!("{}:\n", kind.section_label());
        let header_tokens = estimator.estimate(&header);
        if running_tokens + header_tokens > token_budget {
            break;
        }

        let mut section_body = String::new();
        let mut section_tokens = 0u64;
        let mut any_item_added = false;
        let total_lines = lines.len();
        let mut lines_added = 0usize;
        for line in lines {
            let line_tokens = estimator.estimate(&line);
            if running_tokens + header_tokens + section_tokens + line_tokens > token_budget {
                break;
            }
            section_body.push_str(&line);
            section_tokens += line_tokens;
            any_item_added = true;
            lines_added += 1;
        }

        if !any_item_added {
            break;
        }

        text.push_str(&header);
        text.push_str(&section_body);
        text.push('\n');
        running_tokens += header_tokens + section_tokens;

        // A partially filled section means the budget ran out mid-section;
        // every lower-priority kind after it must be dropped entirely
        // rather than independently best-effort packed into leftover slack.
        if lines_added < total_lines {
            break;
        }
    }

    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lane::SelectedItem;
    use crate::model::{Kind, Ref};
    use crate::store::{EvidencePayload, GoalPayload};

    fn setup() -> (KnowledgeStore, ActiveWindow, Archive, WorkingMemory) {
        (KnowledgeStore::new(), ActiveWindow::new(35), Archive::new(), WorkingMemory::default())
    }

    #[test]
    fn test_render_respects_canonical_section_order() {
        let (mut store, mut window, mut archive, mut wm) = setup();
        let now = Utc::now();
        store
            .upsert_evidence(
                "e-1",
                EvidencePayload {
                    summary: Some("observed something".into()),
                    ..Default::default()
                },
                now,
            )
            .unwrap();
        store
            .upsert_goal(
                "g-1",
                GoalPayload {
                    title: Some("ship it".into()),
                    ..Default::default()
                },
                now,
            )
            .unwrap();
        window.selected = vec![
            SelectedItem {
                r: Ref::new(Kind::Evidence, "e-1"),
                score: 1.0,
                pinned: false,
            },
            SelectedItem {
                r: Ref::new(Kind::Goal, "g-1"),
                score: 1.0,
                pinned: false,
            },
        ];

        let result = synthesize_working_memory(
            &mut store,
            &window,
            &mut archive,
            &mut wm,
            &CharQuartileEstimator,
            SynthesizeOptions {
                token_budget: 1000,
                archive_raw_items: false,
            },
            now,
            "arc-1".into(),
        );

        let goals_pos = result.text.find("Goals:").unwrap();
        let evidence_pos = result.text.find("Evidence:").unwrap();
        assert!(goals_pos < evidence_pos);
        assert_eq!(archive.len(), 1);
        assert_eq!(wm.last_archive_id.as_deref(), Some("arc-1"));
    }

    #[test]
    fn test_truncation_never_emits_partial_item() {
        let (mut store, mut window, mut archive, mut wm) = setup();
        let now = Utc::now();
        let mut selected = Vec::new();
        for i in 0..20 {
            let id = format!("g-{i}");
            store
                .upsert_goal(
                    &id,
                    GoalPayload {
                        title: Some("a fairly long goal title to burn through budget".into()),
                        ..Default::default()
                    },
                    now,
                )
                .unwrap();
            selected.push(SelectedItem {
                r: Ref::new(Kind::Goal, id),
                score: (20 - i) as f64,
                pinned: false,
            });
        }
        window.selected = selected;

        let result = synthesize_working_memory(
            &mut store,
            &window,
            &mut archive,
            &mut wm,
            &CharQuartileEstimator,
            SynthesizeOptions {
                token_budget: 100,
                archive_raw_items: false,
            },
            now,
            "arc-1".into(),
        );

        let estimator = CharQuartileEstimator;
        assert!(estimator.estimate(&result.text) <= 101);
        let rendered_goals = result.text.matches("- ").count();
        assert!(rendered_goals < 20);
    }

    #[test]
    fn test_partial_section_halts_lower_priority_kinds() {
        let (mut store, mut window, mut archive, mut wm) = setup();
        let now = Utc::now();
        // Two goals, long enough that only the first fits, plus a cheap
        // constraint that would otherwise fit in the leftover slack.
        store
            .upsert_goal(
                "g-1",
                GoalPayload {
                    title: Some("a reasonably long goal title to burn through most of the budget".into()),
                    ..Default::default()
                },
                now,
            )
            .unwrap();
        store
            .upsert_goal(
                "g-2",
                GoalPayload {
                    title: Some("a second reasonably long goal title that should not fit".into()),
                    ..Default::default()
                },
                now,
            )
            .unwrap();
        store
            .upsert_constraint(
                "c-1",
                crate::store::ConstraintPayload {
                    statement: Some("x".into()),
                    ..Default::default()
                },
                now,
            )
            .unwrap();
        window.selected = vec![
            SelectedItem { r: Ref::new(Kind::Goal, "g-1"), score: 2.0, pinned: false },
            SelectedItem { r: Ref::new(Kind::Goal, "g-2"), score: 1.0, pinned: false },
            SelectedItem { r: Ref::new(Kind::Constraint, "c-1"), score: 0.5, pinned: false },
        ];

        let estimator = CharQuartileEstimator;
        let header_tokens = estimator.estimate("Goals:\n");
        let g1_line = format!("- {}\n", store.summarize_ref(&Ref::new(Kind::Goal, "g-1")));
        let g1_tokens = estimator.estimate(&g1_line);
        // Enough room for the header and the first goal, not the second.
        let budget = header_tokens + g1_tokens + 1;

        let result = synthesize_working_memory(
            &mut store,
            &window,
            &mut archive,
            &mut wm,
            &estimator,
            SynthesizeOptions {
                token_budget: budget,
                archive_raw_items: false,
            },
            now,
            "arc-1".into(),
        );

        assert!(result.text.contains("g-1"), "first goal should have rendered:\n{}", result.text);
        assert!(!result.text.contains("g-2"), "second goal should have been truncated:\n{}", result.text);
        assert!(
            !result.text.contains("Constraints:"),
            "a lower-priority kind must not render after a higher kind was truncated mid-section:\n{}",
            result.text
        );
    }

    #[test]
    fn test_archive_raw_items_skips_evidence() {
        let (mut store, mut window, mut archive, mut wm) = setup();
        let now = Utc::now();
        store
            .upsert_goal(
                "g-1",
                GoalPayload {
                    title: Some("x".into()),
                    ..Default::default()
                },
                now,
            )
            .unwrap();
        store
            .upsert_evidence(
                "e-1",
                EvidencePayload {
                    summary: Some("o".into()),
                    ..Default::default()
                },
                now,
            )
            .unwrap();
        window.selected = vec![
            SelectedItem {
                r: Ref::new(Kind::Goal, "g-1"),
                score: 1.0,
                pinned: false,
            },
            SelectedItem {
                r: Ref::new(Kind::Evidence, "e-1"),
                score: 1.0,
                pinned: false,
            },
        ];

        let result = synthesize_working_memory(
            &mut store,
            &window,
            &mut archive,
            &mut wm,
            &CharQuartileEstimator,
            SynthesizeOptions {
                token_budget: 600,
                archive_raw_items: true,
            },
            now,
            "arc-1".into(),
        );

        assert_eq!(result.archived_refs.len(), 1);
        assert!(!store.is_active(&Ref::new(Kind::Goal, "g-1")));
        assert!(store.is_active(&Ref::new(Kind::Evidence, "e-1")));
    }
}
