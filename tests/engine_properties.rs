//! Cross-component property tests for the active meta-context engine.
//!
//! Covers the invariants and round-trip properties: upsert idempotence,
//! selection size caps, dedup, pin ordering, token-budget compliance,
//! synthesis event order, lane remove/re-add, lane disable, and
//! listener one-shot semantics.

use active_context::{
    create_context, create_default_context, ContextError, GoalPayload, IngestEvidenceOpts, Kind,
    LaneStatus, QuestionPayload, Ref, Snapshot, SynthesizeOpts, Tag,
};

fn with_tag(tag_value: &str) -> Vec<Tag> {
    vec![Tag::with_value("lane", tag_value)]
}

// P1 — upsert idempotence on createdAt/updatedAt.
#[test]
fn prop_p1_upsert_same_id_preserves_created_at_and_advances_updated_at() {
    let mut ctx = create_context("ctx", None);
    let first = ctx
        .upsert_goal(
            "g-1",
            GoalPayload {
                title: Some("v1".into()),
                ..Default::default()
            },
        )
        .unwrap();
    std::thread::sleep(std::time::Duration::from_millis(2));
    let second = ctx
        .upsert_goal(
            "g-1",
            GoalPayload {
                title: Some("v2".into()),
                ..Default::default()
            },
        )
        .unwrap();

    assert_eq!(first.common().created_at, second.common().created_at);
    assert!(second.common().updated_at > first.common().updated_at);
    assert_eq!(ctx.get_all_ids_by_kind(Kind::Goal).len(), 1);
}

// P2 — lane and active window selections respect maxItems.
#[test]
fn prop_p2_selections_respect_max_items() {
    let mut ctx = create_default_context("ctx");
    for i in 0..50 {
        ctx.upsert_goal(
            &format!("g-{i}"),
            GoalPayload {
                title: Some(format!("goal {i}")),
                tags: Some(with_tag("task")),
                ..Default::default()
            },
        )
        .unwrap();
    }
    ctx.synthesize_from_lanes(SynthesizeOpts {
        token_budget: 10_000,
        archive_raw_items: false,
    });

    let task_lane = ctx.lane_list().iter().find(|l| l.id == "task").unwrap();
    assert!(task_lane.selected.len() <= task_lane.policy.max_items);
    assert!(ctx.active_selected().len() <= 35);
}

// P3 — active window never contains duplicate (kind, id) entries.
#[test]
fn prop_p3_active_window_has_no_duplicate_refs() {
    let mut ctx = create_default_context("ctx");
    ctx.upsert_goal(
        "g-shared",
        GoalPayload {
            title: Some("shared".into()),
            tags: Some(vec![Tag::with_value("lane", "task"), Tag::with_value("lane", "legal")]),
            ..Default::default()
        },
    )
    .unwrap();
    ctx.set_lane_include_tags_any("legal", vec![Tag::with_value("lane", "task")]).unwrap();

    ctx.refresh_all_lanes();
    ctx.merge_lanes_to_active_window();

    let mut seen = std::collections::HashSet::new();
    for item in ctx.active_selected() {
        assert!(seen.insert((item.r.kind, item.r.id.clone())), "duplicate ref in active window");
    }
}

// P4 — every ref in a selection resolves to an active object.
#[test]
fn prop_p4_selected_refs_are_active() {
    let mut ctx = create_default_context("ctx");
    ctx.upsert_goal(
        "g-1",
        GoalPayload {
            title: Some("x".into()),
            tags: Some(with_tag("task")),
            ..Default::default()
        },
    )
    .unwrap();
    ctx.upsert_goal(
        "g-2",
        GoalPayload {
            title: Some("y".into()),
            status: Some(active_context::GoalStatus::Archived),
            tags: Some(with_tag("task")),
            ..Default::default()
        },
    )
    .unwrap();
    ctx.refresh_all_lanes();
    for item in ctx.lane_list().iter().find(|l| l.id == "task").unwrap().selected.iter() {
        assert!(ctx.is_active(&item.r));
    }
}

// P5 — pinning does not reorder unpinned entries relative to each other.
#[test]
fn prop_p5_pinning_preserves_relative_order_of_unpinned() {
    let mut ctx = create_default_context("ctx");
    ctx.upsert_goal(
        "g-1",
        GoalPayload {
            title: Some("a".into()),
            priority: Some(active_context::Priority::P1),
            tags: Some(with_tag("task")),
            ..Default::default()
        },
    )
    .unwrap();
    ctx.upsert_goal(
        "g-2",
        GoalPayload {
            title: Some("b".into()),
            priority: Some(active_context::Priority::P2),
            tags: Some(with_tag("task")),
            ..Default::default()
        },
    )
    .unwrap();
    ctx.upsert_goal(
        "g-3",
        GoalPayload {
            title: Some("c".into()),
            priority: Some(active_context::Priority::P3),
            tags: Some(with_tag("task")),
            ..Default::default()
        },
    )
    .unwrap();
    ctx.refresh_lane_selection("task").unwrap();
    let before: Vec<String> = ctx
        .lane_list()
        .iter()
        .find(|l| l.id == "task")
        .unwrap()
        .selected
        .iter()
        .map(|i| i.r.id.clone())
        .collect();
    assert_eq!(before, vec!["g-1", "g-2", "g-3"]);

    ctx.pin_in_lane("task", Ref::new(Kind::Goal, "g-3")).unwrap();
    ctx.refresh_lane_selection("task").unwrap();
    let after: Vec<String> = ctx
        .lane_list()
        .iter()
        .find(|l| l.id == "task")
        .unwrap()
        .selected
        .iter()
        .map(|i| i.r.id.clone())
        .collect();
    assert_eq!(after, vec!["g-3", "g-1", "g-2"], "g-3 moves to front, g-1/g-2 stay in relative order");
}

// P6 — synthesis text stays within tokenBudget + 1.
#[test]
fn prop_p6_synthesis_respects_token_budget() {
    let mut ctx = create_default_context("ctx");
    for i in 0..30 {
        ctx.upsert_goal(
            &format!("g-{i}"),
            GoalPayload {
                title: Some("a moderately long goal title for budget pressure".into()),
                tags: Some(with_tag("task")),
                ..Default::default()
            },
        )
        .unwrap();
    }
    let text = ctx.synthesize_from_lanes(SynthesizeOpts {
        token_budget: 50,
        archive_raw_items: false,
    });
    let approx_tokens = ((text.len() as f64) / 4.0).ceil() as u64;
    assert!(approx_tokens <= 51);
}

// P7 — synthesizeFromLanes emits events in the documented order.
#[test]
fn prop_p7_synthesize_from_lanes_event_order() {
    let mut ctx = create_default_context("ctx");
    ctx.upsert_goal(
        "g-1",
        GoalPayload {
            title: Some("x".into()),
            tags: Some(with_tag("task")),
            ..Default::default()
        },
    )
    .unwrap();

    let order = std::rc::Rc::new(std::cell::RefCell::new(Vec::new()));
    let o = order.clone();
    ctx.on_any(move |e| o.borrow_mut().push(e.event_type().to_string()));

    ctx.synthesize_from_lanes(SynthesizeOpts {
        token_budget: 1000,
        archive_raw_items: false,
    });

    let relevant: Vec<String> = order
        .borrow()
        .iter()
        .filter(|t| {
            matches!(
                t.as_str(),
                "lanes:refreshedAll" | "activeWindow:merged" | "archive:created" | "workingMemory:synthesized"
            )
        })
        .cloned()
        .collect();
    assert_eq!(
        relevant,
        vec![
            "lanes:refreshedAll".to_string(),
            "activeWindow:merged".to_string(),
            "archive:created".to_string(),
            "workingMemory:synthesized".to_string(),
        ]
    );
}

// P8 — removing and re-adding a lane clears its selection and pins.
#[test]
fn prop_p8_remove_then_readd_lane_has_empty_selection_and_no_old_pins() {
    let mut ctx = create_default_context("ctx");
    ctx.upsert_goal(
        "g-1",
        GoalPayload {
            title: Some("x".into()),
            ..Default::default()
        },
    )
    .unwrap();
    ctx.pin_in_lane("task", Ref::new(Kind::Goal, "g-1")).unwrap();
    ctx.refresh_lane_selection("task").unwrap();
    assert!(!ctx.lane_list().iter().find(|l| l.id == "task").unwrap().selected.is_empty());

    ctx.remove_lane("task").unwrap();
    ctx.ensure_lane("task", None);
    let lane = ctx.lane_list().iter().find(|l| l.id == "task").unwrap();
    assert!(lane.selected.is_empty());
    assert!(lane.pinned.is_empty());
}

// P9 — disabling a lane empties both merge contribution and its own selection.
#[test]
fn prop_p9_disabling_lane_empties_selection_and_merge_contribution() {
    let mut ctx = create_default_context("ctx");
    ctx.upsert_goal(
        "g-1",
        GoalPayload {
            title: Some("x".into()),
            tags: Some(with_tag("task")),
            ..Default::default()
        },
    )
    .unwrap();
    ctx.refresh_all_lanes();
    ctx.merge_lanes_to_active_window();
    assert!(!ctx.active_selected().is_empty());

    ctx.set_lane_status("task", LaneStatus::Disabled).unwrap();
    ctx.refresh_all_lanes();
    ctx.merge_lanes_to_active_window();
    assert!(ctx.lane_list().iter().find(|l| l.id == "task").unwrap().selected.is_empty());
    assert!(ctx.active_selected().is_empty());
}

// R1 — refreshAllLanes is idempotent under a frozen clock.
#[test]
fn round_trip_r1_refresh_all_lanes_idempotent() {
    let mut ctx = create_default_context("ctx");
    ctx.upsert_goal(
        "g-1",
        GoalPayload {
            title: Some("x".into()),
            tags: Some(with_tag("task")),
            ..Default::default()
        },
    )
    .unwrap();
    ctx.refresh_all_lanes();
    let first: Vec<String> = ctx
        .lane_list()
        .iter()
        .find(|l| l.id == "task")
        .unwrap()
        .selected
        .iter()
        .map(|i| i.r.id.clone())
        .collect();
    ctx.refresh_all_lanes();
    let second: Vec<String> = ctx
        .lane_list()
        .iter()
        .find(|l| l.id == "task")
        .unwrap()
        .selected
        .iter()
        .map(|i| i.r.id.clone())
        .collect();
    assert_eq!(first, second);
}

// R2 — mergeLanesToActiveWindow is idempotent.
#[test]
fn round_trip_r2_merge_idempotent() {
    let mut ctx = create_default_context("ctx");
    ctx.upsert_goal(
        "g-1",
        GoalPayload {
            title: Some("x".into()),
            tags: Some(with_tag("task")),
            ..Default::default()
        },
    )
    .unwrap();
    ctx.refresh_all_lanes();
    ctx.merge_lanes_to_active_window();
    let first: Vec<String> = ctx.active_selected().iter().map(|i| i.r.id.clone()).collect();
    ctx.merge_lanes_to_active_window();
    let second: Vec<String> = ctx.active_selected().iter().map(|i| i.r.id.clone()).collect();
    assert_eq!(first, second);
}

// R3 — a `once` listener fires exactly once and listenerCount decreases.
#[test]
fn round_trip_r3_once_listener_fires_exactly_once() {
    let mut ctx = create_context("ctx", None);
    let hits = std::rc::Rc::new(std::cell::RefCell::new(0));
    let h = hits.clone();
    ctx.once("lane:created", move |_| *h.borrow_mut() += 1);
    assert_eq!(ctx.listener_count(), 1);
    ctx.ensure_lane("a", None);
    ctx.ensure_lane("b", None);
    assert_eq!(*hits.borrow(), 1);
    assert_eq!(ctx.listener_count(), 0);
}

#[tokio::test]
async fn prop_ingest_evidence_refreshes_before_synthesis_and_emits_ingested() {
    let mut ctx = create_default_context("ctx");
    let snapshot = ctx
        .ingest_evidence(
            "e-1",
            active_context::EvidencePayload {
                summary: Some("observed".into()),
                tags: Some(with_tag("task")),
                ..Default::default()
            },
            IngestEvidenceOpts {
                synthesize: true,
                token_budget: 500,
            },
        )
        .await
        .unwrap();

    assert!(matches!(snapshot, Snapshot::Evidence(_)));
    assert!(ctx.working_memory().text.contains("observed"));
}

#[test]
fn test_question_status_done_excludes_from_lane_selection() {
    let mut ctx = create_default_context("ctx");
    ctx.upsert_question(
        "q-1",
        QuestionPayload {
            question: Some("still open?".into()),
            status: Some(active_context::QuestionStatus::Done),
            tags: Some(with_tag("task")),
            ..Default::default()
        },
    )
    .unwrap();
    ctx.refresh_lane_selection("task").unwrap();
    assert!(ctx.lane_list().iter().find(|l| l.id == "task").unwrap().selected.is_empty());
}

#[test]
fn test_unknown_lane_error_on_refresh() {
    let mut ctx = create_context("ctx", None);
    let err = ctx.refresh_lane_selection("nope").unwrap_err();
    assert!(matches!(err, ContextError::UnknownLane { .. }));
}
