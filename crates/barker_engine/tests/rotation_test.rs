//! Rotation fairness and gap auditing through the engine.

mod support;

use barker_core::{Channel, ContentId, QueueEntry};
use barker_engine::{EngineEvent, EventBus, PatternConfig, RotationConfig, detect_pattern, score};
use barker_interface::ManualClock;
use barker_storage::MemoryStore;
use chrono::Duration;
use std::collections::BTreeMap;
use std::sync::Arc;
use support::{ScriptedAdapter, at, build_engine, build_engine_with_events, config, items};

fn entry(id: &str, priority: i64, promotion_count: u32, is_new_arrival: bool) -> QueueEntry {
    QueueEntry {
        product_id: ContentId::new(id),
        priority,
        promotion_count,
        last_promoted_at: None,
        is_new_arrival,
    }
}

#[test]
fn test_scenario_d_new_arrival_outranks_promoted_entry() {
    let config = RotationConfig::default();
    let now = at(12, 0);
    let fresh = entry("fresh", 100, 0, true);
    let worn = entry("worn", 100, 3, false);
    assert!(score(&fresh, now, &config) > score(&worn, now, &config));
}

#[tokio::test]
async fn test_scenario_d_selection_prefers_new_arrival() {
    let clock = ManualClock::new(at(9, 0));
    let engine = build_engine(
        config(5, 0, ""),
        Arc::new(ScriptedAdapter::new(Channel::Reddit)),
        Vec::new(),
        Arc::new(clock),
        Arc::new(MemoryStore::new()),
    )
    .await;
    let rotation = engine.rotation();

    rotation
        .seed(
            Channel::Reddit,
            vec![entry("worn", 100, 3, false), entry("fresh", 100, 0, true)],
        )
        .await
        .unwrap();

    let next = rotation.select_next(Channel::Reddit).unwrap();
    assert_eq!(next.product_id, ContentId::new("fresh"));
}

#[tokio::test]
async fn test_rotation_cycles_before_repeating() {
    let clock = ManualClock::new(at(9, 0));
    let engine = build_engine(
        config(5, 0, ""),
        Arc::new(ScriptedAdapter::new(Channel::Reddit)),
        Vec::new(),
        Arc::new(clock.clone()),
        Arc::new(MemoryStore::new()),
    )
    .await;
    let rotation = engine.rotation();
    let ids = ["a", "b", "c", "d"];
    rotation
        .seed(
            Channel::Reddit,
            ids.iter().map(|id| entry(id, 100, 0, true)).collect(),
        )
        .await
        .unwrap();

    let mut picks = Vec::new();
    for _ in 0..12 {
        let next = rotation.select_next(Channel::Reddit).unwrap();
        rotation
            .mark_promoted(Channel::Reddit, &next.product_id)
            .await
            .unwrap();
        picks.push(next.product_id.as_str().to_string());
        clock.advance(Duration::hours(6));
    }

    for round in picks.chunks(ids.len()) {
        let mut round = round.to_vec();
        round.sort();
        assert_eq!(round, ids);
    }

    let mut counts = BTreeMap::new();
    for entry in rotation.entries(Channel::Reddit) {
        counts.insert(entry.product_id.as_str().to_string(), entry.promotion_count);
        assert!(!entry.is_new_arrival);
        assert!(entry.priority >= *rotation.config().min_priority());
    }
    assert!(counts.values().all(|c| *c == 3));
}

#[tokio::test]
async fn test_mark_promoted_unknown_entry_errors() {
    let engine = build_engine(
        config(5, 0, ""),
        Arc::new(ScriptedAdapter::new(Channel::Reddit)),
        Vec::new(),
        Arc::new(ManualClock::new(at(9, 0))),
        Arc::new(MemoryStore::new()),
    )
    .await;
    assert!(
        engine
            .rotation()
            .mark_promoted(Channel::Reddit, &ContentId::new("ghost"))
            .await
            .is_err()
    );
}

#[tokio::test]
async fn test_dispatch_queues_new_content_as_arrivals() {
    let engine = build_engine(
        config(5, 0, ""),
        Arc::new(ScriptedAdapter::new(Channel::Reddit)),
        items(Channel::Reddit, 3),
        Arc::new(ManualClock::new(at(9, 0))),
        Arc::new(MemoryStore::new()),
    )
    .await;

    assert!(engine.dispatch_once(Channel::Reddit).await.unwrap().is_published());
    let entries = engine.rotation().entries(Channel::Reddit);
    assert_eq!(entries.len(), 3);
    assert_eq!(entries.iter().filter(|e| e.is_new_arrival).count(), 2);
    assert_eq!(entries.iter().filter(|e| e.promotion_count == 1).count(), 1);
}

#[test]
fn test_scenario_c_fixed_interval_is_suspicious() {
    let start = at(0, 0);
    let jitter = [0, 12, -30, 25, -8, 30, -19, 4, -27];
    let mut times = vec![start];
    let mut t = start;
    for offset in jitter {
        t += Duration::hours(4) + Duration::seconds(offset);
        times.push(t);
    }
    assert_eq!(times.len(), 10);

    let report = detect_pattern(&times, &PatternConfig::default());
    assert!(report.suspicious);
    assert_eq!(report.sample_size, 9);
    assert!((report.mean_gap_hours - 4.0).abs() < 0.01);
}

#[test]
fn test_irregular_gaps_are_not_suspicious() {
    let start = at(0, 0);
    let gaps = [1, 9, 3, 14, 2, 7, 20, 5, 11];
    let mut times = vec![start];
    let mut t = start;
    for gap in gaps {
        t += Duration::hours(gap);
        times.push(t);
    }
    let report = detect_pattern(&times, &PatternConfig::default());
    assert!(!report.suspicious);
    assert!(report.variance_hours > 2.0);
}

#[tokio::test]
async fn test_regular_publishing_emits_pattern_warning_but_keeps_publishing() {
    let clock = ManualClock::new(at(0, 0));
    let events = EventBus::new(1024);
    let mut rx = events.subscribe();
    let adapter = Arc::new(ScriptedAdapter::new(Channel::Reddit));
    let engine = build_engine_with_events(
        config(10, 0, ""),
        adapter.clone(),
        items(Channel::Reddit, 12),
        Arc::new(clock.clone()),
        Arc::new(MemoryStore::new()),
        events,
    )
    .await;

    for _ in 0..10 {
        assert!(engine.dispatch_once(Channel::Reddit).await.unwrap().is_published());
        clock.advance(Duration::hours(4));
    }

    assert!(engine.audit(Channel::Reddit).suspicious);
    assert_eq!(adapter.publish_calls(), 10);

    let mut warnings = 0;
    while let Ok(event) = rx.try_recv() {
        if matches!(event, EngineEvent::PatternSuspicious { .. }) {
            warnings += 1;
        }
    }
    // Six gaps are needed before a verdict, so posts 7 through 10 warn.
    assert_eq!(warnings, 4);
}
