//! Dispatch pipeline: caps, classification, retries, de-duplication.

mod support;

use barker_core::{Channel, ContentId, FailureClass};
use barker_engine::{DispatchOutcome, EngineEvent, EventBus, SkipReason};
use barker_error::ChannelErrorKind;
use barker_interface::ManualClock;
use barker_storage::{JsonFileStore, MemoryStore};
use chrono::Duration;
use std::collections::BTreeSet;
use std::sync::Arc;
use support::{ScriptedAdapter, at, build_engine, build_engine_with_events, config, items};

#[tokio::test]
async fn test_scenario_a_daily_cap_rejects_third_publish_before_adapter() {
    let clock = ManualClock::new(at(9, 0));
    let adapter = Arc::new(ScriptedAdapter::new(Channel::Reddit));
    let engine = build_engine(
        config(2, 0, ""),
        adapter.clone(),
        items(Channel::Reddit, 5),
        Arc::new(clock.clone()),
        Arc::new(MemoryStore::new()),
    )
    .await;

    assert!(engine.dispatch_once(Channel::Reddit).await.unwrap().is_published());
    clock.advance(Duration::minutes(30));
    assert!(engine.dispatch_once(Channel::Reddit).await.unwrap().is_published());
    clock.advance(Duration::minutes(30));
    let third = engine.dispatch_once(Channel::Reddit).await.unwrap();

    assert_eq!(third, DispatchOutcome::Skipped(SkipReason::DailyCapReached));
    assert_eq!(adapter.publish_calls(), 2);
    let counters = engine.ledger().daily_counters_for(Channel::Reddit).await.unwrap();
    assert_eq!(counters.posts_today, 2);
    assert_eq!(counters.total_posts, 2);
}

#[tokio::test]
async fn test_daily_cap_resets_on_next_day() {
    let clock = ManualClock::new(at(20, 0));
    let adapter = Arc::new(ScriptedAdapter::new(Channel::Reddit));
    let engine = build_engine(
        config(1, 0, ""),
        adapter.clone(),
        items(Channel::Reddit, 3),
        Arc::new(clock.clone()),
        Arc::new(MemoryStore::new()),
    )
    .await;

    assert!(engine.dispatch_once(Channel::Reddit).await.unwrap().is_published());
    assert!(!engine.dispatch_once(Channel::Reddit).await.unwrap().is_published());

    clock.advance(Duration::hours(5));
    assert!(engine.dispatch_once(Channel::Reddit).await.unwrap().is_published());
    let counters = engine.ledger().daily_counters_for(Channel::Reddit).await.unwrap();
    assert_eq!(counters.posts_today, 1);
    assert_eq!(counters.total_posts, 2);
    assert_eq!(adapter.publish_calls(), 2);
}

#[tokio::test]
async fn test_scenario_b_permanent_failure_is_not_retried_or_reattempted() {
    let clock = ManualClock::new(at(9, 0));
    let adapter = Arc::new(ScriptedAdapter::with_script(
        Channel::Reddit,
        vec![Err(ChannelErrorKind::DuplicateContent("already on the sub".into()))],
    ));
    let engine = build_engine(
        config(5, 0, ""),
        adapter.clone(),
        items(Channel::Reddit, 1),
        Arc::new(clock),
        Arc::new(MemoryStore::new()),
    )
    .await;
    let y = ContentId::new("item-0");

    let first = engine.dispatch_once(Channel::Reddit).await.unwrap();
    match first {
        DispatchOutcome::Failed {
            classification,
            attempts,
            content_id,
            ..
        } => {
            assert_eq!(classification, FailureClass::Permanent);
            assert_eq!(attempts, 1);
            assert_eq!(content_id, y);
        }
        other => panic!("expected permanent failure, got {other:?}"),
    }
    assert_eq!(adapter.publish_calls(), 1);
    assert!(!engine.ledger().was_posted(Channel::Reddit, &y));

    let second = engine.dispatch_once(Channel::Reddit).await.unwrap();
    assert_eq!(second, DispatchOutcome::Skipped(SkipReason::QueueExhausted));
    assert_eq!(adapter.publish_calls(), 1);

    let counters = engine.ledger().daily_counters_for(Channel::Reddit).await.unwrap();
    assert_eq!(counters.last_rotation_index, 0);
    assert_eq!(counters.posts_today, 0);
}

#[tokio::test(start_paused = true)]
async fn test_transient_failures_exhaust_and_are_surfaced() {
    let clock = ManualClock::new(at(9, 0));
    let adapter = Arc::new(ScriptedAdapter::with_script(
        Channel::Reddit,
        vec![
            Err(ChannelErrorKind::Network("connection reset".into())),
            Err(ChannelErrorKind::Timeout("30s".into())),
            Err(ChannelErrorKind::Server("502".into())),
        ],
    ));
    let events = EventBus::default();
    let mut rx = events.subscribe();
    let engine = build_engine_with_events(
        config(5, 0, ""),
        adapter.clone(),
        items(Channel::Reddit, 1),
        Arc::new(clock),
        Arc::new(MemoryStore::new()),
        events,
    )
    .await;

    let outcome = engine.dispatch_once(Channel::Reddit).await.unwrap();
    assert!(matches!(
        outcome,
        DispatchOutcome::Failed {
            classification: FailureClass::Transient,
            attempts: 3,
            ..
        }
    ));
    assert_eq!(adapter.publish_calls(), 3);

    let history = engine.ledger().history(Some(Channel::Reddit));
    assert_eq!(history.len(), 1);
    assert!(!*history[0].success());
    assert_eq!(*history[0].classification(), Some(FailureClass::Transient));
    assert!(!engine.ledger().was_rejected(Channel::Reddit, &ContentId::new("item-0")));

    let mut saw_failure = false;
    while let Ok(event) = rx.try_recv() {
        if let EngineEvent::PublishFailed {
            classification,
            attempts,
            ..
        } = event
        {
            assert_eq!(classification, FailureClass::Transient);
            assert_eq!(attempts, 3);
            saw_failure = true;
        }
    }
    assert!(saw_failure);
}

#[tokio::test(start_paused = true)]
async fn test_transient_failure_then_success() {
    let clock = ManualClock::new(at(9, 0));
    let adapter = Arc::new(ScriptedAdapter::with_script(
        Channel::Reddit,
        vec![Err(ChannelErrorKind::RateLimited {
            retry_after_secs: None,
        })],
    ));
    let engine = build_engine(
        config(5, 0, ""),
        adapter.clone(),
        items(Channel::Reddit, 1),
        Arc::new(clock),
        Arc::new(MemoryStore::new()),
    )
    .await;

    match engine.dispatch_once(Channel::Reddit).await.unwrap() {
        DispatchOutcome::Published { attempts, .. } => assert_eq!(attempts, 2),
        other => panic!("expected publish, got {other:?}"),
    }
    assert!(engine.ledger().was_posted(Channel::Reddit, &ContentId::new("item-0")));
}

#[tokio::test]
async fn test_no_duplicate_success_per_content() {
    let clock = ManualClock::new(at(9, 0));
    let adapter = Arc::new(ScriptedAdapter::new(Channel::Reddit));
    let engine = build_engine(
        config(50, 0, ""),
        adapter.clone(),
        items(Channel::Reddit, 4),
        Arc::new(clock.clone()),
        Arc::new(MemoryStore::new()),
    )
    .await;

    let mut outcomes = Vec::new();
    for _ in 0..8 {
        outcomes.push(engine.dispatch_once(Channel::Reddit).await.unwrap());
        clock.advance(Duration::minutes(1));
    }

    let published: Vec<_> = outcomes.iter().filter(|o| o.is_published()).collect();
    assert_eq!(published.len(), 4);
    assert_eq!(
        outcomes.last(),
        Some(&DispatchOutcome::Skipped(SkipReason::QueueExhausted))
    );

    let ids = adapter.published_ids();
    let unique: BTreeSet<_> = ids.iter().collect();
    assert_eq!(unique.len(), ids.len());

    let successes: Vec<_> = engine
        .ledger()
        .history(Some(Channel::Reddit))
        .into_iter()
        .filter(|r| *r.success())
        .map(|r| r.content_id().clone())
        .collect();
    let unique: BTreeSet<_> = successes.iter().collect();
    assert_eq!(unique.len(), successes.len());
}

#[tokio::test]
async fn test_concurrent_dispatches_respect_cap() {
    let clock = ManualClock::new(at(9, 0));
    let adapter = Arc::new(ScriptedAdapter::new(Channel::Reddit));
    let engine = build_engine(
        config(3, 0, ""),
        adapter.clone(),
        items(Channel::Reddit, 10),
        Arc::new(clock),
        Arc::new(MemoryStore::new()),
    )
    .await;

    let mut handles = Vec::new();
    for _ in 0..8 {
        let engine = engine.clone();
        handles.push(tokio::spawn(async move {
            engine.dispatch_once(Channel::Reddit).await.unwrap()
        }));
    }
    let mut published = 0;
    for handle in handles {
        if handle.await.unwrap().is_published() {
            published += 1;
        }
    }

    assert_eq!(published, 3);
    assert_eq!(adapter.publish_calls(), 3);
    let counters = engine.ledger().daily_counters_for(Channel::Reddit).await.unwrap();
    assert_eq!(counters.posts_today, 3);
}

#[tokio::test]
async fn test_min_interval_skips_until_elapsed() {
    let clock = ManualClock::new(at(9, 0));
    let adapter = Arc::new(ScriptedAdapter::new(Channel::Reddit));
    let engine = build_engine(
        config(10, 90, ""),
        adapter.clone(),
        items(Channel::Reddit, 3),
        Arc::new(clock.clone()),
        Arc::new(MemoryStore::new()),
    )
    .await;

    assert!(engine.dispatch_once(Channel::Reddit).await.unwrap().is_published());
    clock.advance(Duration::minutes(60));
    assert_eq!(
        engine.dispatch_once(Channel::Reddit).await.unwrap(),
        DispatchOutcome::Skipped(SkipReason::MinIntervalNotElapsed)
    );
    clock.advance(Duration::minutes(30));
    assert!(engine.dispatch_once(Channel::Reddit).await.unwrap().is_published());
    assert_eq!(adapter.publish_calls(), 2);
}

#[tokio::test]
async fn test_success_starts_engagement_tracking() {
    let clock = ManualClock::new(at(9, 0));
    let adapter = Arc::new(ScriptedAdapter::new(Channel::Reddit));
    let engine = build_engine(
        config(5, 0, ""),
        adapter,
        items(Channel::Reddit, 1),
        Arc::new(clock),
        Arc::new(MemoryStore::new()),
    )
    .await;

    let DispatchOutcome::Published { external_ref, .. } =
        engine.dispatch_once(Channel::Reddit).await.unwrap()
    else {
        panic!("expected publish");
    };
    let record = engine.monitor().record(Channel::Reddit, &external_ref).unwrap();
    assert_eq!(record.content_id, ContentId::new("item-0"));
    assert_eq!(record.tracking_started_at, at(9, 0));
}

#[tokio::test]
async fn test_ledger_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("state.json");
    let clock = ManualClock::new(at(9, 0));

    {
        let engine = build_engine(
            config(5, 0, ""),
            Arc::new(ScriptedAdapter::new(Channel::Reddit)),
            items(Channel::Reddit, 3),
            Arc::new(clock.clone()),
            Arc::new(JsonFileStore::new(&path)),
        )
        .await;
        assert!(engine.dispatch_once(Channel::Reddit).await.unwrap().is_published());
        assert!(engine.dispatch_once(Channel::Reddit).await.unwrap().is_published());
    }

    let adapter = Arc::new(ScriptedAdapter::new(Channel::Reddit));
    let engine = build_engine(
        config(5, 0, ""),
        adapter.clone(),
        items(Channel::Reddit, 3),
        Arc::new(clock),
        Arc::new(JsonFileStore::new(&path)),
    )
    .await;
    assert!(!engine.load_report().recovered);
    assert_eq!(engine.ledger().history(None).len(), 2);

    assert!(engine.dispatch_once(Channel::Reddit).await.unwrap().is_published());
    assert_eq!(adapter.published_ids(), vec![ContentId::new("item-2")]);
    assert_eq!(
        engine.dispatch_once(Channel::Reddit).await.unwrap(),
        DispatchOutcome::Skipped(SkipReason::QueueExhausted)
    );
}

#[tokio::test]
async fn test_corrupt_state_starts_fresh_and_reports() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("state.json");
    std::fs::write(&path, "{\"version\": 1, \"post_history\": [truncated").unwrap();

    let events = EventBus::default();
    let mut rx = events.subscribe();
    let engine = build_engine_with_events(
        config(5, 0, ""),
        Arc::new(ScriptedAdapter::new(Channel::Reddit)),
        items(Channel::Reddit, 1),
        Arc::new(ManualClock::new(at(9, 0))),
        Arc::new(JsonFileStore::new(&path)),
        events,
    )
    .await;

    assert!(engine.load_report().recovered);
    assert!(engine.ledger().history(None).is_empty());
    let event = rx.try_recv().unwrap();
    assert_eq!(event.name(), "state_recovered");
    assert!(engine.dispatch_once(Channel::Reddit).await.unwrap().is_published());
}

#[tokio::test]
async fn test_disabled_channel_skips() {
    let adapter = Arc::new(ScriptedAdapter::new(Channel::Reddit));
    let engine = build_engine(
        config(5, 0, ""),
        adapter.clone(),
        items(Channel::Reddit, 2),
        Arc::new(ManualClock::new(at(9, 0))),
        Arc::new(MemoryStore::new()),
    )
    .await;

    engine.disable_channel(Channel::Reddit).await.unwrap();
    assert_eq!(
        engine.dispatch_once(Channel::Reddit).await.unwrap(),
        DispatchOutcome::Skipped(SkipReason::ChannelDisabled)
    );
    engine.enable_channel(Channel::Reddit);
    assert!(engine.dispatch_once(Channel::Reddit).await.unwrap().is_published());
    assert_eq!(adapter.publish_calls(), 1);
}

#[tokio::test]
async fn test_unconfigured_channel_is_an_error() {
    let engine = build_engine(
        config(5, 0, ""),
        Arc::new(ScriptedAdapter::new(Channel::Reddit)),
        items(Channel::Reddit, 1),
        Arc::new(ManualClock::new(at(9, 0))),
        Arc::new(MemoryStore::new()),
    )
    .await;
    assert!(engine.dispatch_once(Channel::Quora).await.is_err());
}
