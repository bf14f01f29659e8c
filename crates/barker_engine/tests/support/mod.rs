//! Shared fixtures for engine tests.

#![allow(dead_code)]

use async_trait::async_trait;
use barker_core::{Channel, ContentId, ContentItem, ExternalRef, FeedbackItem};
use barker_engine::{Engine, EngineConfig, EventBus, StaticContentSource};
use barker_error::{ChannelError, ChannelErrorKind};
use barker_interface::{ChannelAdapter, ChannelResult, Clock, StateStore};
use chrono::{DateTime, TimeZone, Utc};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

/// 2026-04-01 at `h:m` UTC.
pub fn at(h: u32, m: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 4, 1, h, m, 0).unwrap()
}

/// Clock that follows tokio's (pausable) timer from a fixed anchor.
#[derive(Debug, Clone)]
pub struct TokioClock {
    anchor: DateTime<Utc>,
    started: tokio::time::Instant,
}

impl TokioClock {
    pub fn new(anchor: DateTime<Utc>) -> Self {
        Self {
            anchor,
            started: tokio::time::Instant::now(),
        }
    }
}

impl Clock for TokioClock {
    fn now(&self) -> DateTime<Utc> {
        self.anchor + chrono::Duration::from_std(self.started.elapsed()).unwrap()
    }
}

/// Adapter that follows a script of publish results and records calls.
#[derive(Debug)]
pub struct ScriptedAdapter {
    channel: Channel,
    script: Mutex<VecDeque<Result<(), ChannelErrorKind>>>,
    published: Mutex<Vec<ContentId>>,
    feedback: Mutex<HashMap<ExternalRef, Vec<FeedbackItem>>>,
    replies: Mutex<Vec<(ExternalRef, String, String)>>,
    sequence: AtomicU64,
    fixed_ref: Option<ExternalRef>,
}

impl ScriptedAdapter {
    /// Adapter whose publishes always succeed.
    pub fn new(channel: Channel) -> Self {
        Self::with_script(channel, Vec::new())
    }

    /// Adapter answering publishes from `script`, then succeeding.
    pub fn with_script(channel: Channel, script: Vec<Result<(), ChannelErrorKind>>) -> Self {
        Self {
            channel,
            script: Mutex::new(script.into()),
            published: Mutex::new(Vec::new()),
            feedback: Mutex::new(HashMap::new()),
            replies: Mutex::new(Vec::new()),
            sequence: AtomicU64::new(0),
            fixed_ref: None,
        }
    }

    /// Adapter that answers every publish with the same reference.
    pub fn with_fixed_ref(channel: Channel, external_ref: &str) -> Self {
        Self {
            fixed_ref: Some(ExternalRef::from(external_ref)),
            ..Self::new(channel)
        }
    }

    pub fn publish_calls(&self) -> usize {
        self.published.lock().unwrap().len()
    }

    pub fn published_ids(&self) -> Vec<ContentId> {
        self.published.lock().unwrap().clone()
    }

    pub fn set_feedback(&self, external_ref: ExternalRef, items: Vec<FeedbackItem>) {
        self.feedback.lock().unwrap().insert(external_ref, items);
    }

    pub fn replies(&self) -> Vec<(ExternalRef, String, String)> {
        self.replies.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChannelAdapter for ScriptedAdapter {
    fn channel(&self) -> Channel {
        self.channel
    }

    async fn publish(&self, content: &ContentItem) -> ChannelResult<ExternalRef> {
        self.published.lock().unwrap().push(content.id().clone());
        let step = self.script.lock().unwrap().pop_front();
        match step {
            Some(Err(kind)) => Err(ChannelError::new(kind)),
            _ => {
                let n = self.sequence.fetch_add(1, Ordering::SeqCst) + 1;
                Ok(self
                    .fixed_ref
                    .clone()
                    .unwrap_or_else(|| ExternalRef(format!("{}-post-{}", self.channel, n))))
            }
        }
    }

    async fn fetch_feedback(&self, external_ref: &ExternalRef) -> ChannelResult<Vec<FeedbackItem>> {
        Ok(self
            .feedback
            .lock()
            .unwrap()
            .get(external_ref)
            .cloned()
            .unwrap_or_default())
    }

    async fn reply(&self, external_ref: &ExternalRef, feedback_id: &str, text: &str) -> ChannelResult<()> {
        self.replies.lock().unwrap().push((
            external_ref.clone(),
            feedback_id.to_string(),
            text.to_string(),
        ));
        Ok(())
    }
}

/// Reddit-only configuration with fast retries and one late-evening window.
pub fn config(daily_cap: u32, min_interval_minutes: u32, extra: &str) -> EngineConfig {
    EngineConfig::from_toml_str(&format!("{}\n{}", base_toml(daily_cap, min_interval_minutes), extra)).unwrap()
}

/// TOML behind [`config`], for tests that rewrite single values.
pub fn base_toml(daily_cap: u32, min_interval_minutes: u32) -> String {
    format!(
        r#"
history_limit = 100

[retry]
initial_delay_ms = 10
multiplier = 2.0
max_delay_secs = 1
max_retries = 3

[engagement]
blacklist_words = ["crypto", "click here"]
reply_probability = 1.0
max_replies_per_hour = 10
reply_delay_min_minutes = 5
reply_delay_max_minutes = 45
poll_interval_minutes = 60
retention_days = 90
reply_templates = ["Thanks!"]

[channels.reddit]
daily_cap = {daily_cap}
min_interval_minutes = {min_interval_minutes}

[[channels.reddit.windows]]
name = "late"
start = "23:00"
end = "23:59"
probability = 1.0
"#
    )
}

/// `n` items for `channel` with ids `item-0..n`.
pub fn items(channel: Channel, n: usize) -> Vec<ContentItem> {
    (0..n)
        .map(|i| {
            ContentItem::new(
                ContentId::new(format!("item-{}", i)),
                channel,
                serde_json::json!({"title": format!("Product {}", i)}),
                at(0, 0),
            )
        })
        .collect()
}

pub async fn build_engine(
    config: EngineConfig,
    adapter: Arc<ScriptedAdapter>,
    items: Vec<ContentItem>,
    clock: Arc<dyn Clock>,
    store: Arc<dyn StateStore>,
) -> Engine {
    build_engine_with_events(config, adapter, items, clock, store, EventBus::default()).await
}

pub async fn build_engine_with_events(
    config: EngineConfig,
    adapter: Arc<ScriptedAdapter>,
    items: Vec<ContentItem>,
    clock: Arc<dyn Clock>,
    store: Arc<dyn StateStore>,
    events: EventBus,
) -> Engine {
    Engine::builder()
        .config(config)
        .adapter(adapter)
        .source(Arc::new(StaticContentSource::new(items)))
        .clock(clock)
        .store(store)
        .rng_seed(11)
        .events(events)
        .build()
        .await
        .unwrap()
}
