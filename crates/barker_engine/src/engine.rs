//! Engine orchestration.
//!
//! One task per enabled channel waits for its next planned dispatch, one task
//! per accepted reply waits for its send time, and a poller walks tracked
//! items. All of them share one [`StateHandle`], so every check-then-write
//! (cap check and increment, select and promote) is a single atomic mutation.

use crate::engagement::start_tracking;
use crate::ledger::apply_outcome;
use crate::rotation::claim_next;
use crate::schedule::sleep_until;
use crate::window::{plan_next, should_dispatch};
use crate::{
    ActionSchedule, EngagementMonitor, EngagementStats, EngineConfig, EngineEvent, EventBus,
    FeedbackSummary, PatternReport, PostLedger, RotationQueue, SkipReason, detect_pattern,
};
use barker_core::{
    ActionKind, Channel, ContentId, ContentItem, ExternalRef, FailureClass, FeedbackItem,
    PostOutcome, ScheduledAction,
};
use barker_error::{BarkerResult, ConfigError, EngineError, EngineErrorKind};
use barker_interface::{ChannelAdapter, Clock, ContentSource, StateStore, SystemClock};
use barker_rate_limit::{Admission, ApiThrottle, RetryOutcome, check_admission};
use barker_storage::{JsonFileStore, LoadReport, StateHandle};
use parking_lot::{Mutex, RwLock};
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::collections::{BTreeSet, HashMap};
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

/// Pause after a storage failure before a channel task tries again.
const RECOVERY_DELAY: Duration = Duration::from_secs(60);

/// Result of one dispatch.
#[derive(Debug, Clone, PartialEq)]
pub enum DispatchOutcome {
    /// Content was published.
    Published {
        /// Published content
        content_id: ContentId,
        /// Channel-assigned reference
        external_ref: ExternalRef,
        /// Attempts made
        attempts: u32,
    },
    /// Publishing failed terminally and was recorded.
    Failed {
        /// Content that failed
        content_id: ContentId,
        /// Transient (retries exhausted) or permanent
        classification: FailureClass,
        /// Attempts made
        attempts: u32,
        /// Final error
        error: String,
    },
    /// Nothing was published.
    Skipped(SkipReason),
}

impl DispatchOutcome {
    /// Whether content was published.
    pub fn is_published(&self) -> bool {
        matches!(self, Self::Published { .. })
    }
}

enum Claim {
    Blocked(SkipReason),
    Ready(ContentItem),
}

struct EngineInner {
    config: EngineConfig,
    state: StateHandle,
    clock: Arc<dyn Clock>,
    adapters: HashMap<Channel, Arc<dyn ChannelAdapter>>,
    source: Arc<dyn ContentSource>,
    ledger: PostLedger,
    rotation: RotationQueue,
    monitor: EngagementMonitor,
    schedule: ActionSchedule,
    throttle: ApiThrottle,
    events: EventBus,
    rng: Arc<Mutex<StdRng>>,
    dispatch_locks: HashMap<Channel, tokio::sync::Mutex<()>>,
    channel_tokens: Mutex<HashMap<Channel, CancellationToken>>,
    disabled: RwLock<BTreeSet<Channel>>,
    shutdown: Mutex<CancellationToken>,
    tasks: Mutex<JoinSet<()>>,
    running: AtomicBool,
    load_report: LoadReport,
}

/// The posting automation engine.
///
/// # Example
///
/// ```no_run
/// use barker_core::Channel;
/// use barker_engine::{Engine, EngineConfig, NoOpAdapter, StaticContentSource};
/// use std::sync::Arc;
///
/// # async fn run() -> barker_error::BarkerResult<()> {
/// let config = EngineConfig::load(None)?;
/// let engine = Engine::builder()
///     .config(config)
///     .adapter(Arc::new(NoOpAdapter::new(Channel::Reddit)))
///     .source(Arc::new(StaticContentSource::default()))
///     .build()
///     .await?;
/// engine.start().await?;
/// engine.stop().await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Engine {
    inner: Arc<EngineInner>,
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("channels", &self.inner.adapters.keys().collect::<Vec<_>>())
            .field("running", &self.is_running())
            .finish_non_exhaustive()
    }
}

impl Engine {
    /// Start building an engine.
    pub fn builder() -> EngineBuilder {
        EngineBuilder::default()
    }

    /// Configuration in use.
    pub fn config(&self) -> &EngineConfig {
        &self.inner.config
    }

    /// Shared state handle.
    pub fn state(&self) -> &StateHandle {
        &self.inner.state
    }

    /// Post ledger.
    pub fn ledger(&self) -> &PostLedger {
        &self.inner.ledger
    }

    /// Rotation queue.
    pub fn rotation(&self) -> &RotationQueue {
        &self.inner.rotation
    }

    /// Engagement monitor.
    pub fn monitor(&self) -> &EngagementMonitor {
        &self.inner.monitor
    }

    /// Pending action schedule.
    pub fn schedule(&self) -> &ActionSchedule {
        &self.inner.schedule
    }

    /// Event bus.
    pub fn events(&self) -> &EventBus {
        &self.inner.events
    }

    /// How the persisted state was loaded.
    pub fn load_report(&self) -> &LoadReport {
        &self.inner.load_report
    }

    /// Whether background tasks are running.
    pub fn is_running(&self) -> bool {
        self.inner.running.load(Ordering::SeqCst)
    }

    /// Whether `channel` is disabled at runtime.
    pub fn is_disabled(&self, channel: Channel) -> bool {
        self.inner.is_disabled(channel)
    }

    /// Dispatch on `channel` now, outside any window.
    ///
    /// # Errors
    ///
    /// Returns error if the channel is not configured, the content source
    /// fails, or state cannot be persisted. Skips and publish failures are
    /// outcomes, not errors.
    pub async fn dispatch_once(&self, channel: Channel) -> BarkerResult<DispatchOutcome> {
        self.inner.dispatch(channel, None).await
    }

    /// Audit the spacing of `channel`'s successful posts.
    pub fn audit(&self, channel: Channel) -> PatternReport {
        self.inner.audit(channel)
    }

    /// Engagement statistics.
    pub fn stats(&self, channel: Option<Channel>) -> EngagementStats {
        self.inner.monitor.stats(channel)
    }

    /// Process feedback for a tracked item and schedule accepted replies.
    ///
    /// # Errors
    ///
    /// Returns error if the item is not tracked or state cannot be persisted.
    pub async fn process_feedback(
        &self,
        channel: Channel,
        external_ref: &ExternalRef,
        items: &[FeedbackItem],
    ) -> BarkerResult<FeedbackSummary> {
        let summary = self
            .inner
            .monitor
            .process_feedback(channel, external_ref, items)
            .await?;
        self.inner.after_feedback(&summary.scheduled);
        Ok(summary)
    }

    /// Poll every tracked item once. Returns how many replies were scheduled.
    ///
    /// # Errors
    ///
    /// Returns error if pruning cannot be persisted. Per-item failures are
    /// logged and skipped.
    pub async fn poll_engagement(&self) -> BarkerResult<usize> {
        self.inner.poll_round().await
    }

    /// Spawn channel schedulers, resume persisted replies, start polling.
    ///
    /// Overdue persisted actions fire immediately.
    ///
    /// # Errors
    ///
    /// Returns error if the engine is already running or retention pruning
    /// cannot be persisted.
    #[instrument(skip(self))]
    pub async fn start(&self) -> BarkerResult<()> {
        let inner = &self.inner;
        if inner.running.swap(true, Ordering::SeqCst) {
            return Err(EngineError::new(EngineErrorKind::AlreadyRunning).into());
        }

        let shutdown = CancellationToken::new();
        *inner.shutdown.lock() = shutdown.clone();

        if let Err(e) = inner.monitor.prune().await {
            inner.running.store(false, Ordering::SeqCst);
            return Err(e);
        }

        let mut started = Vec::new();
        for channel in inner.config.enabled_channels() {
            if inner.is_disabled(channel) {
                continue;
            }
            inner.spawn_channel(channel, &shutdown);
            started.push(channel);
        }

        let replies = inner.schedule.pending_replies();
        let resumed = replies.len();
        for action in replies {
            let token = inner.parent_token(action.channel);
            inner.spawn(Arc::clone(inner).reply_task(action, token));
        }

        inner.spawn(Arc::clone(inner).poll_loop(shutdown.child_token()));

        info!(channels = ?started, resumed_replies = resumed, "Engine started");
        Ok(())
    }

    /// Cancel background tasks, wait for them, and flush state.
    ///
    /// In-flight publishes finish and are recorded; waiting dispatches and
    /// replies stay persisted and resume on the next start.
    ///
    /// # Errors
    ///
    /// Returns error if the final flush fails.
    #[instrument(skip(self))]
    pub async fn stop(&self) -> BarkerResult<()> {
        let inner = &self.inner;
        inner.shutdown.lock().cancel();

        let mut tasks = std::mem::take(&mut *inner.tasks.lock());
        while let Some(result) = tasks.join_next().await {
            if let Err(e) = result
                && e.is_panic()
            {
                error!(error = %e, "Engine task panicked");
            }
        }
        inner.channel_tokens.lock().clear();
        inner.running.store(false, Ordering::SeqCst);
        inner.state.flush().await?;
        info!("Engine stopped");
        Ok(())
    }

    /// Stop scheduling on `channel` and cancel its pending actions.
    ///
    /// A dispatch or reply cancelled here never fires. Returns how many
    /// persisted actions were removed.
    ///
    /// # Errors
    ///
    /// Returns error if state cannot be persisted.
    #[instrument(skip(self))]
    pub async fn disable_channel(&self, channel: Channel) -> BarkerResult<usize> {
        let inner = &self.inner;
        inner.disabled.write().insert(channel);
        if let Some(token) = inner.channel_tokens.lock().remove(&channel) {
            token.cancel();
        }
        let removed = inner.schedule.cancel_channel(channel).await?;
        info!(%channel, removed, "Channel disabled");
        Ok(removed)
    }

    /// Re-enable a channel disabled at runtime.
    pub fn enable_channel(&self, channel: Channel) {
        let inner = &self.inner;
        inner.disabled.write().remove(&channel);
        let configured = inner.config.channel(channel).is_some_and(|c| *c.enabled());
        if self.is_running() && configured && !inner.channel_tokens.lock().contains_key(&channel) {
            let shutdown = inner.shutdown.lock().clone();
            inner.spawn_channel(channel, &shutdown);
        }
        info!(%channel, "Channel enabled");
    }
}

impl EngineInner {
    fn is_disabled(&self, channel: Channel) -> bool {
        self.disabled.read().contains(&channel)
    }

    fn spawn<F>(&self, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let mut tasks = self.tasks.lock();
        while tasks.try_join_next().is_some() {}
        tasks.spawn(task);
    }

    fn spawn_channel(self: &Arc<Self>, channel: Channel, shutdown: &CancellationToken) {
        let token = shutdown.child_token();
        self.channel_tokens.lock().insert(channel, token.clone());
        self.spawn(Arc::clone(self).channel_loop(channel, token));
    }

    fn parent_token(&self, channel: Channel) -> CancellationToken {
        match self.channel_tokens.lock().get(&channel) {
            Some(token) => token.clone(),
            None => self.shutdown.lock().clone(),
        }
    }

    fn audit(&self, channel: Channel) -> PatternReport {
        detect_pattern(&self.ledger.success_times(channel), self.config.pattern())
    }

    fn not_configured(channel: Channel) -> EngineError {
        EngineError::new(EngineErrorKind::ChannelNotConfigured(channel.to_string()))
    }

    #[instrument(skip_all, fields(%channel))]
    async fn dispatch(&self, channel: Channel, window: Option<String>) -> BarkerResult<DispatchOutcome> {
        if self.is_disabled(channel) {
            return Ok(self.skip(channel, SkipReason::ChannelDisabled));
        }
        let settings = self
            .config
            .channel(channel)
            .ok_or_else(|| Self::not_configured(channel))?;
        let adapter = self
            .adapters
            .get(&channel)
            .cloned()
            .ok_or_else(|| Self::not_configured(channel))?;
        let lock = self
            .dispatch_locks
            .get(&channel)
            .ok_or_else(|| Self::not_configured(channel))?;

        let _serial = lock.lock().await;
        self.events.emit(EngineEvent::DispatchFired { channel, window });

        let eligible = self.source.list_eligible(channel).await?;
        let now = self.clock.now();
        let limits = settings.limits();
        let rotation = self.config.rotation();

        let claim = self
            .state
            .try_update(|state| -> BarkerResult<Claim> {
                let today = now.date_naive();
                let counters = state.channel_state_mut(channel, today);
                counters.roll_day(today);
                match check_admission(&limits, counters, now) {
                    Admission::Allowed => {}
                    Admission::DailyCapReached { .. } => {
                        return Ok(Claim::Blocked(SkipReason::DailyCapReached));
                    }
                    Admission::MinIntervalNotElapsed { .. } => {
                        return Ok(Claim::Blocked(SkipReason::MinIntervalNotElapsed));
                    }
                }
                Ok(match claim_next(state, channel, &eligible, now, rotation) {
                    Some(item) => Claim::Ready(item),
                    None => Claim::Blocked(SkipReason::QueueExhausted),
                })
            })
            .await?;

        let item = match claim {
            Claim::Blocked(reason) => return Ok(self.skip(channel, reason)),
            Claim::Ready(item) => item,
        };

        let throttle = &self.throttle;
        let adapter = adapter.as_ref();
        let content = &item;
        let result = self
            .config
            .retry()
            .run(move |attempt| async move {
                throttle.acquire(channel).await;
                debug!(%channel, content_id = %content.id(), attempt, "Publishing");
                adapter.publish(content).await
            })
            .await;

        let outcome = match result {
            RetryOutcome::Succeeded { value, attempts } => PostOutcome::Published {
                external_ref: value,
                attempts,
            },
            RetryOutcome::Failed {
                error,
                class,
                attempts,
            } => PostOutcome::Failed {
                error: error.to_string(),
                class,
                attempts,
            },
        };

        let content_id = item.id().clone();
        let recorded_at = self.clock.now();
        let limit = *self.config.history_limit();
        self.state
            .update(|state| {
                apply_outcome(state, channel, content_id.clone(), &outcome, recorded_at, limit);
                if let PostOutcome::Published { external_ref, .. } = &outcome {
                    start_tracking(state, channel, external_ref.clone(), content_id.clone(), recorded_at);
                }
            })
            .await?;

        let dispatched = match outcome {
            PostOutcome::Published {
                external_ref,
                attempts,
            } => {
                self.events.emit(EngineEvent::PublishSucceeded {
                    channel,
                    content_id: content_id.clone(),
                    external_ref: external_ref.clone(),
                    attempts,
                });
                let report = self.audit(channel);
                if report.suspicious {
                    self.events
                        .emit(EngineEvent::PatternSuspicious { channel, report });
                }
                DispatchOutcome::Published {
                    content_id,
                    external_ref,
                    attempts,
                }
            }
            PostOutcome::Failed {
                error,
                class,
                attempts,
            } => {
                self.events.emit(EngineEvent::PublishFailed {
                    channel,
                    content_id: content_id.clone(),
                    classification: class,
                    attempts,
                    error: error.clone(),
                });
                if class == FailureClass::Transient {
                    warn!(%channel, %content_id, attempts, "Retries exhausted, needs operator review");
                }
                DispatchOutcome::Failed {
                    content_id,
                    classification: class,
                    attempts,
                    error,
                }
            }
        };
        Ok(dispatched)
    }

    fn skip(&self, channel: Channel, reason: SkipReason) -> DispatchOutcome {
        self.events
            .emit(EngineEvent::DispatchSkipped { channel, reason });
        DispatchOutcome::Skipped(reason)
    }

    async fn pause(&self, token: &CancellationToken, delay: Duration) -> bool {
        tokio::select! {
            biased;
            _ = token.cancelled() => false,
            _ = tokio::time::sleep(delay) => true,
        }
    }

    async fn channel_loop(self: Arc<Self>, channel: Channel, token: CancellationToken) {
        let Some(settings) = self.config.channel(channel).cloned() else {
            return;
        };
        let mut after = self.clock.now();

        while !token.is_cancelled() {
            let action = match self.schedule.pending_dispatch(channel) {
                Some(action) => {
                    debug!(%channel, fire_at = %action.fire_at, "Resuming persisted dispatch");
                    action
                }
                None => {
                    let plan = {
                        let mut rng = self.rng.lock();
                        plan_next(settings.windows(), after, &mut *rng)
                    };
                    let Some(plan) = plan else {
                        warn!(%channel, "No windows configured, scheduler idle");
                        return;
                    };
                    let action = ScheduledAction::new(
                        channel,
                        plan.fire_at,
                        ActionKind::Dispatch {
                            window: plan.window.name.clone(),
                            window_end: plan.window_end,
                        },
                    );
                    if let Err(e) = self.schedule.persist(action.clone()).await {
                        error!(%channel, error = %e, "Failed to persist planned dispatch");
                        if !self.pause(&token, RECOVERY_DELAY).await {
                            return;
                        }
                        continue;
                    }
                    self.events.emit(EngineEvent::DispatchScheduled {
                        channel,
                        window: plan.window.name,
                        fire_at: plan.fire_at,
                    });
                    action
                }
            };

            let waiter = self.schedule.arm(&action, &token);
            if !sleep_until(self.clock.as_ref(), action.fire_at, &waiter).await {
                if self.is_disabled(channel) {
                    if let Err(e) = self.schedule.cancel(action.id).await {
                        warn!(%channel, error = %e, "Failed to drop cancelled dispatch");
                    }
                } else {
                    self.schedule.release(action.id);
                }
                continue;
            }

            if let Err(e) = self.schedule.complete(action.id).await {
                error!(%channel, error = %e, "Failed to clear fired dispatch");
            }
            let ActionKind::Dispatch { window, window_end } = action.kind else {
                continue;
            };
            after = window_end.max(self.clock.now());

            let proceed = match settings.window(&window) {
                Some(w) => {
                    let mut rng = self.rng.lock();
                    should_dispatch(w, &mut *rng)
                }
                None => true,
            };
            if !proceed {
                self.skip(channel, SkipReason::ProbabilityDraw);
                continue;
            }

            match self.dispatch(channel, Some(window)).await {
                Ok(outcome) => debug!(%channel, ?outcome, "Dispatch complete"),
                Err(e) => {
                    error!(%channel, error = %e, "Dispatch failed");
                    if !self.pause(&token, RECOVERY_DELAY).await {
                        return;
                    }
                }
            }
        }
    }

    async fn reply_task(self: Arc<Self>, action: ScheduledAction, parent: CancellationToken) {
        let waiter = self.schedule.arm(&action, &parent);
        let fire = sleep_until(self.clock.as_ref(), action.fire_at, &waiter).await;
        self.schedule.release(action.id);
        if fire && !self.is_disabled(action.channel) {
            self.send_reply(&action).await;
        }
    }

    async fn send_reply(&self, action: &ScheduledAction) {
        let ActionKind::Reply {
            external_ref,
            feedback_id,
            text,
        } = &action.kind
        else {
            return;
        };
        let channel = action.channel;
        let Some(adapter) = self.adapters.get(&channel) else {
            warn!(%channel, "No adapter for pending reply");
            return;
        };

        self.throttle.acquire(channel).await;
        let result = adapter.reply(external_ref, feedback_id, text).await;
        if let Err(e) = self
            .monitor
            .complete_reply(action, result.as_ref().map(|_| ()))
            .await
        {
            error!(%channel, error = %e, "Failed to record reply");
        }

        let event = match result {
            Ok(()) => EngineEvent::ReplySent {
                channel,
                external_ref: external_ref.clone(),
                feedback_id: feedback_id.clone(),
            },
            Err(e) => EngineEvent::ReplyFailed {
                channel,
                external_ref: external_ref.clone(),
                feedback_id: feedback_id.clone(),
                error: e.to_string(),
            },
        };
        self.events.emit(event);
    }

    fn after_feedback(self: &Arc<Self>, scheduled: &[ScheduledAction]) {
        for action in scheduled {
            if let ActionKind::Reply {
                external_ref,
                feedback_id,
                ..
            } = &action.kind
            {
                self.events.emit(EngineEvent::ReplyScheduled {
                    channel: action.channel,
                    external_ref: external_ref.clone(),
                    feedback_id: feedback_id.clone(),
                    fire_at: action.fire_at,
                });
            }
            if self.running.load(Ordering::SeqCst) {
                let token = self.parent_token(action.channel);
                self.spawn(Arc::clone(self).reply_task(action.clone(), token));
            }
        }
    }

    async fn poll_loop(self: Arc<Self>, token: CancellationToken) {
        let minutes = u64::from(*self.config.engagement().poll_interval_minutes()).max(1);
        let interval = Duration::from_secs(minutes * 60);
        while self.pause(&token, interval).await {
            match self.poll_round().await {
                Ok(scheduled) => debug!(scheduled, "Polling round complete"),
                Err(e) => warn!(error = %e, "Polling round failed"),
            }
        }
    }

    async fn poll_round(self: &Arc<Self>) -> BarkerResult<usize> {
        let mut scheduled = 0;
        for (external_ref, channel) in self.monitor.tracked() {
            if self.is_disabled(channel) {
                continue;
            }
            let Some(adapter) = self.adapters.get(&channel) else {
                continue;
            };
            match self
                .monitor
                .poll(adapter.as_ref(), &self.throttle, &external_ref)
                .await
            {
                Ok(summary) => {
                    scheduled += summary.scheduled.len();
                    self.after_feedback(&summary.scheduled);
                }
                Err(e) => warn!(%channel, %external_ref, error = %e, "Polling failed"),
            }
        }
        self.monitor.prune().await?;
        Ok(scheduled)
    }
}

/// Builder for [`Engine`].
#[derive(Default)]
pub struct EngineBuilder {
    config: Option<EngineConfig>,
    store: Option<Arc<dyn StateStore>>,
    clock: Option<Arc<dyn Clock>>,
    adapters: Vec<Arc<dyn ChannelAdapter>>,
    source: Option<Arc<dyn ContentSource>>,
    seed: Option<u64>,
    events: Option<EventBus>,
}

impl EngineBuilder {
    /// Set configuration. Required.
    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Set the state store. Defaults to a JSON file at `state_path`.
    pub fn store(mut self, store: Arc<dyn StateStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Set the clock. Defaults to the system clock.
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Register the adapter for its channel.
    pub fn adapter(mut self, adapter: Arc<dyn ChannelAdapter>) -> Self {
        self.adapters.push(adapter);
        self
    }

    /// Set the content source. Required.
    pub fn source(mut self, source: Arc<dyn ContentSource>) -> Self {
        self.source = Some(source);
        self
    }

    /// Seed the random source for reproducible runs.
    pub fn rng_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Publish events on an existing bus, e.g. to observe state recovery.
    pub fn events(mut self, events: EventBus) -> Self {
        self.events = Some(events);
        self
    }

    /// Validate configuration, load state, and assemble the engine.
    ///
    /// Unreadable state is quarantined and replaced with defaults.
    ///
    /// # Errors
    ///
    /// Returns error if configuration or source is missing, configuration is
    /// invalid, or an enabled channel has no adapter.
    pub async fn build(self) -> BarkerResult<Engine> {
        let config = self
            .config
            .ok_or_else(|| ConfigError::new("Engine config is required"))?;
        config.validate()?;
        let source = self
            .source
            .ok_or_else(|| ConfigError::new("Content source is required"))?;

        let adapters: HashMap<Channel, Arc<dyn ChannelAdapter>> = self
            .adapters
            .into_iter()
            .map(|adapter| (adapter.channel(), adapter))
            .collect();
        for channel in config.enabled_channels() {
            if !adapters.contains_key(&channel) {
                return Err(EngineError::new(EngineErrorKind::ChannelNotConfigured(format!(
                    "no adapter registered for enabled channel {}",
                    channel
                )))
                .into());
            }
        }

        let store: Arc<dyn StateStore> = match self.store {
            Some(store) => store,
            None => Arc::new(JsonFileStore::new(config.state_path())),
        };
        let clock: Arc<dyn Clock> = match self.clock {
            Some(clock) => clock,
            None => Arc::new(SystemClock),
        };
        let events = self.events.unwrap_or_default();
        let rng = Arc::new(Mutex::new(match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        }));

        let (state, load_report) = StateHandle::open(store).await;
        if load_report.recovered {
            events.emit(EngineEvent::StateRecovered {
                reason: load_report.reason.clone().unwrap_or_default(),
                quarantined_to: load_report.quarantined_to.clone(),
            });
        }

        let ledger = PostLedger::new(state.clone(), Arc::clone(&clock), *config.history_limit());
        let rotation = RotationQueue::new(state.clone(), Arc::clone(&clock), config.rotation().clone());
        let monitor = EngagementMonitor::new(
            state.clone(),
            Arc::clone(&clock),
            config.engagement().clone(),
            Arc::clone(&rng),
        );
        let schedule = ActionSchedule::new(state.clone());
        let throttle = config.throttle();
        let dispatch_locks = adapters
            .keys()
            .map(|channel| (*channel, tokio::sync::Mutex::new(())))
            .collect();

        info!(
            channels = adapters.len(),
            recovered = load_report.recovered,
            "Engine built"
        );

        Ok(Engine {
            inner: Arc::new(EngineInner {
                config,
                state,
                clock,
                adapters,
                source,
                ledger,
                rotation,
                monitor,
                schedule,
                throttle,
                events,
                rng,
                dispatch_locks,
                channel_tokens: Mutex::new(HashMap::new()),
                disabled: RwLock::new(BTreeSet::new()),
                shutdown: Mutex::new(CancellationToken::new()),
                tasks: Mutex::new(JoinSet::new()),
                running: AtomicBool::new(false),
                load_report,
            }),
        })
    }
}
