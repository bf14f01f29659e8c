//! Post ledger.

use barker_core::{Channel, ChannelState, ContentId, EngineState, FailureClass, PostOutcome, PostRecord};
use barker_error::BarkerResult;
use barker_interface::Clock;
use barker_storage::StateHandle;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{debug, instrument};

/// Append-only record of publish attempts and per-channel counters.
///
/// Every mutation is a single read-modify-write on the [`StateHandle`], so
/// channel tasks recording concurrently never lose an update.
#[derive(Debug, Clone)]
pub struct PostLedger {
    state: StateHandle,
    clock: Arc<dyn Clock>,
    history_limit: usize,
}

impl PostLedger {
    /// Ledger over `state`, keeping the last `history_limit` records.
    pub fn new(state: StateHandle, clock: Arc<dyn Clock>, history_limit: usize) -> Self {
        Self {
            state,
            clock,
            history_limit,
        }
    }

    /// Record a terminal outcome.
    ///
    /// Successes bump `posts_today` and `total_posts`, advance the rotation
    /// index and set `last_post_at`. Permanent failures add the pair to the
    /// rejected set without touching counters. Exhausted transient failures
    /// are recorded for audit only.
    ///
    /// # Errors
    ///
    /// Returns error if the state cannot be persisted.
    #[instrument(skip(self, outcome), fields(success = outcome.is_success()))]
    pub async fn record_attempt(
        &self,
        channel: Channel,
        content_id: ContentId,
        outcome: PostOutcome,
    ) -> BarkerResult<PostRecord> {
        let now = self.clock.now();
        let limit = self.history_limit;
        let record = self
            .state
            .update(|state| apply_outcome(state, channel, content_id, &outcome, now, limit))
            .await?;
        Ok(record)
    }

    /// Whether `(channel, content_id)` has a successful record.
    pub fn was_posted(&self, channel: Channel, content_id: &ContentId) -> bool {
        self.state.read(|state| state.was_posted(channel, content_id))
    }

    /// Whether `(channel, content_id)` failed permanently.
    pub fn was_rejected(&self, channel: Channel, content_id: &ContentId) -> bool {
        self.state.read(|state| state.was_rejected(channel, content_id))
    }

    /// Counters for `channel`, reset first if the stored day is stale.
    ///
    /// # Errors
    ///
    /// Returns error if the reset cannot be persisted.
    pub async fn daily_counters_for(&self, channel: Channel) -> BarkerResult<ChannelState> {
        let today = self.clock.today();
        let counters = self
            .state
            .update(|state| {
                let counters = state.channel_state_mut(channel, today);
                if counters.roll_day(today) {
                    debug!(%channel, %today, "Daily counters reset");
                }
                counters.clone()
            })
            .await?;
        Ok(counters)
    }

    /// Retained history, oldest first, optionally for one channel.
    pub fn history(&self, channel: Option<Channel>) -> Vec<PostRecord> {
        self.state.read(|state| {
            state
                .post_history
                .iter()
                .filter(|r| channel.is_none_or(|c| *r.channel() == c))
                .cloned()
                .collect()
        })
    }

    /// Timestamps of retained successful posts on `channel`.
    pub fn success_times(&self, channel: Channel) -> Vec<DateTime<Utc>> {
        self.state
            .read(|state| state.successes(channel).map(|r| *r.posted_at()).collect())
    }
}

/// Apply one terminal outcome to `state`.
pub(crate) fn apply_outcome(
    state: &mut EngineState,
    channel: Channel,
    content_id: ContentId,
    outcome: &PostOutcome,
    now: DateTime<Utc>,
    history_limit: usize,
) -> PostRecord {
    let today = now.date_naive();
    let record = PostRecord::from_outcome(channel, content_id.clone(), outcome, now);

    match outcome {
        PostOutcome::Published { .. } => {
            let counters = state.channel_state_mut(channel, today);
            counters.roll_day(today);
            counters.posts_today += 1;
            counters.total_posts += 1;
            counters.last_rotation_index += 1;
            counters.last_post_at = Some(now);
            state.posted.entry(channel).or_default().insert(content_id);
        }
        PostOutcome::Failed {
            class: FailureClass::Permanent,
            ..
        } => {
            state.rejected.entry(channel).or_default().insert(content_id);
        }
        PostOutcome::Failed { .. } => {}
    }

    state.push_history(record.clone(), history_limit);
    record
}
