//! Engagement monitor.
//!
//! Tracks published items, filters their feedback, and turns a capped,
//! randomized share of it into delayed replies. Every decision is stored on
//! the item's [`EngagementRecord`], so statistics and the hourly reply cap
//! are recomputed from persisted state instead of kept in counters.

use crate::EngagementConfig;
use barker_core::{
    ActionKind, Channel, ContentId, EngagementMetrics, EngagementRecord, EngineState,
    ExternalRef, FeedbackDisposition, FeedbackItem, ScheduledAction,
};
use barker_error::{BarkerResult, ChannelError, EngineError, EngineErrorKind};
use barker_interface::{ChannelAdapter, Clock};
use barker_rate_limit::ApiThrottle;
use barker_storage::StateHandle;
use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use rand::Rng;
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, instrument};

/// Aggregate reply statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct EngagementStats {
    /// Feedback items answered.
    pub replied_count: usize,
    /// Feedback items seen.
    pub total_count: usize,
    /// Feedback items dropped as spam.
    pub spam_filtered: usize,
    /// `replied / (total - spam)`, zero when nothing non-spam was seen.
    pub reply_rate: f64,
}

impl EngagementStats {
    /// Aggregate over `records`.
    pub fn from_records<'a>(records: impl IntoIterator<Item = &'a EngagementRecord>) -> Self {
        let mut stats = Self::default();
        for record in records {
            for disposition in record.feedback.values() {
                stats.total_count += 1;
                match disposition {
                    FeedbackDisposition::Spam => stats.spam_filtered += 1,
                    FeedbackDisposition::Replied { .. } => stats.replied_count += 1,
                    _ => {}
                }
            }
        }
        let candidates = stats.total_count - stats.spam_filtered;
        if candidates > 0 {
            stats.reply_rate = stats.replied_count as f64 / candidates as f64;
        }
        stats
    }
}

/// What one call to [`EngagementMonitor::process_feedback`] decided.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeedbackSummary {
    /// Items not seen before.
    pub new_items: usize,
    /// New items dropped as spam.
    pub spam: usize,
    /// New items passed over by the probability draw.
    pub skipped: usize,
    /// New items refused by the hourly cap.
    pub cap_reached: usize,
    /// Replies scheduled, already persisted.
    pub scheduled: Vec<ScheduledAction>,
}

/// Case-insensitive substring match against `blacklist`.
pub fn is_spam(text: &str, blacklist: &[String]) -> bool {
    let text = text.to_lowercase();
    blacklist
        .iter()
        .filter(|word| !word.is_empty())
        .any(|word| text.contains(&word.to_lowercase()))
}

/// Reply decisions on `channel` in the hour before `now`.
pub fn replies_in_last_hour(state: &EngineState, channel: Channel, now: DateTime<Utc>) -> usize {
    let since = now - Duration::hours(1);
    state
        .engagement_records
        .get(&channel)
        .into_iter()
        .flat_map(|records| records.values())
        .flat_map(|record| record.feedback.values())
        .filter_map(FeedbackDisposition::reply_decided_at)
        .filter(|decided| *decided > since && *decided <= now)
        .count()
}

/// Feedback poller and reply scheduler.
#[derive(Debug, Clone)]
pub struct EngagementMonitor {
    state: StateHandle,
    clock: Arc<dyn Clock>,
    config: EngagementConfig,
    rng: Arc<Mutex<StdRng>>,
}

impl EngagementMonitor {
    /// Monitor over `state`, drawing randomness from `rng`.
    pub fn new(
        state: StateHandle,
        clock: Arc<dyn Clock>,
        config: EngagementConfig,
        rng: Arc<Mutex<StdRng>>,
    ) -> Self {
        Self {
            state,
            clock,
            config,
            rng,
        }
    }

    /// Settings in use.
    pub fn config(&self) -> &EngagementConfig {
        &self.config
    }

    /// Start tracking a published item. Tracking an item twice is a no-op.
    ///
    /// The engine's poller picks tracked items up on its next round and keeps
    /// polling them until they leave the retention window.
    ///
    /// # Errors
    ///
    /// Returns error if state cannot be persisted.
    #[instrument(skip(self))]
    pub async fn track_item(
        &self,
        channel: Channel,
        external_ref: ExternalRef,
        content_id: ContentId,
    ) -> BarkerResult<()> {
        let now = self.clock.now();
        self.state
            .update(|state| start_tracking(state, channel, external_ref, content_id, now))
            .await?;
        Ok(())
    }

    /// Whether `external_ref` on `channel` is tracked.
    pub fn is_tracked(&self, channel: Channel, external_ref: &ExternalRef) -> bool {
        self.state
            .read(|state| state.engagement_record(channel, external_ref).is_some())
    }

    /// Record for `external_ref` on `channel`.
    pub fn record(&self, channel: Channel, external_ref: &ExternalRef) -> Option<EngagementRecord> {
        self.state
            .read(|state| state.engagement_record(channel, external_ref).cloned())
    }

    /// Tracked items still inside the retention window.
    pub fn tracked(&self) -> Vec<(ExternalRef, Channel)> {
        let cutoff = self.retention_cutoff();
        self.state.read(|state| {
            state
                .engagement()
                .filter(|r| r.tracking_started_at >= cutoff)
                .map(|r| (r.external_ref.clone(), r.channel))
                .collect()
        })
    }

    /// Filter and decide on feedback for a tracked item.
    ///
    /// Items already decided are ignored. Spam never counts toward the reply
    /// cap. Accepted replies are persisted as pending actions in the same
    /// state mutation that records the decision.
    ///
    /// # Errors
    ///
    /// Returns error if the item is not tracked or state cannot be persisted.
    #[instrument(skip(self, items), fields(count = items.len()))]
    pub async fn process_feedback(
        &self,
        channel: Channel,
        external_ref: &ExternalRef,
        items: &[FeedbackItem],
    ) -> BarkerResult<FeedbackSummary> {
        let now = self.clock.now();
        let config = &self.config;
        let rng = &self.rng;

        self.state
            .try_update(|state| -> BarkerResult<FeedbackSummary> {
                if state.engagement_record(channel, external_ref).is_none() {
                    return Err(EngineError::new(EngineErrorKind::NotTracked(format!(
                        "{channel}:{external_ref}"
                    )))
                    .into());
                }

                let mut summary = FeedbackSummary::default();
                let mut replies_this_hour = replies_in_last_hour(state, channel, now);
                let mut rng = rng.lock();

                for item in items {
                    let already_seen = state
                        .engagement_record(channel, external_ref)
                        .is_some_and(|r| r.feedback.contains_key(&item.id));
                    if already_seen {
                        continue;
                    }
                    summary.new_items += 1;

                    let disposition = if is_spam(&item.text, config.blacklist_words()) {
                        summary.spam += 1;
                        FeedbackDisposition::Spam
                    } else if replies_this_hour >= *config.max_replies_per_hour() as usize {
                        summary.cap_reached += 1;
                        FeedbackDisposition::CapReached
                    } else if !rng.gen_bool(config.reply_probability().clamp(0.0, 1.0)) {
                        summary.skipped += 1;
                        FeedbackDisposition::Skipped
                    } else {
                        replies_this_hour += 1;
                        let min = *config.reply_delay_min_minutes();
                        let max = (*config.reply_delay_max_minutes()).max(min);
                        let delay_secs = rng.gen_range(i64::from(min) * 60..=i64::from(max) * 60);
                        let fire_at = now + Duration::seconds(delay_secs);
                        let text = pick_template(config.reply_templates(), &mut *rng);

                        let action = ScheduledAction::new(
                            channel,
                            fire_at,
                            ActionKind::Reply {
                                external_ref: external_ref.clone(),
                                feedback_id: item.id.clone(),
                                text,
                            },
                        );
                        state.pending.push(action.clone());
                        summary.scheduled.push(action);
                        FeedbackDisposition::ReplyScheduled {
                            decided_at: now,
                            fire_at,
                        }
                    };

                    if let Some(record) = state.engagement_record_mut(channel, external_ref) {
                        record.feedback.insert(item.id.clone(), disposition);
                        record.last_polled_at = Some(now);
                    }
                }

                Ok(summary)
            })
            .await
    }

    /// Record the result of sending a scheduled reply and drop the action.
    ///
    /// # Errors
    ///
    /// Returns error if state cannot be persisted.
    #[instrument(skip(self, action, result), fields(id = %action.id))]
    pub async fn complete_reply(
        &self,
        action: &ScheduledAction,
        result: Result<(), &ChannelError>,
    ) -> BarkerResult<()> {
        let ActionKind::Reply {
            external_ref,
            feedback_id,
            ..
        } = &action.kind
        else {
            return Ok(());
        };
        let now = self.clock.now();
        let error = result.err().map(|e| e.to_string());

        self.state
            .update(|state| {
                state.pending.retain(|a| a.id != action.id);
                let Some(record) = state.engagement_record_mut(action.channel, external_ref) else {
                    return;
                };
                let decided_at = record
                    .feedback
                    .get(feedback_id)
                    .and_then(FeedbackDisposition::reply_decided_at)
                    .unwrap_or(now);
                let disposition = match error {
                    None => FeedbackDisposition::Replied {
                        decided_at,
                        sent_at: now,
                    },
                    Some(error) => FeedbackDisposition::ReplyFailed { decided_at, error },
                };
                record.feedback.insert(feedback_id.clone(), disposition);
            })
            .await?;
        Ok(())
    }

    /// Store fresh impression and engagement counts.
    ///
    /// # Errors
    ///
    /// Returns error if state cannot be persisted.
    pub async fn update_metrics(
        &self,
        channel: Channel,
        external_ref: &ExternalRef,
        metrics: EngagementMetrics,
    ) -> BarkerResult<()> {
        let now = self.clock.now();
        self.state
            .update(|state| {
                if let Some(record) = state.engagement_record_mut(channel, external_ref) {
                    record.impressions = metrics.impressions;
                    record.engagement_count = metrics.engagements;
                    record.last_polled_at = Some(now);
                }
            })
            .await?;
        Ok(())
    }

    /// Fetch feedback and metrics for one item and process them.
    ///
    /// Each adapter call waits on `throttle` first.
    ///
    /// # Errors
    ///
    /// Returns error if the adapter fails, the item is not tracked, or state
    /// cannot be persisted.
    #[instrument(skip(self, adapter, throttle))]
    pub async fn poll(
        &self,
        adapter: &dyn ChannelAdapter,
        throttle: &ApiThrottle,
        external_ref: &ExternalRef,
    ) -> BarkerResult<FeedbackSummary> {
        let channel = adapter.channel();

        throttle.acquire(channel).await;
        if let Some(metrics) = adapter.fetch_metrics(external_ref).await? {
            self.update_metrics(channel, external_ref, metrics).await?;
        }

        throttle.acquire(channel).await;
        let items = adapter.fetch_feedback(external_ref).await?;
        let summary = self.process_feedback(channel, external_ref, &items).await?;
        debug!(
            %channel,
            new_items = summary.new_items,
            spam = summary.spam,
            scheduled = summary.scheduled.len(),
            "Feedback polled"
        );
        Ok(summary)
    }

    /// Statistics over every tracked item, or one channel's.
    pub fn stats(&self, channel: Option<Channel>) -> EngagementStats {
        self.state.read(|state| {
            EngagementStats::from_records(
                state
                    .engagement()
                    .filter(|r| channel.is_none_or(|c| r.channel == c)),
            )
        })
    }

    /// Drop records older than the retention window, with their pending
    /// replies. Returns how many records were removed.
    ///
    /// # Errors
    ///
    /// Returns error if state cannot be persisted.
    #[instrument(skip(self))]
    pub async fn prune(&self) -> BarkerResult<usize> {
        let cutoff = self.retention_cutoff();
        let removed = self
            .state
            .update(|state| {
                let before = state.engagement().count();
                for records in state.engagement_records.values_mut() {
                    records.retain(|_, r| r.tracking_started_at >= cutoff);
                }
                state.engagement_records.retain(|_, records| !records.is_empty());
                let removed = before - state.engagement().count();
                let mut pending = std::mem::take(&mut state.pending);
                pending.retain(|action| match &action.kind {
                    ActionKind::Reply { external_ref, .. } => {
                        state.engagement_record(action.channel, external_ref).is_some()
                    }
                    ActionKind::Dispatch { .. } => true,
                });
                state.pending = pending;
                removed
            })
            .await?;
        if removed > 0 {
            debug!(removed, "Engagement records pruned");
        }
        Ok(removed)
    }

    fn retention_cutoff(&self) -> DateTime<Utc> {
        self.clock.now() - Duration::days(i64::from(*self.config.retention_days()))
    }
}

/// Create the engagement record for a fresh publish, if missing.
pub(crate) fn start_tracking(
    state: &mut EngineState,
    channel: Channel,
    external_ref: ExternalRef,
    content_id: ContentId,
    now: DateTime<Utc>,
) {
    state
        .engagement_records
        .entry(channel)
        .or_default()
        .entry(external_ref.clone())
        .or_insert_with(|| EngagementRecord::new(external_ref, channel, content_id, now));
}

fn pick_template(templates: &[String], rng: &mut StdRng) -> String {
    if templates.is_empty() {
        return "Thank you!".to_string();
    }
    templates[rng.gen_range(0..templates.len())].clone()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spam_filter_is_case_insensitive_substring() {
        let blacklist = vec!["Crypto".to_string(), "click here".to_string(), String::new()];
        assert!(is_spam("Earn CRYPTOcurrency now", &blacklist));
        assert!(is_spam("please CLICK HERE", &blacklist));
        assert!(!is_spam("Lovely mug, where can I buy it?", &blacklist));
    }

    #[test]
    fn test_stats_exclude_spam_from_rate() {
        let now = Utc::now();
        let mut record = EngagementRecord::new(
            ExternalRef::from("t3_1"),
            Channel::Reddit,
            ContentId::new("mug"),
            now,
        );
        record.feedback.insert("a".into(), FeedbackDisposition::Spam);
        record.feedback.insert(
            "b".into(),
            FeedbackDisposition::Replied {
                decided_at: now,
                sent_at: now,
            },
        );
        record.feedback.insert("c".into(), FeedbackDisposition::Skipped);
        record.feedback.insert("d".into(), FeedbackDisposition::Spam);

        let stats = EngagementStats::from_records([&record]);
        assert_eq!(stats.total_count, 4);
        assert_eq!(stats.spam_filtered, 2);
        assert_eq!(stats.replied_count, 1);
        assert!((stats.reply_rate - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_stats_all_spam_has_zero_rate() {
        let mut record = EngagementRecord::new(
            ExternalRef::from("t3_2"),
            Channel::Reddit,
            ContentId::new("tee"),
            Utc::now(),
        );
        record.feedback.insert("a".into(), FeedbackDisposition::Spam);
        let stats = EngagementStats::from_records([&record]);
        assert_eq!(stats.reply_rate, 0.0);
    }
}
