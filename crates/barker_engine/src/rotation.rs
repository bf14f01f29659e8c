//! Content rotation queue.
//!
//! Selection is a pure function of persisted entries and the current time:
//!
//! ```text
//! score = priority
//!       + new_arrival_bonus               (never promoted)
//!       - promotion_count × per_promotion_penalty
//!       - recency_penalty                 (promoted within cooldown_days)
//! ```
//!
//! The highest score wins; ties go to the lowest promotion count, then to
//! the earliest inserted entry.

use crate::RotationConfig;
use barker_core::{Channel, ContentId, ContentItem, EngineState, QueueEntry};
use barker_error::{BarkerResult, EngineError, EngineErrorKind};
use barker_interface::Clock;
use barker_storage::StateHandle;
use chrono::{DateTime, Utc};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, instrument};

/// Score of `entry` at `now`.
pub fn score(entry: &QueueEntry, now: DateTime<Utc>, config: &RotationConfig) -> i64 {
    let mut score = entry.priority;
    if entry.is_new_arrival {
        score += config.new_arrival_bonus();
    }
    score -= i64::from(entry.promotion_count) * config.per_promotion_penalty();
    if let Some(last) = entry.last_promoted_at
        && (now - last).num_days() < *config.cooldown_days()
    {
        score -= config.recency_penalty();
    }
    score
}

/// Index of the best entry that passes `admit`.
pub fn select_index(
    entries: &[QueueEntry],
    now: DateTime<Utc>,
    config: &RotationConfig,
    admit: impl Fn(&QueueEntry) -> bool,
) -> Option<usize> {
    let mut best: Option<(usize, i64, u32)> = None;
    for (index, entry) in entries.iter().enumerate() {
        if !admit(entry) {
            continue;
        }
        let candidate = score(entry, now, config);
        let better = match best {
            None => true,
            Some((_, top, count)) => {
                candidate > top || (candidate == top && entry.promotion_count < count)
            }
        };
        if better {
            best = Some((index, candidate, entry.promotion_count));
        }
    }
    best.map(|(index, _, _)| index)
}

/// Record a promotion on `entry`.
pub fn promote(entry: &mut QueueEntry, now: DateTime<Utc>, config: &RotationConfig) {
    entry.promotion_count += 1;
    entry.last_promoted_at = Some(now);
    entry.is_new_arrival = false;
    if entry.priority > *config.min_priority() {
        entry.priority = (entry.priority - config.priority_decay()).max(*config.min_priority());
    }
}

/// Append entries for eligible items the queue has not seen yet.
///
/// Returns how many were added.
pub(crate) fn sync_entries(
    entries: &mut Vec<QueueEntry>,
    eligible: &[ContentItem],
    base_priority: i64,
) -> usize {
    let known: BTreeSet<ContentId> = entries.iter().map(|e| e.product_id.clone()).collect();
    let before = entries.len();
    let mut seen = known;
    for item in eligible {
        if seen.insert(item.id().clone()) {
            entries.push(QueueEntry::new_arrival(item.id().clone(), base_priority));
        }
    }
    entries.len() - before
}

/// Pick and promote the next entry for `channel` inside a state mutation.
///
/// Only ids in `eligible` are considered, and ids already posted or rejected
/// on the channel are skipped.
pub(crate) fn claim_next(
    state: &mut EngineState,
    channel: Channel,
    eligible: &[ContentItem],
    now: DateTime<Utc>,
    config: &RotationConfig,
) -> Option<ContentItem> {
    let EngineState {
        queue_entries,
        posted,
        rejected,
        ..
    } = state;
    let entries = queue_entries.entry(channel).or_default();
    let added = sync_entries(entries, eligible, *config.base_priority());
    if added > 0 {
        debug!(%channel, added, "New arrivals queued");
    }

    let eligible_ids: BTreeSet<&ContentId> = eligible.iter().map(|i| i.id()).collect();
    let posted = posted.get(&channel);
    let rejected = rejected.get(&channel);
    let index = select_index(entries, now, config, |entry| {
        eligible_ids.contains(&entry.product_id)
            && !posted.is_some_and(|ids| ids.contains(&entry.product_id))
            && !rejected.is_some_and(|ids| ids.contains(&entry.product_id))
    })?;

    let entry = &mut entries[index];
    promote(entry, now, config);
    eligible.iter().find(|item| *item.id() == entry.product_id).cloned()
}

/// Persistent rotation queue, one list of entries per channel.
#[derive(Debug, Clone)]
pub struct RotationQueue {
    state: StateHandle,
    clock: Arc<dyn Clock>,
    config: RotationConfig,
}

impl RotationQueue {
    /// Queue over `state` scored with `config`.
    pub fn new(state: StateHandle, clock: Arc<dyn Clock>, config: RotationConfig) -> Self {
        Self {
            state,
            clock,
            config,
        }
    }

    /// Scoring weights in use.
    pub fn config(&self) -> &RotationConfig {
        &self.config
    }

    /// Highest-scoring entry for `channel`, excluding posted and rejected
    /// content. `None` means nothing is left to promote.
    pub fn select_next(&self, channel: Channel) -> Option<QueueEntry> {
        let now = self.clock.now();
        self.state.read(|state| {
            let entries = state.queue_entries.get(&channel)?;
            let index = select_index(entries, now, &self.config, |entry| {
                !state.was_posted(channel, &entry.product_id)
                    && !state.was_rejected(channel, &entry.product_id)
            })?;
            entries.get(index).cloned()
        })
    }

    /// Record a promotion of `product_id` on `channel`.
    ///
    /// # Errors
    ///
    /// Returns error if the entry is not queued or state cannot be persisted.
    #[instrument(skip(self))]
    pub async fn mark_promoted(&self, channel: Channel, product_id: &ContentId) -> BarkerResult<QueueEntry> {
        let now = self.clock.now();
        let config = self.config.clone();
        self.state
            .try_update(|state| -> BarkerResult<QueueEntry> {
                let entry = state
                    .queue_entries
                    .get_mut(&channel)
                    .and_then(|entries| entries.iter_mut().find(|e| e.product_id == *product_id))
                    .ok_or_else(|| {
                        EngineError::new(EngineErrorKind::ContentNotFound(format!(
                            "{} is not queued on {}",
                            product_id, channel
                        )))
                    })?;
                promote(entry, now, &config);
                Ok(entry.clone())
            })
            .await
    }

    /// Add externally prepared entries. Ids already queued are left alone.
    ///
    /// Returns how many entries were added.
    ///
    /// # Errors
    ///
    /// Returns error if state cannot be persisted.
    #[instrument(skip(self, entries), fields(count = entries.len()))]
    pub async fn seed(&self, channel: Channel, entries: Vec<QueueEntry>) -> BarkerResult<usize> {
        let added = self
            .state
            .update(|state| {
                let queue = state.queue_entries.entry(channel).or_default();
                let mut added = 0;
                for entry in entries {
                    if !queue.iter().any(|e| e.product_id == entry.product_id) {
                        queue.push(entry);
                        added += 1;
                    }
                }
                added
            })
            .await?;
        Ok(added)
    }

    /// Entries for `channel` in insertion order.
    pub fn entries(&self, channel: Channel) -> Vec<QueueEntry> {
        self.state
            .read(|state| state.queue_entries.get(&channel).cloned().unwrap_or_default())
    }
}
