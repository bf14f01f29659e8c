//! Versioned persisted snapshot.

use crate::{
    Channel, ChannelState, ContentId, EngagementRecord, ExternalRef, PostRecord, QueueEntry,
    ScheduledAction,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, VecDeque};

/// Current persisted layout version.
pub const STATE_VERSION: u32 = 2;

/// Everything the engine owns, serialized as one document.
///
/// Every field defaults, so an older file missing newer fields still loads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineState {
    /// Layout version.
    pub version: u32,
    /// Per-channel counters.
    pub channel_states: BTreeMap<Channel, ChannelState>,
    /// Bounded ring of recent post records, oldest first.
    pub post_history: VecDeque<PostRecord>,
    /// Content successfully published per channel. Survives ring trimming.
    pub posted: BTreeMap<Channel, BTreeSet<ContentId>>,
    /// Content permanently refused per channel. Never re-attempted.
    pub rejected: BTreeMap<Channel, BTreeSet<ContentId>>,
    /// Rotation queue per channel, in insertion order.
    pub queue_entries: BTreeMap<Channel, Vec<QueueEntry>>,
    /// Engagement tracking per channel, keyed by external reference.
    pub engagement_records: BTreeMap<Channel, BTreeMap<ExternalRef, EngagementRecord>>,
    /// Durable pending dispatches and replies.
    pub pending: Vec<ScheduledAction>,
}

impl Default for EngineState {
    fn default() -> Self {
        Self {
            version: STATE_VERSION,
            channel_states: BTreeMap::new(),
            post_history: VecDeque::new(),
            posted: BTreeMap::new(),
            rejected: BTreeMap::new(),
            queue_entries: BTreeMap::new(),
            engagement_records: BTreeMap::new(),
            pending: Vec::new(),
        }
    }
}

impl EngineState {
    /// Counters for a channel, created on first access.
    pub fn channel_state_mut(&mut self, channel: Channel, today: NaiveDate) -> &mut ChannelState {
        self.channel_states
            .entry(channel)
            .or_insert_with(|| ChannelState::new(today))
    }

    /// Append a record, dropping the oldest beyond `limit`.
    pub fn push_history(&mut self, record: PostRecord, limit: usize) {
        self.post_history.push_back(record);
        while self.post_history.len() > limit.max(1) {
            self.post_history.pop_front();
        }
    }

    /// Whether a successful post exists for the pair.
    pub fn was_posted(&self, channel: Channel, content_id: &ContentId) -> bool {
        self.posted
            .get(&channel)
            .is_some_and(|ids| ids.contains(content_id))
    }

    /// Whether the pair failed permanently before.
    pub fn was_rejected(&self, channel: Channel, content_id: &ContentId) -> bool {
        self.rejected
            .get(&channel)
            .is_some_and(|ids| ids.contains(content_id))
    }

    /// Engagement record of an item published on `channel`.
    pub fn engagement_record(
        &self,
        channel: Channel,
        external_ref: &ExternalRef,
    ) -> Option<&EngagementRecord> {
        self.engagement_records
            .get(&channel)
            .and_then(|records| records.get(external_ref))
    }

    /// Mutable engagement record of an item published on `channel`.
    pub fn engagement_record_mut(
        &mut self,
        channel: Channel,
        external_ref: &ExternalRef,
    ) -> Option<&mut EngagementRecord> {
        self.engagement_records
            .get_mut(&channel)
            .and_then(|records| records.get_mut(external_ref))
    }

    /// Every engagement record, grouped by channel.
    pub fn engagement(&self) -> impl Iterator<Item = &EngagementRecord> {
        self.engagement_records.values().flat_map(BTreeMap::values)
    }

    /// Successful records for a channel, oldest first.
    pub fn successes(&self, channel: Channel) -> impl Iterator<Item = &PostRecord> {
        self.post_history
            .iter()
            .filter(move |r| *r.channel() == channel && *r.success())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::PostOutcome;
    use chrono::Utc;

    #[test]
    fn test_history_ring_is_bounded() {
        let mut state = EngineState::default();
        for i in 0..5 {
            let outcome = PostOutcome::Published {
                external_ref: format!("ref-{}", i).into(),
                attempts: 1,
            };
            let record = PostRecord::from_outcome(
                Channel::Reddit,
                ContentId::new(format!("c{}", i)),
                &outcome,
                Utc::now(),
            );
            state.push_history(record, 3);
        }
        assert_eq!(state.post_history.len(), 3);
        assert_eq!(state.post_history[0].content_id().as_str(), "c2");
    }

    #[test]
    fn test_engagement_records_are_scoped_by_channel() {
        let now = Utc::now();
        let mut state = EngineState::default();
        let shared = ExternalRef::from("1001");
        for (channel, content) in [(Channel::Reddit, "mug"), (Channel::Twitter, "tee")] {
            state.engagement_records.entry(channel).or_default().insert(
                shared.clone(),
                EngagementRecord::new(shared.clone(), channel, ContentId::new(content), now),
            );
        }

        assert_eq!(state.engagement().count(), 2);
        let twitter = state.engagement_record(Channel::Twitter, &shared).unwrap();
        assert_eq!(twitter.content_id.as_str(), "tee");
        assert!(state.engagement_record(Channel::Pinterest, &shared).is_none());

        let json = serde_json::to_string(&state).unwrap();
        let restored: EngineState = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, state);
    }

    #[test]
    fn test_missing_fields_default() {
        let state: EngineState = serde_json::from_str(r#"{"version": 2}"#).unwrap();
        assert_eq!(state, EngineState::default());
    }
}
