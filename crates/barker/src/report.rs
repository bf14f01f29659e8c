//! Read-only views over a persisted state document.

use barker_core::{Channel, EngineState};
use barker_engine::{EngineConfig, PatternReport, detect_pattern};
use barker_error::BarkerResult;
use barker_interface::StateStore;
use barker_storage::JsonFileStore;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeSet;
use std::path::Path;

/// Per-channel summary printed by `barker status`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChannelStatus {
    /// Channel
    pub channel: Channel,
    /// Whether the configuration enables it
    pub enabled: bool,
    /// Configured daily cap, if configured
    pub daily_cap: Option<u32>,
    /// Successful posts today (UTC)
    pub posts_today: u32,
    /// Successful posts ever
    pub total_posts: u64,
    /// Last successful post
    pub last_post_at: Option<DateTime<Utc>>,
    /// Next persisted dispatch
    pub next_dispatch_at: Option<DateTime<Utc>>,
    /// Entries in the rotation queue
    pub queued: usize,
    /// Content refused permanently
    pub rejected: usize,
    /// Replies waiting to be sent
    pub pending_replies: usize,
}

/// Load the state document at `path` without modifying it.
///
/// A missing document yields an empty state.
///
/// # Errors
///
/// Returns error if the document exists but cannot be read or decoded.
pub async fn load_snapshot(path: &Path) -> BarkerResult<EngineState> {
    let store = JsonFileStore::new(path);
    Ok(store.load_state().await?.unwrap_or_default())
}

fn known_channels(config: &EngineConfig, state: &EngineState) -> BTreeSet<Channel> {
    config
        .channels()
        .keys()
        .chain(state.channel_states.keys())
        .copied()
        .collect()
}

/// Status of every configured or previously used channel at `now`.
pub fn channel_status(
    config: &EngineConfig,
    state: &EngineState,
    now: DateTime<Utc>,
) -> Vec<ChannelStatus> {
    let today = now.date_naive();
    known_channels(config, state)
        .into_iter()
        .map(|channel| {
            let settings = config.channel(channel);
            let counters = state.channel_states.get(&channel);
            let pending = state.pending.iter().filter(|a| a.channel == channel);

            ChannelStatus {
                channel,
                enabled: settings.is_some_and(|s| *s.enabled()),
                daily_cap: settings.map(|s| *s.daily_cap()),
                posts_today: counters
                    .filter(|c| c.day_boundary >= today)
                    .map_or(0, |c| c.posts_today),
                total_posts: counters.map_or(0, |c| c.total_posts),
                last_post_at: counters.and_then(|c| c.last_post_at),
                next_dispatch_at: pending
                    .clone()
                    .filter(|a| a.is_dispatch())
                    .map(|a| a.fire_at)
                    .min(),
                queued: state.queue_entries.get(&channel).map_or(0, Vec::len),
                rejected: state.rejected.get(&channel).map_or(0, BTreeSet::len),
                pending_replies: pending.filter(|a| a.is_reply()).count(),
            }
        })
        .collect()
}

/// Gap audit for every known channel.
pub fn audit_channels(config: &EngineConfig, state: &EngineState) -> Vec<(Channel, PatternReport)> {
    known_channels(config, state)
        .into_iter()
        .map(|channel| {
            let times: Vec<_> = state.successes(channel).map(|r| *r.posted_at()).collect();
            (channel, detect_pattern(&times, config.pattern()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use barker_core::{ActionKind, ChannelState, ContentId, PostOutcome, PostRecord, ScheduledAction};
    use chrono::{Duration, TimeZone};

    fn noon() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 5, 10, 12, 0, 0).unwrap()
    }

    fn config() -> EngineConfig {
        EngineConfig::from_toml_str(
            r#"
[channels.reddit]
daily_cap = 4

[[channels.reddit.windows]]
name = "noon"
start = "11:00"
end = "13:00"
probability = 1.0
"#,
        )
        .unwrap()
    }

    #[test]
    fn test_stale_day_reports_zero_posts_today() {
        let mut state = EngineState::default();
        let yesterday = noon() - Duration::days(1);
        let mut counters = ChannelState::new(yesterday.date_naive());
        counters.posts_today = 3;
        counters.total_posts = 10;
        state.channel_states.insert(Channel::Reddit, counters);
        state.pending.push(ScheduledAction::new(
            Channel::Reddit,
            noon() + Duration::hours(1),
            ActionKind::Dispatch {
                window: "noon".into(),
                window_end: noon() + Duration::hours(1),
            },
        ));

        let status = channel_status(&config(), &state, noon());
        assert_eq!(status.len(), 1);
        assert_eq!(status[0].posts_today, 0);
        assert_eq!(status[0].total_posts, 10);
        assert_eq!(status[0].daily_cap, Some(4));
        assert_eq!(status[0].next_dispatch_at, Some(noon() + Duration::hours(1)));
        assert_eq!(status[0].pending_replies, 0);
    }

    #[test]
    fn test_unconfigured_channels_with_history_are_listed() {
        let mut state = EngineState::default();
        state
            .channel_states
            .insert(Channel::Tumblr, ChannelState::new(noon().date_naive()));

        let status = channel_status(&config(), &state, noon());
        let tumblr = status.iter().find(|s| s.channel == Channel::Tumblr).unwrap();
        assert!(!tumblr.enabled);
        assert_eq!(tumblr.daily_cap, None);
    }

    #[test]
    fn test_audit_flags_regular_gaps() {
        let mut state = EngineState::default();
        for i in 0..8 {
            let outcome = PostOutcome::Published {
                external_ref: format!("r{}", i).into(),
                attempts: 1,
            };
            let record = PostRecord::from_outcome(
                Channel::Reddit,
                ContentId::new(format!("c{}", i)),
                &outcome,
                noon() + Duration::hours(6 * i),
            );
            state.push_history(record, 100);
        }

        let reports = audit_channels(&config(), &state);
        let (_, report) = reports.iter().find(|(c, _)| *c == Channel::Reddit).unwrap();
        assert!(report.suspicious);
        assert_eq!(report.sample_size, 7);
    }

    #[tokio::test]
    async fn test_missing_snapshot_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let state = load_snapshot(&dir.path().join("absent.json")).await.unwrap();
        assert_eq!(state, EngineState::default());
    }
}
