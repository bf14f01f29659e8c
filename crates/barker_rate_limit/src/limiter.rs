//! Per-channel posting ceilings.

use barker_core::ChannelState;
use chrono::{DateTime, Duration, Utc};
use derive_getters::Getters;
use serde::{Deserialize, Serialize};

/// Posting limits for one channel.
#[derive(Debug, Clone, PartialEq, Eq, Getters, Serialize, Deserialize, derive_builder::Builder)]
#[builder(setter(into))]
pub struct ChannelLimits {
    /// Maximum successful posts per calendar day.
    daily_cap: u32,
    /// Minimum minutes between successful posts.
    #[builder(default)]
    #[serde(default)]
    min_interval_minutes: u32,
}

impl ChannelLimits {
    /// Limits with only a daily cap.
    pub fn daily(daily_cap: u32) -> Self {
        Self {
            daily_cap,
            min_interval_minutes: 0,
        }
    }
}

/// Whether a dispatch may proceed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// Below every ceiling.
    Allowed,
    /// The daily cap is reached.
    DailyCapReached {
        /// Posts counted today.
        posts_today: u32,
        /// Configured cap.
        cap: u32,
    },
    /// The last post is too recent.
    MinIntervalNotElapsed {
        /// Earliest instant the next post is allowed.
        next_allowed_at: DateTime<Utc>,
    },
}

impl Admission {
    /// Whether the dispatch may proceed.
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allowed)
    }
}

/// Check a channel's counters against its limits.
///
/// Counters from an earlier day count as zero, so the check is correct even
/// before the ledger has rolled the day over.
pub fn check_admission(limits: &ChannelLimits, state: &ChannelState, now: DateTime<Utc>) -> Admission {
    let posts_today = if now.date_naive() > state.day_boundary {
        0
    } else {
        state.posts_today
    };

    if posts_today >= limits.daily_cap {
        return Admission::DailyCapReached {
            posts_today,
            cap: limits.daily_cap,
        };
    }

    if limits.min_interval_minutes > 0
        && let Some(last) = state.last_post_at
    {
        let next_allowed_at = last + Duration::minutes(i64::from(limits.min_interval_minutes));
        if now < next_allowed_at {
            return Admission::MinIntervalNotElapsed { next_allowed_at };
        }
    }

    Admission::Allowed
}

/// `posts_today < daily_cap`, after accounting for a day rollover.
pub fn can_dispatch(limits: &ChannelLimits, state: &ChannelState, now: DateTime<Utc>) -> bool {
    !matches!(
        check_admission(&ChannelLimits::daily(limits.daily_cap), state, now),
        Admission::DailyCapReached { .. }
    )
}
