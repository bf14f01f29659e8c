//! Engagement tracking for published items.

use crate::{Channel, ContentId, ExternalRef};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Inbound feedback (a comment, reply, or answer) on a published item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedbackItem {
    /// Channel-assigned feedback id.
    pub id: String,
    /// Author handle, when the channel exposes it.
    #[serde(default)]
    pub author: Option<String>,
    /// Feedback body.
    pub text: String,
}

impl FeedbackItem {
    /// Create a feedback item.
    pub fn new(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            author: None,
            text: text.into(),
        }
    }
}

/// Aggregate metrics reported by a channel for a published item.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngagementMetrics {
    /// Views or impressions.
    pub impressions: u64,
    /// Likes, votes, shares, comments.
    pub engagements: u64,
}

/// What the engagement monitor decided for a feedback item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum FeedbackDisposition {
    /// Matched the blacklist.
    Spam,
    /// Lost the reply probability draw.
    Skipped,
    /// Would have replied but the hourly ceiling was reached.
    CapReached,
    /// Reply accepted and waiting for its delay.
    ReplyScheduled {
        /// When the decision was made.
        decided_at: DateTime<Utc>,
        /// When the reply is due.
        fire_at: DateTime<Utc>,
    },
    /// Reply sent.
    Replied {
        /// When the decision was made.
        decided_at: DateTime<Utc>,
        /// When the reply went out.
        sent_at: DateTime<Utc>,
    },
    /// Reply attempted and refused by the channel.
    ReplyFailed {
        /// When the decision was made.
        decided_at: DateTime<Utc>,
        /// Rendered error.
        error: String,
    },
}

impl FeedbackDisposition {
    /// When a reply decision was made, for reply-bearing dispositions.
    pub fn reply_decided_at(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::ReplyScheduled { decided_at, .. }
            | Self::Replied { decided_at, .. }
            | Self::ReplyFailed { decided_at, .. } => Some(*decided_at),
            _ => None,
        }
    }
}

/// Engagement state of one published item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngagementRecord {
    /// Channel-assigned reference of the published item.
    pub external_ref: ExternalRef,
    /// Channel it was published to.
    pub channel: Channel,
    /// Content that was published.
    pub content_id: ContentId,
    /// Latest impression count.
    #[serde(default)]
    pub impressions: u64,
    /// Latest engagement count.
    #[serde(default)]
    pub engagement_count: u64,
    /// Every feedback item seen, keyed by feedback id.
    #[serde(default)]
    pub feedback: BTreeMap<String, FeedbackDisposition>,
    /// When tracking began.
    pub tracking_started_at: DateTime<Utc>,
    /// When feedback was last polled.
    #[serde(default)]
    pub last_polled_at: Option<DateTime<Utc>>,
}

impl EngagementRecord {
    /// Start tracking a freshly published item.
    pub fn new(
        external_ref: ExternalRef,
        channel: Channel,
        content_id: ContentId,
        tracking_started_at: DateTime<Utc>,
    ) -> Self {
        Self {
            external_ref,
            channel,
            content_id,
            impressions: 0,
            engagement_count: 0,
            feedback: BTreeMap::new(),
            tracking_started_at,
            last_polled_at: None,
        }
    }

    /// Feedback ids that received a reply.
    pub fn replied_comment_ids(&self) -> BTreeSet<&str> {
        self.feedback
            .iter()
            .filter(|(_, d)| matches!(d, FeedbackDisposition::Replied { .. }))
            .map(|(id, _)| id.as_str())
            .collect()
    }
}
