//! Ledger entries and per-channel counters.

use crate::{Channel, ContentId, ExternalRef};
use chrono::{DateTime, NaiveDate, Utc};
use derive_getters::Getters;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Retry classification of a failed publish.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum FailureClass {
    /// Retryable (network blips, generic rate limits, unknown failures).
    Transient,
    /// Never retried (duplicate content, banned account, rejected content).
    Permanent,
}

/// Terminal result of a publish attempt, as recorded in the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PostOutcome {
    /// The channel accepted the post.
    Published {
        /// Channel-assigned reference.
        external_ref: ExternalRef,
        /// Attempts it took, starting at 1.
        attempts: u32,
    },
    /// The post was not accepted.
    Failed {
        /// Rendered error message.
        error: String,
        /// How the failure was classified.
        class: FailureClass,
        /// Attempts made before giving up.
        attempts: u32,
    },
}

impl PostOutcome {
    /// Whether the outcome is a success.
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Published { .. })
    }

    /// Number of attempts behind this outcome.
    pub fn attempts(&self) -> u32 {
        match self {
            Self::Published { attempts, .. } | Self::Failed { attempts, .. } => *attempts,
        }
    }
}

/// Immutable history entry for a publish attempt.
#[derive(Debug, Clone, PartialEq, Eq, Getters, Serialize, Deserialize)]
pub struct PostRecord {
    /// Unique record id.
    id: Uuid,
    /// Destination channel.
    channel: Channel,
    /// Published content.
    content_id: ContentId,
    /// When the outcome was recorded.
    posted_at: DateTime<Utc>,
    /// Whether the channel accepted the post.
    success: bool,
    /// Error message on failure.
    #[serde(default)]
    error: Option<String>,
    /// Failure classification on failure.
    #[serde(default)]
    classification: Option<FailureClass>,
    /// Channel-assigned reference on success.
    #[serde(default)]
    external_ref: Option<ExternalRef>,
    /// Attempts behind the outcome.
    #[serde(default = "default_attempts")]
    attempts: u32,
}

fn default_attempts() -> u32 {
    1
}

impl PostRecord {
    /// Build a record from a terminal outcome.
    pub fn from_outcome(
        channel: Channel,
        content_id: ContentId,
        outcome: &PostOutcome,
        posted_at: DateTime<Utc>,
    ) -> Self {
        let (success, error, classification, external_ref) = match outcome {
            PostOutcome::Published { external_ref, .. } => {
                (true, None, None, Some(external_ref.clone()))
            }
            PostOutcome::Failed { error, class, .. } => {
                (false, Some(error.clone()), Some(*class), None)
            }
        };

        Self {
            id: Uuid::new_v4(),
            channel,
            content_id,
            posted_at,
            success,
            error,
            classification,
            external_ref,
            attempts: outcome.attempts(),
        }
    }

    /// Whether this record is a permanent failure.
    pub fn is_permanent_failure(&self) -> bool {
        !self.success && self.classification == Some(FailureClass::Permanent)
    }
}

/// Per-channel counters, mutated only by the post ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelState {
    /// Number of successful rotations so far.
    pub last_rotation_index: u64,
    /// Successful posts on `day_boundary`.
    pub posts_today: u32,
    /// Calendar day (UTC) that `posts_today` counts.
    pub day_boundary: NaiveDate,
    /// Successful posts ever.
    pub total_posts: u64,
    /// When the last successful post landed.
    #[serde(default)]
    pub last_post_at: Option<DateTime<Utc>>,
}

impl ChannelState {
    /// Fresh counters for a channel first seen on `today`.
    pub fn new(today: NaiveDate) -> Self {
        Self {
            last_rotation_index: 0,
            posts_today: 0,
            day_boundary: today,
            total_posts: 0,
            last_post_at: None,
        }
    }

    /// Reset the daily counter when the date has advanced past the boundary.
    ///
    /// Returns `true` when a reset happened. A clock that moves backwards never
    /// resets the counter.
    pub fn roll_day(&mut self, today: NaiveDate) -> bool {
        if today > self.day_boundary {
            self.posts_today = 0;
            self.day_boundary = today;
            true
        } else {
            false
        }
    }
}
