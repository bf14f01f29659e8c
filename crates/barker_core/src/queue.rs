//! Rotation queue entries.

use crate::ContentId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A product or content unit competing for the next promotion slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueEntry {
    /// Identifier of the promoted unit.
    pub product_id: ContentId,
    /// Current base priority; decays with every promotion.
    pub priority: i64,
    /// How many times the entry has been promoted.
    #[serde(default)]
    pub promotion_count: u32,
    /// When the entry was last promoted.
    #[serde(default)]
    pub last_promoted_at: Option<DateTime<Utc>>,
    /// Whether the entry has never been promoted since it arrived.
    #[serde(default)]
    pub is_new_arrival: bool,
}

impl QueueEntry {
    /// A never-promoted entry.
    pub fn new_arrival(product_id: ContentId, priority: i64) -> Self {
        Self {
            product_id,
            priority,
            promotion_count: 0,
            last_promoted_at: None,
            is_new_arrival: true,
        }
    }
}
