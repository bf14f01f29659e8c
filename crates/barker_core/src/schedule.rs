//! Durable pending actions.

use crate::{Channel, ExternalRef};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// What a pending action does when it fires.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ActionKind {
    /// Run a dispatch for the channel inside the named window.
    Dispatch {
        /// Window the instant was drawn from.
        window: String,
        /// End of that window occurrence; the next plan starts after it.
        window_end: DateTime<Utc>,
    },
    /// Send a reply to a feedback item.
    Reply {
        /// Published item the feedback belongs to.
        external_ref: ExternalRef,
        /// Feedback item being answered.
        feedback_id: String,
        /// Reply body.
        text: String,
    },
}

/// An action whose intended fire time survives restarts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduledAction {
    /// Unique id used for cancellation.
    pub id: Uuid,
    /// Channel the action belongs to.
    pub channel: Channel,
    /// Intended fire time.
    pub fire_at: DateTime<Utc>,
    /// Payload.
    pub kind: ActionKind,
}

impl ScheduledAction {
    /// Create a new pending action.
    pub fn new(channel: Channel, fire_at: DateTime<Utc>, kind: ActionKind) -> Self {
        Self {
            id: Uuid::new_v4(),
            channel,
            fire_at,
            kind,
        }
    }

    /// Whether this is a dispatch.
    pub fn is_dispatch(&self) -> bool {
        matches!(self.kind, ActionKind::Dispatch { .. })
    }

    /// Whether this is a reply.
    pub fn is_reply(&self) -> bool {
        matches!(self.kind, ActionKind::Reply { .. })
    }
}
