//! Structured engine events.
//!
//! Every event is logged through `tracing` with an `event` field naming it and
//! broadcast to subscribers. A lagging or absent subscriber never blocks the
//! engine.

use crate::PatternReport;
use barker_core::{Channel, ContentId, ExternalRef, FailureClass};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::broadcast;
use tracing::{info, warn};

/// Why a dispatch did not reach the adapter.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, strum::Display, strum::AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SkipReason {
    /// The window's Bernoulli draw said no.
    ProbabilityDraw,
    /// The channel has used its daily cap.
    DailyCapReached,
    /// The previous post is too recent.
    MinIntervalNotElapsed,
    /// No eligible content is left.
    QueueExhausted,
    /// The channel was disabled.
    ChannelDisabled,
}

/// Observable engine occurrences.
#[derive(Debug, Clone, PartialEq, Serialize, strum::IntoStaticStr)]
#[serde(tag = "event", rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum EngineEvent {
    /// A dispatch instant was chosen and persisted.
    DispatchScheduled {
        /// Channel
        channel: Channel,
        /// Window name
        window: String,
        /// Planned instant
        fire_at: DateTime<Utc>,
    },
    /// A dispatch was skipped.
    DispatchSkipped {
        /// Channel
        channel: Channel,
        /// Why
        reason: SkipReason,
    },
    /// A dispatch fired and will try to publish.
    DispatchFired {
        /// Channel
        channel: Channel,
        /// Window name, when fired by the scheduler
        window: Option<String>,
    },
    /// Content was published.
    PublishSucceeded {
        /// Channel
        channel: Channel,
        /// Published content
        content_id: ContentId,
        /// Channel-assigned reference
        external_ref: ExternalRef,
        /// Attempts made
        attempts: u32,
    },
    /// Publishing failed terminally.
    PublishFailed {
        /// Channel
        channel: Channel,
        /// Content that failed
        content_id: ContentId,
        /// Transient (retries exhausted) or permanent
        classification: FailureClass,
        /// Attempts made
        attempts: u32,
        /// Final error
        error: String,
    },
    /// Post gaps on a channel look machine-regular.
    PatternSuspicious {
        /// Channel
        channel: Channel,
        /// Audit result
        report: PatternReport,
    },
    /// A reply was accepted and scheduled.
    ReplyScheduled {
        /// Channel
        channel: Channel,
        /// Item the feedback belongs to
        external_ref: ExternalRef,
        /// Feedback being answered
        feedback_id: String,
        /// Planned send time
        fire_at: DateTime<Utc>,
    },
    /// A reply was delivered.
    ReplySent {
        /// Channel
        channel: Channel,
        /// Item the feedback belongs to
        external_ref: ExternalRef,
        /// Feedback answered
        feedback_id: String,
    },
    /// A reply could not be delivered.
    ReplyFailed {
        /// Channel
        channel: Channel,
        /// Item the feedback belongs to
        external_ref: ExternalRef,
        /// Feedback that was not answered
        feedback_id: String,
        /// Adapter error
        error: String,
    },
    /// Persisted state was unreadable and the engine started fresh.
    StateRecovered {
        /// Load failure
        reason: String,
        /// Where the unreadable document was moved
        quarantined_to: Option<String>,
    },
}

impl EngineEvent {
    /// Stable snake_case name.
    pub fn name(&self) -> &'static str {
        self.into()
    }

    /// Write the event to the log.
    pub fn log(&self) {
        let event = self.name();
        match self {
            Self::DispatchScheduled {
                channel,
                window,
                fire_at,
            } => info!(event, %channel, window, %fire_at, "Dispatch scheduled"),
            Self::DispatchSkipped { channel, reason } => {
                info!(event, %channel, %reason, "Dispatch skipped")
            }
            Self::DispatchFired { channel, window } => {
                info!(event, %channel, window = window.as_deref().unwrap_or("manual"), "Dispatch fired")
            }
            Self::PublishSucceeded {
                channel,
                content_id,
                external_ref,
                attempts,
            } => info!(event, %channel, %content_id, %external_ref, attempts, "Publish succeeded"),
            Self::PublishFailed {
                channel,
                content_id,
                classification,
                attempts,
                error,
            } => warn!(
                event,
                %channel,
                %content_id,
                %classification,
                attempts,
                error,
                "Publish failed"
            ),
            Self::PatternSuspicious { channel, report } => warn!(
                event,
                %channel,
                mean_gap_hours = report.mean_gap_hours,
                variance_hours = report.variance_hours,
                sample_size = report.sample_size,
                "Dispatch gaps look periodic"
            ),
            Self::ReplyScheduled {
                channel,
                external_ref,
                feedback_id,
                fire_at,
            } => info!(event, %channel, %external_ref, feedback_id, %fire_at, "Reply scheduled"),
            Self::ReplySent {
                channel,
                external_ref,
                feedback_id,
            } => info!(event, %channel, %external_ref, feedback_id, "Reply sent"),
            Self::ReplyFailed {
                channel,
                external_ref,
                feedback_id,
                error,
            } => warn!(event, %channel, %external_ref, feedback_id, error, "Reply failed"),
            Self::StateRecovered {
                reason,
                quarantined_to,
            } => warn!(
                event,
                reason,
                quarantined_to = quarantined_to.as_deref().unwrap_or("-"),
                "Started with fresh state"
            ),
        }
    }
}

/// Fan-out of engine events.
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<EngineEvent>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}

impl EventBus {
    /// Bus retaining up to `capacity` unread events per subscriber.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// New receiver for events emitted from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.sender.subscribe()
    }

    /// Log and broadcast.
    pub fn emit(&self, event: EngineEvent) {
        event.log();
        // No subscribers is fine.
        let _ = self.sender.send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_names() {
        let event = EngineEvent::DispatchSkipped {
            channel: Channel::Reddit,
            reason: SkipReason::DailyCapReached,
        };
        assert_eq!(event.name(), "dispatch_skipped");
        assert_eq!(SkipReason::MinIntervalNotElapsed.to_string(), "min_interval_not_elapsed");

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "dispatch_skipped");
        assert_eq!(json["reason"], "daily_cap_reached");
    }

    #[tokio::test]
    async fn test_emit_reaches_subscribers() {
        let bus = EventBus::default();
        let mut rx = bus.subscribe();
        bus.emit(EngineEvent::DispatchFired {
            channel: Channel::Tumblr,
            window: None,
        });
        let got = rx.recv().await.unwrap();
        assert_eq!(got.name(), "dispatch_fired");
    }

    #[test]
    fn test_emit_without_subscribers() {
        EventBus::new(4).emit(EngineEvent::StateRecovered {
            reason: "truncated".into(),
            quarantined_to: None,
        });
    }
}
