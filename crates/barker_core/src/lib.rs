//! Core data model for the Barker posting automation engine.
//!
//! These types are shared by every other crate in the workspace:
//!
//! - **Content**: [`ContentItem`] and its stable [`ContentId`]
//! - **Ledger**: [`ChannelState`], [`PostRecord`], [`PostOutcome`]
//! - **Rotation**: [`QueueEntry`]
//! - **Scheduling**: [`ScheduleWindow`], [`ScheduledAction`]
//! - **Engagement**: [`EngagementRecord`], [`FeedbackItem`]
//! - **Persistence**: [`EngineState`], the versioned snapshot written to disk

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod channel;
mod content;
mod engagement;
mod post;
mod queue;
mod schedule;
mod state;
mod window;

pub use channel::{Channel, ExternalRef};
pub use content::{ContentId, ContentItem};
pub use engagement::{
    EngagementMetrics, EngagementRecord, FeedbackDisposition, FeedbackItem,
};
pub use post::{ChannelState, FailureClass, PostOutcome, PostRecord};
pub use queue::QueueEntry;
pub use schedule::{ActionKind, ScheduledAction};
pub use state::{EngineState, STATE_VERSION};
pub use window::ScheduleWindow;
