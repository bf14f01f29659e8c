//! Posting engine for Barker.
//!
//! The engine decides *when* to post, *what* to post, and *how to react*:
//!
//! - [`PostLedger`]: append-only publish history and daily counters
//! - [`RotationQueue`]: deterministic content selection with cooldowns
//! - Window scheduling: [`next_dispatch_time`], [`should_dispatch`], [`detect_pattern`]
//! - [`EngagementMonitor`]: spam filtering and delayed, capped replies
//! - [`ActionSchedule`]: durable pending actions with cooperative cancellation
//! - [`Engine`]: per-channel tasks tying it all together
//!
//! Randomness is injected and time comes from a [`barker_interface::Clock`],
//! so every decision can be reproduced in tests.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod adapters;
mod config;
mod engagement;
mod engine;
mod events;
mod ledger;
mod rotation;
mod schedule;
mod window;

pub use adapters::{JsonContentSource, NoOpAdapter, StaticContentSource};
pub use config::{ChannelConfig, EngagementConfig, EngineConfig, PatternConfig, RotationConfig};
pub use engagement::{
    EngagementMonitor, EngagementStats, FeedbackSummary, is_spam, replies_in_last_hour,
};
pub use engine::{DispatchOutcome, Engine, EngineBuilder};
pub use events::{EngineEvent, EventBus, SkipReason};
pub use ledger::PostLedger;
pub use rotation::{RotationQueue, promote, score, select_index};
pub use schedule::{ActionSchedule, sleep_until};
pub use window::{PatternReport, PlannedDispatch, detect_pattern, next_dispatch_time, plan_next, should_dispatch};
