//! Boundary traits for the Barker posting engine.
//!
//! The engine never talks to a social platform, a catalog, or a disk
//! directly. It consumes these narrow interfaces instead:
//!
//! - [`ChannelAdapter`]: publish, fetch feedback, reply
//! - [`ContentSource`]: list content eligible for a channel
//! - [`StateStore`]: load and save the persisted snapshot
//! - [`Clock`]: current time, swappable for tests

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod adapter;
mod clock;
mod source;
mod store;

pub use adapter::{ChannelAdapter, ChannelResult};
pub use clock::{Clock, ManualClock, SystemClock};
pub use source::ContentSource;
pub use store::StateStore;
