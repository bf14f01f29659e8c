//! Rate limiting and retry policy for the Barker posting engine.
//!
//! This crate decides whether a channel may post right now and how a failed
//! publish is recovered:
//!
//! - [`ChannelLimits`] / [`check_admission`]: per-channel daily ceilings and
//!   minimum spacing between posts
//! - [`classify`]: transient vs permanent failures
//! - [`RetryPolicy`]: bounded exponential backoff, executed through `tokio-retry2`
//! - [`ApiThrottle`]: GCRA throttle on adapter calls, backed by `governor`

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod classify;
mod limiter;
mod retry;
mod throttle;

pub use classify::classify;
pub use limiter::{Admission, ChannelLimits, ChannelLimitsBuilder, can_dispatch, check_admission};
pub use retry::{RetryOutcome, RetryPolicy, RetryPolicyBuilder};
pub use throttle::ApiThrottle;
