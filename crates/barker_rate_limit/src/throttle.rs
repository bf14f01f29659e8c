//! Per-channel API request throttle.

use barker_core::Channel;
use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter as GovernorRateLimiter};
use std::collections::HashMap;
use std::num::NonZeroU32;
use std::sync::Arc;

type DirectLimiter = GovernorRateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Requests-per-minute throttle applied to every adapter call.
///
/// Channels without a configured limit are never delayed. The throttle is
/// independent of the daily posting cap: it protects the platform API, not
/// the audience.
///
/// # Example
///
/// ```
/// use barker_core::Channel;
/// use barker_rate_limit::ApiThrottle;
///
/// let throttle = ApiThrottle::new().with_limit(Channel::Reddit, 30);
/// assert!(throttle.is_limited(Channel::Reddit));
/// assert!(!throttle.is_limited(Channel::Twitter));
/// ```
#[derive(Debug, Clone, Default)]
pub struct ApiThrottle {
    limiters: HashMap<Channel, Arc<DirectLimiter>>,
}

impl ApiThrottle {
    /// Throttle with no limits.
    pub fn new() -> Self {
        Self::default()
    }

    /// Limit `channel` to `per_minute` requests. Zero removes the limit.
    pub fn with_limit(mut self, channel: Channel, per_minute: u32) -> Self {
        match NonZeroU32::new(per_minute) {
            Some(n) => {
                let quota = Quota::per_minute(n);
                self.limiters
                    .insert(channel, Arc::new(GovernorRateLimiter::direct(quota)));
            }
            None => {
                self.limiters.remove(&channel);
            }
        }
        self
    }

    /// Whether `channel` has a limit.
    pub fn is_limited(&self, channel: Channel) -> bool {
        self.limiters.contains_key(&channel)
    }

    /// Wait until `channel` may make another request.
    #[tracing::instrument(level = "trace", skip(self))]
    pub async fn acquire(&self, channel: Channel) {
        if let Some(limiter) = self.limiters.get(&channel) {
            limiter.until_ready().await;
        }
    }
}
