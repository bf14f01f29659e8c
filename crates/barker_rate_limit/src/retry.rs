//! Bounded exponential backoff.

use crate::classify;
use barker_core::FailureClass;
use barker_error::{ChannelError, ConfigError};
use derive_getters::Getters;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;
use tokio_retry2::{Retry, RetryError};
use tracing::{debug, warn};

/// Retry policy for channel publishes.
///
/// `max_retries` counts total attempts, so a policy with `max_retries = 5`
/// sleeps at most four times.
///
/// # TOML
///
/// ```toml
/// [retry]
/// initial_delay_ms = 2000
/// multiplier = 2.0
/// max_delay_secs = 300
/// max_retries = 5
/// ```
#[derive(Debug, Clone, PartialEq, Getters, Serialize, Deserialize, derive_builder::Builder)]
#[serde(default)]
#[builder(default)]
pub struct RetryPolicy {
    /// Delay before the second attempt.
    initial_delay_ms: u64,
    /// Growth factor between consecutive delays.
    multiplier: f64,
    /// Ceiling on any single delay, in seconds.
    max_delay_secs: u64,
    /// Total attempts, including the first.
    max_retries: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            initial_delay_ms: 2000,
            multiplier: 2.0,
            max_delay_secs: 300,
            max_retries: 5,
        }
    }
}

/// Terminal result of a retried operation.
#[derive(Debug, Clone)]
pub enum RetryOutcome<T> {
    /// The operation succeeded.
    Succeeded {
        /// Value returned by the final attempt.
        value: T,
        /// Attempts made.
        attempts: u32,
    },
    /// The operation failed permanently or ran out of attempts.
    Failed {
        /// Error from the final attempt.
        error: ChannelError,
        /// Classification of that error.
        class: FailureClass,
        /// Attempts made.
        attempts: u32,
    },
}

impl<T> RetryOutcome<T> {
    /// Attempts made.
    pub fn attempts(&self) -> u32 {
        match self {
            Self::Succeeded { attempts, .. } | Self::Failed { attempts, .. } => *attempts,
        }
    }
}

impl RetryPolicy {
    /// Ceiling on any single delay.
    pub fn max_delay(&self) -> Duration {
        Duration::from_secs(self.max_delay_secs)
    }

    /// Delay before attempt `attempt + 1`.
    ///
    /// `min(initial × multiplier^(attempt-1), max_delay)`. Non-decreasing in
    /// `attempt` and never above the ceiling.
    pub fn next_retry_delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
        let millis = self.initial_delay_ms as f64 * self.multiplier.max(1.0).powi(exponent);
        let max = self.max_delay();
        if !millis.is_finite() || millis >= max.as_millis() as f64 {
            max
        } else {
            Duration::from_millis(millis as u64).min(max)
        }
    }

    /// Sleeps between attempts, in order.
    pub fn delays(&self) -> impl Iterator<Item = Duration> + use<> {
        let policy = self.clone();
        (1..policy.max_retries.max(1)).map(move |attempt| policy.next_retry_delay(attempt))
    }

    /// Reject policies that could not make progress.
    ///
    /// # Errors
    ///
    /// Returns error if `max_retries` is zero or `multiplier` is below one.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_retries == 0 {
            return Err(ConfigError::new("retry.max_retries must be at least 1"));
        }
        if !self.multiplier.is_finite() || self.multiplier < 1.0 {
            return Err(ConfigError::new(format!(
                "retry.multiplier must be at least 1.0, got {}",
                self.multiplier
            )));
        }
        Ok(())
    }

    /// Run `operation` until it succeeds, fails permanently, or exhausts
    /// the attempt budget.
    ///
    /// The closure receives the 1-based attempt number. A rate-limit hint
    /// from the channel replaces the scheduled delay, capped at
    /// [`max_delay`](Self::max_delay).
    pub async fn run<T, F, Fut>(&self, operation: F) -> RetryOutcome<T>
    where
        F: Fn(u32) -> Fut,
        Fut: Future<Output = Result<T, ChannelError>>,
    {
        let counter = AtomicU32::new(0);
        let counter = &counter;
        let operation = &operation;
        let max_delay = self.max_delay();
        let max_retries = self.max_retries;
        let hint = Mutex::new(None::<Duration>);
        let hint = &hint;
        let strategy = self
            .delays()
            .map(move |scheduled| hint.lock().take().unwrap_or(scheduled));

        let result = Retry::spawn(strategy, move || async move {
            let attempt = counter.fetch_add(1, Ordering::SeqCst) + 1;
            match operation(attempt).await {
                Ok(value) => Ok(value),
                Err(err) => match classify(&err) {
                    FailureClass::Permanent => {
                        warn!(attempt, error = %err, "Permanent failure, not retrying");
                        Err(RetryError::Permanent(err))
                    }
                    FailureClass::Transient if attempt >= max_retries => {
                        warn!(attempt, error = %err, "Transient failure, attempts exhausted");
                        Err(RetryError::Permanent(err))
                    }
                    FailureClass::Transient => {
                        let retry_after = err
                            .retry_after_secs()
                            .map(|secs| Duration::from_secs(secs).min(max_delay));
                        debug!(attempt, ?retry_after, error = %err, "Transient failure, will retry");
                        *hint.lock() = retry_after;
                        Err(RetryError::Transient {
                            err,
                            retry_after: None,
                        })
                    }
                },
            }
        })
        .await;

        let attempts = counter.load(Ordering::SeqCst);
        match result {
            Ok(value) => RetryOutcome::Succeeded { value, attempts },
            Err(error) => RetryOutcome::Failed {
                class: classify(&error),
                error,
                attempts,
            },
        }
    }
}
