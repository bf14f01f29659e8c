//! Configured day-part windows.

use barker_error::ConfigError;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

/// A time-of-day range (UTC) during which a dispatch may occur.
///
/// ```toml
/// [[channels.reddit.windows]]
/// name = "morning"
/// start = "08:00"
/// end = "10:30"
/// probability = 0.7
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleWindow {
    /// Day-part name used in logs and persisted actions.
    pub name: String,
    /// Inclusive start.
    #[serde(with = "hhmm")]
    pub start: NaiveTime,
    /// Exclusive end.
    #[serde(with = "hhmm")]
    pub end: NaiveTime,
    /// Chance that a dispatch inside this window actually posts.
    #[serde(alias = "probability", default = "default_probability")]
    pub post_probability: f64,
}

fn default_probability() -> f64 {
    1.0
}

impl ScheduleWindow {
    /// Create a window.
    pub fn new(name: impl Into<String>, start: NaiveTime, end: NaiveTime, post_probability: f64) -> Self {
        Self {
            name: name.into(),
            start,
            end,
            post_probability,
        }
    }

    /// Check bounds and probability.
    ///
    /// # Errors
    ///
    /// Returns error if `start >= end` or the probability lies outside `[0, 1]`.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.start >= self.end {
            return Err(ConfigError::new(format!(
                "window '{}' must start before it ends ({} >= {})",
                self.name, self.start, self.end
            )));
        }
        if !(0.0..=1.0).contains(&self.post_probability) {
            return Err(ConfigError::new(format!(
                "window '{}' probability {} is outside [0, 1]",
                self.name, self.post_probability
            )));
        }
        Ok(())
    }

    /// The window's `[start, end)` instants on a given day.
    pub fn occurrence(&self, date: NaiveDate) -> (DateTime<Utc>, DateTime<Utc>) {
        (
            date.and_time(self.start).and_utc(),
            date.and_time(self.end).and_utc(),
        )
    }
}

/// Serde adapter for `HH:MM` (seconds optional) times.
mod hhmm {
    use chrono::NaiveTime;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(time: &NaiveTime, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&time.format("%H:%M").to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveTime, D::Error> {
        let raw = String::deserialize(deserializer)?;
        NaiveTime::parse_from_str(&raw, "%H:%M")
            .or_else(|_| NaiveTime::parse_from_str(&raw, "%H:%M:%S"))
            .map_err(|e| serde::de::Error::custom(format!("invalid time '{}': {}", raw, e)))
    }
}
