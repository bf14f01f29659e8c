//! Engine configuration.
//!
//! Configuration is layered with the `config` crate, later sources winning:
//!
//! 1. Bundled defaults (`barker.toml`, compiled in)
//! 2. `~/.config/barker/barker.toml`
//! 3. `./barker.toml`
//! 4. An explicit file (`--config`)
//! 5. `BARKER__*` environment variables, `__` separating sections
//!
//! # Example
//!
//! ```toml
//! [channels.twitter]
//! daily_cap = 4
//! min_interval_minutes = 90
//!
//! [[channels.twitter.windows]]
//! name = "lunch"
//! start = "12:00"
//! end = "13:30"
//! probability = 0.5
//! ```

use barker_core::{Channel, ScheduleWindow};
use barker_error::{BarkerResult, ConfigError};
use barker_rate_limit::{ApiThrottle, ChannelLimits, ChannelLimitsBuilder, RetryPolicy};
use config::{Config, Environment, File, FileFormat};
use derive_getters::Getters;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, instrument};

const DEFAULT_CONFIG: &str = include_str!("../../../barker.toml");

/// Rotation scoring weights.
#[derive(Debug, Clone, PartialEq, Eq, Getters, Serialize, Deserialize)]
#[serde(default)]
pub struct RotationConfig {
    /// Priority given to entries discovered from the content source.
    base_priority: i64,
    /// Bonus while an entry has never been promoted.
    new_arrival_bonus: i64,
    /// Penalty per past promotion.
    per_promotion_penalty: i64,
    /// Penalty while inside the cooldown.
    recency_penalty: i64,
    /// Days after a promotion during which the recency penalty applies.
    cooldown_days: i64,
    /// Priority lost on each promotion.
    priority_decay: i64,
    /// Floor for decayed priority.
    min_priority: i64,
}

impl Default for RotationConfig {
    fn default() -> Self {
        Self {
            base_priority: 100,
            new_arrival_bonus: 50,
            per_promotion_penalty: 10,
            recency_penalty: 40,
            cooldown_days: 7,
            priority_decay: 5,
            min_priority: 10,
        }
    }
}

/// Thresholds for dispatch-gap auditing.
#[derive(Debug, Clone, PartialEq, Getters, Serialize, Deserialize)]
#[serde(default)]
pub struct PatternConfig {
    /// Sample variance (hours²) below which gaps look automated.
    variance_threshold_hours: f64,
    /// Minimum number of gaps before a verdict is given.
    min_samples: usize,
}

impl Default for PatternConfig {
    fn default() -> Self {
        Self {
            variance_threshold_hours: 2.0,
            min_samples: 6,
        }
    }
}

/// Feedback filtering and reply pacing.
#[derive(Debug, Clone, PartialEq, Getters, Serialize, Deserialize)]
#[serde(default)]
pub struct EngagementConfig {
    blacklist_words: Vec<String>,
    reply_probability: f64,
    max_replies_per_hour: u32,
    reply_delay_min_minutes: u32,
    reply_delay_max_minutes: u32,
    poll_interval_minutes: u32,
    retention_days: u32,
    reply_templates: Vec<String>,
}

impl Default for EngagementConfig {
    fn default() -> Self {
        Self {
            blacklist_words: Vec::new(),
            reply_probability: 0.8,
            max_replies_per_hour: 10,
            reply_delay_min_minutes: 5,
            reply_delay_max_minutes: 45,
            poll_interval_minutes: 60,
            retention_days: 90,
            reply_templates: vec!["Thanks for the feedback!".to_string()],
        }
    }
}

/// Settings for one channel.
#[derive(Debug, Clone, PartialEq, Getters, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelConfig {
    enabled: bool,
    daily_cap: u32,
    min_interval_minutes: u32,
    /// Zero disables the API throttle.
    api_requests_per_minute: u32,
    windows: Vec<ScheduleWindow>,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            daily_cap: 3,
            min_interval_minutes: 0,
            api_requests_per_minute: 0,
            windows: Vec::new(),
        }
    }
}

impl ChannelConfig {
    /// Posting limits derived from this channel's settings.
    pub fn limits(&self) -> ChannelLimits {
        ChannelLimitsBuilder::default()
            .daily_cap(self.daily_cap)
            .min_interval_minutes(self.min_interval_minutes)
            .build()
            .unwrap_or_else(|_| ChannelLimits::daily(self.daily_cap))
    }

    /// Window by name.
    pub fn window(&self, name: &str) -> Option<&ScheduleWindow> {
        self.windows.iter().find(|w| w.name == name)
    }
}

/// Complete engine configuration.
#[derive(Debug, Clone, PartialEq, Getters, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Location of the persisted state document.
    state_path: PathBuf,
    /// Post history ring size.
    history_limit: usize,
    retry: RetryPolicy,
    rotation: RotationConfig,
    pattern: PatternConfig,
    engagement: EngagementConfig,
    channels: BTreeMap<Channel, ChannelConfig>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            state_path: PathBuf::from("barker-state.json"),
            history_limit: 1000,
            retry: RetryPolicy::default(),
            rotation: RotationConfig::default(),
            pattern: PatternConfig::default(),
            engagement: EngagementConfig::default(),
            channels: BTreeMap::new(),
        }
    }
}

impl EngineConfig {
    /// Load with the full precedence chain.
    ///
    /// # Errors
    ///
    /// Returns error if a present source cannot be parsed or the merged
    /// result does not deserialize.
    #[instrument]
    pub fn load(explicit: Option<&Path>) -> BarkerResult<Self> {
        debug!("Loading configuration: env > explicit > current dir > home dir > bundled defaults");

        let mut builder =
            Config::builder().add_source(File::from_str(DEFAULT_CONFIG, FileFormat::Toml));

        if let Some(home) = dirs::home_dir() {
            let home_config = home.join(".config/barker/barker.toml");
            builder = builder.add_source(File::from(home_config).required(false));
        }

        builder = builder.add_source(File::with_name("barker").required(false));

        if let Some(path) = explicit {
            builder = builder.add_source(File::from(path));
        }

        builder = builder.add_source(
            Environment::with_prefix("BARKER")
                .separator("__")
                .try_parsing(true)
                .list_separator(",")
                .with_list_parse_key("engagement.blacklist_words")
                .with_list_parse_key("engagement.reply_templates"),
        );

        Self::finish(builder.build())
    }

    /// Load a single file without defaults or overrides.
    ///
    /// # Errors
    ///
    /// Returns error if the file is missing or invalid.
    pub fn from_file(path: impl AsRef<Path>) -> BarkerResult<Self> {
        debug!(path = %path.as_ref().display(), "Loading configuration from file");
        Self::finish(Config::builder().add_source(File::from(path.as_ref())).build())
    }

    /// Parse a TOML document. Missing fields take their defaults.
    ///
    /// # Errors
    ///
    /// Returns error if the document is invalid.
    pub fn from_toml_str(toml: &str) -> BarkerResult<Self> {
        Self::finish(
            Config::builder()
                .add_source(File::from_str(toml, FileFormat::Toml))
                .build(),
        )
    }

    fn finish(built: Result<Config, config::ConfigError>) -> BarkerResult<Self> {
        let config: Self = built
            .map_err(|e| ConfigError::new(format!("Failed to load configuration: {}", e)))?
            .try_deserialize()
            .map_err(|e| ConfigError::new(format!("Failed to parse configuration: {}", e)))?;
        Ok(config)
    }

    /// Reject configurations the engine cannot run.
    ///
    /// # Errors
    ///
    /// Returns the first problem found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.history_limit == 0 {
            return Err(ConfigError::new("history_limit must be at least 1"));
        }
        self.retry.validate()?;

        let engagement = &self.engagement;
        if !(0.0..=1.0).contains(&engagement.reply_probability) {
            return Err(ConfigError::new(format!(
                "engagement.reply_probability {} is outside [0, 1]",
                engagement.reply_probability
            )));
        }
        if engagement.reply_delay_min_minutes > engagement.reply_delay_max_minutes {
            return Err(ConfigError::new(format!(
                "engagement reply delay min ({}) exceeds max ({})",
                engagement.reply_delay_min_minutes, engagement.reply_delay_max_minutes
            )));
        }
        if engagement.poll_interval_minutes == 0 {
            return Err(ConfigError::new("engagement.poll_interval_minutes must be at least 1"));
        }
        if self.rotation.min_priority < 0 || self.rotation.priority_decay < 0 {
            return Err(ConfigError::new(
                "rotation.min_priority and rotation.priority_decay must not be negative",
            ));
        }

        let mut enabled = 0;
        for (channel, settings) in &self.channels {
            for window in &settings.windows {
                window.validate()?;
            }
            if !settings.enabled {
                continue;
            }
            enabled += 1;
            if settings.windows.is_empty() {
                return Err(ConfigError::new(format!(
                    "channel '{}' is enabled but has no windows",
                    channel
                )));
            }
            if settings.daily_cap == 0 {
                return Err(ConfigError::new(format!(
                    "channel '{}' is enabled with daily_cap = 0",
                    channel
                )));
            }
        }
        if enabled == 0 {
            return Err(ConfigError::new("no channels are enabled"));
        }
        Ok(())
    }

    /// Settings for `channel`, if configured.
    pub fn channel(&self, channel: Channel) -> Option<&ChannelConfig> {
        self.channels.get(&channel)
    }

    /// Channels with `enabled = true`.
    pub fn enabled_channels(&self) -> Vec<Channel> {
        self.channels
            .iter()
            .filter(|(_, c)| c.enabled)
            .map(|(channel, _)| *channel)
            .collect()
    }

    /// API throttle built from per-channel request limits.
    pub fn throttle(&self) -> ApiThrottle {
        self.channels
            .iter()
            .fold(ApiThrottle::new(), |throttle, (channel, settings)| {
                throttle.with_limit(*channel, settings.api_requests_per_minute)
            })
    }

    /// Point the state document elsewhere.
    pub fn with_state_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.state_path = path.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TWO_CHANNELS: &str = r#"
history_limit = 50

[retry]
max_retries = 3

[channels.reddit]
daily_cap = 2
api_requests_per_minute = 30

[[channels.reddit.windows]]
name = "morning"
start = "08:00"
end = "11:00"
probability = 0.7

[channels.twitter]
enabled = false
"#;

    #[test]
    fn test_bundled_defaults_parse_and_validate() {
        let config = EngineConfig::from_toml_str(DEFAULT_CONFIG).unwrap();
        assert!(config.validate().is_ok());
        assert_eq!(*config.history_limit(), 1000);
        assert_eq!(*config.engagement().max_replies_per_hour(), 10);
        assert_eq!(config.enabled_channels(), vec![Channel::Reddit]);
    }

    #[test]
    fn test_partial_document_fills_defaults() {
        let config = EngineConfig::from_toml_str(TWO_CHANNELS).unwrap();
        assert_eq!(*config.history_limit(), 50);
        assert_eq!(*config.retry().max_retries(), 3);
        assert_eq!(*config.retry().initial_delay_ms(), 2000);
        assert_eq!(*config.rotation().cooldown_days(), 7);

        let reddit = config.channel(Channel::Reddit).unwrap();
        assert_eq!(*reddit.daily_cap(), 2);
        assert_eq!(reddit.windows().len(), 1);
        assert!(reddit.window("morning").is_some());
        assert!(config.throttle().is_limited(Channel::Reddit));
        assert!(!config.throttle().is_limited(Channel::Twitter));

        assert_eq!(config.enabled_channels(), vec![Channel::Reddit]);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_requires_enabled_channel() {
        let config = EngineConfig::from_toml_str("[channels.reddit]\nenabled = false\n").unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_enabled_channel_without_windows() {
        let config = EngineConfig::from_toml_str("[channels.reddit]\ndaily_cap = 2\n").unwrap();
        let err = config.validate().unwrap_err();
        assert!(err.message.contains("no windows"));
    }

    #[test]
    fn test_validate_rejects_bad_reply_delay() {
        let toml = format!(
            "{}\n[engagement]\nreply_delay_min_minutes = 50\nreply_delay_max_minutes = 10\n",
            TWO_CHANNELS
        );
        let config = EngineConfig::from_toml_str(&toml).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_shrinking_backoff() {
        let toml = TWO_CHANNELS.replace("max_retries = 3", "max_retries = 3\nmultiplier = 0.5");
        let config = EngineConfig::from_toml_str(&toml).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_inverted_window() {
        let toml = TWO_CHANNELS.replace("end = \"11:00\"", "end = \"07:00\"");
        let config = EngineConfig::from_toml_str(&toml).unwrap();
        assert!(config.validate().is_err());
    }
}
