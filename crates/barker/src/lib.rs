//! Barker - posting automation engine
//!
//! Barker decides when to post promotional content to external channels,
//! what to post, and how to react to the feedback it gets, while staying
//! inside each channel's limits.
//!
//! # Features
//!
//! - **Window scheduling**: randomized dispatch instants inside configured
//!   time-of-day windows, with a variance audit of past posting gaps
//! - **Content rotation**: deterministic scoring with new-arrival bonus and
//!   cooldowns, so items cycle before repeating
//! - **Rate limiting**: per-channel daily caps, minimum intervals and API
//!   throttles, plus exponential backoff with transient/permanent
//!   classification
//! - **Engagement**: spam filtering and delayed, capped, probabilistic replies
//! - **Durability**: one versioned state document; pending dispatches and
//!   replies survive restarts
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use barker::{Channel, Engine, EngineConfig, JsonContentSource, NoOpAdapter};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = EngineConfig::load(None)?;
//!     let engine = Engine::builder()
//!         .config(config)
//!         .adapter(Arc::new(NoOpAdapter::new(Channel::Reddit)))
//!         .source(Arc::new(JsonContentSource::new("content/")))
//!         .build()
//!         .await?;
//!
//!     engine.start().await?;
//!     tokio::signal::ctrl_c().await?;
//!     engine.stop().await?;
//!     Ok(())
//! }
//! ```
//!
//! # Architecture
//!
//! - `barker_error` - Error types
//! - `barker_core` - Data model and the persisted snapshot
//! - `barker_interface` - `ChannelAdapter`, `ContentSource`, `StateStore`, `Clock`
//! - `barker_storage` - JSON file and in-memory stores, `StateHandle`
//! - `barker_rate_limit` - Daily caps, retry policy, API throttle
//! - `barker_engine` - Ledger, rotation, scheduling, engagement, orchestration
//!
//! This crate (`barker`) re-exports everything for convenience.

pub use barker_core::*;
pub use barker_engine::*;
pub use barker_error::*;
pub use barker_interface::*;
pub use barker_rate_limit::*;
pub use barker_storage::*;

pub mod observability;
mod report;

pub use report::{ChannelStatus, audit_channels, channel_status, load_snapshot};
