//! Error types for the Barker posting engine.
//!
//! This crate provides the foundation error types used throughout the Barker workspace.
//!
//! # Error Hierarchy
//!
//! All errors follow the `ErrorKind` + wrapper struct pattern:
//! - `*ErrorKind` enum defines specific error conditions
//! - `*Error` struct wraps the kind with source location tracking
//! - All errors use `#[track_caller]` for automatic location capture
//!
//! # Examples
//!
//! ```
//! use barker_error::{BarkerResult, ConfigError};
//!
//! fn load() -> BarkerResult<String> {
//!     Err(ConfigError::new("no channels enabled"))?
//! }
//!
//! match load() {
//!     Ok(data) => println!("Got: {}", data),
//!     Err(e) => eprintln!("Error: {}", e),
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod channel;
mod config;
mod engine;
mod error;
mod source;
mod storage;

pub use channel::{ChannelError, ChannelErrorKind};
pub use config::ConfigError;
pub use engine::{EngineError, EngineErrorKind};
pub use error::{BarkerError, BarkerErrorKind, BarkerResult};
pub use source::SourceError;
pub use storage::{StorageError, StorageErrorKind};
