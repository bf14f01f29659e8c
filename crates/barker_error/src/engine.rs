//! Engine error types.

/// Kinds of engine errors.
#[derive(Debug, Clone, PartialEq, Eq, Hash, derive_more::Display)]
pub enum EngineErrorKind {
    /// Operation referenced a channel with no configuration.
    #[display("Channel not configured: {}", _0)]
    ChannelNotConfigured(String),
    /// Selected queue entry has no matching eligible content item.
    #[display("Content not found: {}", _0)]
    ContentNotFound(String),
    /// Engagement record missing for an external reference.
    #[display("Item not tracked: {}", _0)]
    NotTracked(String),
    /// A background task panicked or was aborted.
    #[display("Task failed: {}", _0)]
    TaskFailed(String),
    /// Engine was asked to start twice.
    #[display("Engine already running")]
    AlreadyRunning,
}

/// Engine error with location tracking.
#[derive(Debug, Clone, derive_more::Display, derive_more::Error)]
#[display("Engine Error: {} at line {} in {}", kind, line, file)]
pub struct EngineError {
    /// The kind of error that occurred
    pub kind: EngineErrorKind,
    /// Line number where error was created
    pub line: u32,
    /// File where error was created
    pub file: &'static str,
}

impl EngineError {
    /// Create a new engine error with automatic location tracking.
    #[track_caller]
    pub fn new(kind: EngineErrorKind) -> Self {
        let location = std::panic::Location::caller();
        Self {
            kind,
            line: location.line(),
            file: location.file(),
        }
    }
}
