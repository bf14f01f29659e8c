//! Content source error types.

/// Failure reported by a content source while listing eligible items.
#[derive(Debug, Clone, derive_more::Display, derive_more::Error)]
#[display("Content Source Error: {} at line {} in {}", message, line, file)]
pub struct SourceError {
    /// Error message
    pub message: String,
    /// Line number where the error occurred
    pub line: u32,
    /// File where the error occurred
    pub file: &'static str,
}

impl SourceError {
    /// Create a new SourceError with the given message at the current location.
    #[track_caller]
    pub fn new(message: impl Into<String>) -> Self {
        let location = std::panic::Location::caller();
        Self {
            message: message.into(),
            line: location.line(),
            file: location.file(),
        }
    }
}
