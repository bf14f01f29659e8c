//! Channel adapter error types.

/// Failure conditions reported by a channel adapter.
///
/// The kind carries enough shape for the retry policy to classify it; the
/// adapter is responsible for mapping its own API responses onto these.
#[derive(Debug, Clone, PartialEq, Eq, Hash, derive_more::Display)]
pub enum ChannelErrorKind {
    /// Connection failure, DNS error, reset socket.
    #[display("Network failure: {}", _0)]
    Network(String),
    /// The channel did not answer in time.
    #[display("Request timed out: {}", _0)]
    Timeout(String),
    /// Generic rate-limit response.
    #[display("Rate limited by channel (retry after {:?}s)", retry_after_secs)]
    RateLimited {
        /// Server-provided hint, in seconds.
        retry_after_secs: Option<u64>,
    },
    /// 5xx-style failure on the channel side.
    #[display("Channel server error: {}", _0)]
    Server(String),
    /// The channel already holds identical content.
    #[display("Duplicate content: {}", _0)]
    DuplicateContent(String),
    /// Credentials rejected or missing.
    #[display("Not authorized: {}", _0)]
    Unauthorized(String),
    /// Account banned or suspended.
    #[display("Account banned: {}", _0)]
    Banned(String),
    /// Content refused as invalid.
    #[display("Content rejected: {}", _0)]
    ContentRejected(String),
    /// Anything the adapter could not map.
    #[display("Channel error: {}", _0)]
    Other(String),
}

/// Channel error with location tracking.
///
/// # Examples
///
/// ```
/// use barker_error::{ChannelError, ChannelErrorKind};
///
/// let err = ChannelError::new(ChannelErrorKind::Banned("account suspended".into()));
/// assert!(format!("{}", err).contains("banned"));
/// ```
#[derive(Debug, Clone, derive_more::Display, derive_more::Error)]
#[display("Channel Error: {} at line {} in {}", kind, line, file)]
pub struct ChannelError {
    /// The kind of error that occurred
    pub kind: ChannelErrorKind,
    /// Line number where error was created
    pub line: u32,
    /// File where error was created
    pub file: &'static str,
}

impl ChannelError {
    /// Create a new channel error with automatic location tracking.
    #[track_caller]
    pub fn new(kind: ChannelErrorKind) -> Self {
        let location = std::panic::Location::caller();
        Self {
            kind,
            line: location.line(),
            file: location.file(),
        }
    }

    /// Server-provided retry hint, if any.
    pub fn retry_after_secs(&self) -> Option<u64> {
        match self.kind {
            ChannelErrorKind::RateLimited { retry_after_secs } => retry_after_secs,
            _ => None,
        }
    }
}
