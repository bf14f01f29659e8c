//! Top-level error wrapper types.

use crate::{ChannelError, ConfigError, EngineError, SourceError, StorageError};

/// Every error condition the workspace can surface.
///
/// # Examples
///
/// ```
/// use barker_error::{BarkerError, ConfigError};
///
/// let err: BarkerError = ConfigError::new("missing daily_cap").into();
/// assert!(format!("{}", err).contains("Configuration Error"));
/// ```
#[derive(Debug, derive_more::From, derive_more::Display, derive_more::Error)]
pub enum BarkerErrorKind {
    /// Channel adapter error
    #[from(ChannelError)]
    Channel(ChannelError),
    /// Configuration error
    #[from(ConfigError)]
    Config(ConfigError),
    /// Storage error
    #[from(StorageError)]
    Storage(StorageError),
    /// Content source error
    #[from(SourceError)]
    Source(SourceError),
    /// Engine error
    #[from(EngineError)]
    Engine(EngineError),
}

/// Barker error with kind discrimination.
///
/// # Examples
///
/// ```
/// use barker_error::{BarkerResult, ConfigError};
///
/// fn might_fail() -> BarkerResult<()> {
///     Err(ConfigError::new("Missing field"))?
/// }
///
/// assert!(might_fail().is_err());
/// ```
#[derive(Debug, derive_more::Display, derive_more::Error)]
#[display("Barker Error: {}", _0)]
pub struct BarkerError(Box<BarkerErrorKind>);

impl BarkerError {
    /// Create a new error from a kind.
    pub fn new(kind: BarkerErrorKind) -> Self {
        Self(Box::new(kind))
    }

    /// Get the error kind.
    pub fn kind(&self) -> &BarkerErrorKind {
        &self.0
    }
}

// Generic From implementation for any type that converts to BarkerErrorKind
impl<T> From<T> for BarkerError
where
    T: Into<BarkerErrorKind>,
{
    fn from(err: T) -> Self {
        Self::new(err.into())
    }
}

/// Result type for Barker operations.
pub type BarkerResult<T> = std::result::Result<T, BarkerError>;
