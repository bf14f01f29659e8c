//! Content source trait.

use async_trait::async_trait;
use barker_core::{Channel, ContentItem};
use barker_error::SourceError;

/// Supplies the pool of content the rotation queue scores.
#[async_trait]
pub trait ContentSource: Send + Sync {
    /// List items currently eligible for a channel.
    ///
    /// # Errors
    ///
    /// Returns error if the catalog cannot be read.
    async fn list_eligible(&self, channel: Channel) -> Result<Vec<ContentItem>, SourceError>;
}
