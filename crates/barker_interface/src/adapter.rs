//! Channel adapter trait.

use async_trait::async_trait;
use barker_core::{Channel, ContentItem, EngagementMetrics, ExternalRef, FeedbackItem};
use barker_error::ChannelError;

/// Result type for channel operations.
pub type ChannelResult<T> = Result<T, ChannelError>;

/// A concrete publishing destination.
///
/// Implementations own the HTTP calls, browser automation, or OAuth dance
/// for one channel. The engine only sees these operations and never
/// inspects adapter-specific payloads.
#[async_trait]
pub trait ChannelAdapter: Send + Sync {
    /// Channel this adapter publishes to.
    fn channel(&self) -> Channel;

    /// Publish content immediately.
    ///
    /// # Returns
    ///
    /// Channel-assigned reference (post id or URL) on success.
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - The network or the channel fails (transient)
    /// - The channel rate-limits the account (transient)
    /// - The content is a duplicate or invalid (permanent)
    /// - The account is banned or unauthorized (permanent)
    async fn publish(&self, content: &ContentItem) -> ChannelResult<ExternalRef>;

    /// Fetch feedback items (comments, answers) on a published item.
    ///
    /// # Errors
    ///
    /// Returns error if the channel cannot be queried.
    async fn fetch_feedback(&self, external_ref: &ExternalRef) -> ChannelResult<Vec<FeedbackItem>>;

    /// Reply to a feedback item.
    ///
    /// # Errors
    ///
    /// Returns error if the reply is refused or the channel fails.
    async fn reply(
        &self,
        external_ref: &ExternalRef,
        feedback_id: &str,
        text: &str,
    ) -> ChannelResult<()>;

    /// Fetch aggregate metrics for a published item.
    ///
    /// Channels without a metrics endpoint keep the default, which reports nothing.
    ///
    /// # Errors
    ///
    /// Returns error if the channel cannot be queried.
    async fn fetch_metrics(
        &self,
        _external_ref: &ExternalRef,
    ) -> ChannelResult<Option<EngagementMetrics>> {
        Ok(None)
    }
}
