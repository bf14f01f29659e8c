//! Content units eligible for publication.

use crate::Channel;
use chrono::{DateTime, Utc};
use derive_getters::Getters;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Stable content hash identifying a [`ContentItem`].
#[derive(
    Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, derive_more::Display,
)]
#[serde(transparent)]
#[display("{}", _0)]
pub struct ContentId(String);

impl ContentId {
    /// Wrap an identifier supplied by the content source.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Derive the identifier from the payload bytes (SHA-256, hex).
    pub fn from_payload(data: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(data);
        Self(format!("{:x}", hasher.finalize()))
    }

    /// Borrow the raw identifier.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ContentId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Immutable unit eligible for publication.
///
/// Supplied by an external content source; the engine never inspects or
/// mutates the payload.
#[derive(Debug, Clone, PartialEq, Getters, Serialize, Deserialize)]
pub struct ContentItem {
    /// Stable content hash.
    id: ContentId,
    /// Destination channel.
    channel: Channel,
    /// Opaque payload handed to the channel adapter.
    payload: serde_json::Value,
    /// When the source created the item.
    created_at: DateTime<Utc>,
}

impl ContentItem {
    /// Create an item with an explicit identifier.
    pub fn new(
        id: ContentId,
        channel: Channel,
        payload: serde_json::Value,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            channel,
            payload,
            created_at,
        }
    }

    /// Create an item whose identifier is the hash of its serialized payload.
    pub fn from_payload(
        channel: Channel,
        payload: serde_json::Value,
        created_at: DateTime<Utc>,
    ) -> Self {
        let id = ContentId::from_payload(payload.to_string().as_bytes());
        Self::new(id, channel, payload, created_at)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_payload_hash_is_stable() {
        let now = Utc::now();
        let a = ContentItem::from_payload(Channel::Reddit, json!({"title": "Mug"}), now);
        let b = ContentItem::from_payload(Channel::Reddit, json!({"title": "Mug"}), now);
        let c = ContentItem::from_payload(Channel::Reddit, json!({"title": "Tee"}), now);
        assert_eq!(a.id(), b.id());
        assert_ne!(a.id(), c.id());
        assert_eq!(a.id().as_str().len(), 64);
    }
}
