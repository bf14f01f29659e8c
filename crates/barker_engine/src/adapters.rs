//! Dry-run adapters and simple content sources.

use async_trait::async_trait;
use barker_core::{Channel, ContentId, ContentItem, ExternalRef, FeedbackItem};
use barker_error::SourceError;
use barker_interface::{ChannelAdapter, ChannelResult, ContentSource};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, info};

/// Adapter that logs instead of publishing.
///
/// Every publish succeeds with a synthetic reference, feedback is always
/// empty, and replies are accepted.
#[derive(Debug)]
pub struct NoOpAdapter {
    channel: Channel,
    published: AtomicU64,
}

impl NoOpAdapter {
    /// Dry-run adapter for `channel`.
    pub fn new(channel: Channel) -> Self {
        Self {
            channel,
            published: AtomicU64::new(0),
        }
    }

    /// Publishes accepted so far.
    pub fn published(&self) -> u64 {
        self.published.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ChannelAdapter for NoOpAdapter {
    fn channel(&self) -> Channel {
        self.channel
    }

    async fn publish(&self, content: &ContentItem) -> ChannelResult<ExternalRef> {
        let n = self.published.fetch_add(1, Ordering::SeqCst) + 1;
        info!(channel = %self.channel, content_id = %content.id(), "Dry run: would publish");
        Ok(ExternalRef(format!("dry-run:{}:{}", self.channel, n)))
    }

    async fn fetch_feedback(&self, _external_ref: &ExternalRef) -> ChannelResult<Vec<FeedbackItem>> {
        Ok(Vec::new())
    }

    async fn reply(&self, external_ref: &ExternalRef, feedback_id: &str, text: &str) -> ChannelResult<()> {
        info!(channel = %self.channel, %external_ref, feedback_id, text, "Dry run: would reply");
        Ok(())
    }
}

/// Fixed in-memory catalog.
#[derive(Debug, Clone, Default)]
pub struct StaticContentSource {
    items: BTreeMap<Channel, Vec<ContentItem>>,
}

impl StaticContentSource {
    /// Catalog holding `items`, grouped by their channel.
    pub fn new(items: impl IntoIterator<Item = ContentItem>) -> Self {
        let mut source = Self::default();
        for item in items {
            source.push(item);
        }
        source
    }

    /// Add an item.
    pub fn push(&mut self, item: ContentItem) {
        self.items.entry(*item.channel()).or_default().push(item);
    }
}

#[async_trait]
impl ContentSource for StaticContentSource {
    async fn list_eligible(&self, channel: Channel) -> Result<Vec<ContentItem>, SourceError> {
        Ok(self.items.get(&channel).cloned().unwrap_or_default())
    }
}

/// One catalog entry on disk.
///
/// ```json
/// {"channel": "reddit", "payload": {"title": "Ceramic mug"}}
/// ```
///
/// Without an `id`, the payload hash is used.
#[derive(Debug, Deserialize)]
struct CatalogEntry {
    channel: Channel,
    #[serde(default)]
    id: Option<String>,
    payload: serde_json::Value,
    #[serde(default)]
    created_at: Option<DateTime<Utc>>,
}

impl CatalogEntry {
    fn into_item(self, fallback_created_at: DateTime<Utc>) -> ContentItem {
        let created_at = self.created_at.unwrap_or(fallback_created_at);
        match self.id {
            Some(id) => ContentItem::new(ContentId::new(id), self.channel, self.payload, created_at),
            None => ContentItem::from_payload(self.channel, self.payload, created_at),
        }
    }
}

/// Catalog read from JSON on every listing.
///
/// The path is either one file holding an array of entries, or a directory
/// whose `*.json` files each hold one entry or an array of entries. Files
/// added while the engine runs show up as new arrivals.
#[derive(Debug, Clone)]
pub struct JsonContentSource {
    path: PathBuf,
}

impl JsonContentSource {
    /// Source reading `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Location being read.
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_entries(path: &Path) -> Result<Vec<CatalogEntry>, SourceError> {
        let raw = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| SourceError::new(format!("Failed to read {}: {}", path.display(), e)))?;
        let value: serde_json::Value = serde_json::from_str(&raw)
            .map_err(|e| SourceError::new(format!("Invalid JSON in {}: {}", path.display(), e)))?;
        let entries = if value.is_array() {
            serde_json::from_value(value)
        } else {
            serde_json::from_value(value).map(|entry| vec![entry])
        };
        entries.map_err(|e| SourceError::new(format!("Invalid catalog entry in {}: {}", path.display(), e)))
    }

    async fn load(&self) -> Result<Vec<(CatalogEntry, DateTime<Utc>)>, SourceError> {
        let metadata = tokio::fs::metadata(&self.path)
            .await
            .map_err(|e| SourceError::new(format!("Cannot access {}: {}", self.path.display(), e)))?;

        let mut files = Vec::new();
        if metadata.is_dir() {
            let mut dir = tokio::fs::read_dir(&self.path)
                .await
                .map_err(|e| SourceError::new(format!("Cannot list {}: {}", self.path.display(), e)))?;
            while let Some(entry) = dir
                .next_entry()
                .await
                .map_err(|e| SourceError::new(format!("Cannot list {}: {}", self.path.display(), e)))?
            {
                let path = entry.path();
                if path.extension().is_some_and(|ext| ext == "json") {
                    files.push(path);
                }
            }
            files.sort();
        } else {
            files.push(self.path.clone());
        }

        let mut out = Vec::new();
        for file in files {
            let modified = tokio::fs::metadata(&file)
                .await
                .ok()
                .and_then(|m| m.modified().ok())
                .map(DateTime::<Utc>::from)
                .unwrap_or_else(Utc::now);
            for entry in Self::read_entries(&file).await? {
                out.push((entry, modified));
            }
        }
        Ok(out)
    }
}

#[async_trait]
impl ContentSource for JsonContentSource {
    async fn list_eligible(&self, channel: Channel) -> Result<Vec<ContentItem>, SourceError> {
        let items: Vec<ContentItem> = self
            .load()
            .await?
            .into_iter()
            .filter(|(entry, _)| entry.channel == channel)
            .map(|(entry, modified)| entry.into_item(modified))
            .collect();
        debug!(%channel, count = items.len(), path = %self.path.display(), "Catalog listed");
        Ok(items)
    }
}
