//! In-memory backend.

use crate::{decode_state, encode_state};
use async_trait::async_trait;
use barker_core::EngineState;
use barker_error::StorageError;
use barker_interface::StateStore;
use parking_lot::Mutex;
use std::sync::Arc;

/// Keeps the serialized snapshot in memory.
///
/// The snapshot still goes through JSON encoding, so behaviour matches
/// [`JsonFileStore`](crate::JsonFileStore) without touching disk. Clones
/// share the same document.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    document: Arc<Mutex<Option<String>>>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store preloaded with a raw document.
    pub fn with_document(raw: impl Into<String>) -> Self {
        Self {
            document: Arc::new(Mutex::new(Some(raw.into()))),
        }
    }

    /// The raw persisted document, if any.
    pub fn document(&self) -> Option<String> {
        self.document.lock().clone()
    }
}

#[async_trait]
impl StateStore for MemoryStore {
    async fn load_state(&self) -> Result<Option<EngineState>, StorageError> {
        let raw = self.document.lock().clone();
        raw.map(|raw| decode_state(&raw)).transpose()
    }

    async fn save_state(&self, state: &EngineState) -> Result<(), StorageError> {
        let json = encode_state(state)?;
        *self.document.lock() = Some(json);
        Ok(())
    }

    async fn clear_state(&self) -> Result<(), StorageError> {
        *self.document.lock() = None;
        Ok(())
    }

    async fn quarantine(&self) -> Result<Option<String>, StorageError> {
        let previous = self.document.lock().take();
        Ok(previous.map(|_| "memory".to_string()))
    }
}
