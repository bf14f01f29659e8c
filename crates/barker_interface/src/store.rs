//! Persistence backend trait.

use async_trait::async_trait;
use barker_core::EngineState;
use barker_error::StorageError;

/// Durable home of the engine snapshot.
///
/// Backends only load and save whole snapshots. Serializing writers is the
/// caller's job (see `barker_storage::StateHandle`).
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Load the persisted snapshot.
    ///
    /// # Returns
    ///
    /// `None` when nothing has been persisted yet.
    ///
    /// # Errors
    ///
    /// Returns a `Corruption` error when persisted data exists but cannot be
    /// decoded, or an I/O error when it cannot be read at all.
    async fn load_state(&self) -> Result<Option<EngineState>, StorageError>;

    /// Persist a snapshot atomically, replacing the previous one.
    ///
    /// # Errors
    ///
    /// Returns error if the snapshot cannot be written.
    async fn save_state(&self, state: &EngineState) -> Result<(), StorageError>;

    /// Remove the persisted snapshot.
    ///
    /// # Errors
    ///
    /// Returns error if the snapshot exists but cannot be removed.
    async fn clear_state(&self) -> Result<(), StorageError>;

    /// Move unreadable data aside so a fresh snapshot can take its place.
    ///
    /// # Returns
    ///
    /// Where the data went, if the backend keeps it.
    ///
    /// # Errors
    ///
    /// Returns error if the data cannot be moved.
    async fn quarantine(&self) -> Result<Option<String>, StorageError> {
        Ok(None)
    }
}
