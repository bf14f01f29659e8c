//! JSON file backend.

use crate::{decode_state, encode_state};
use async_trait::async_trait;
use barker_core::EngineState;
use barker_error::{StorageError, StorageErrorKind};
use barker_interface::StateStore;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;

/// Stores the snapshot as a single pretty-printed JSON document.
///
/// Writes go to `<path>.tmp`, are synced to disk, and are then renamed over
/// the target, so a crash mid-write leaves the previous snapshot intact.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    /// Create a store for the given file.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Location of the snapshot.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self.path.as_os_str().to_owned();
        name.push(".tmp");
        PathBuf::from(name)
    }
}

/// Write `bytes` to `path` and flush them to disk before returning.
async fn write_synced(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let mut file = tokio::fs::File::create(path).await?;
    file.write_all(bytes).await?;
    file.sync_all().await
}

#[async_trait]
impl StateStore for JsonFileStore {
    #[tracing::instrument(skip(self), fields(path = %self.path.display()))]
    async fn load_state(&self) -> Result<Option<EngineState>, StorageError> {
        tracing::debug!("Loading state");
        let raw = match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!("No persisted state found");
                return Ok(None);
            }
            Err(e) => {
                return Err(StorageError::new(StorageErrorKind::FileRead(format!(
                    "{}: {}",
                    self.path.display(),
                    e
                ))));
            }
        };

        let state = decode_state(&raw)?;
        tracing::debug!(
            history = state.post_history.len(),
            pending = state.pending.len(),
            "State loaded"
        );
        Ok(Some(state))
    }

    #[tracing::instrument(skip(self, state), fields(path = %self.path.display()))]
    async fn save_state(&self, state: &EngineState) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                StorageError::new(StorageErrorKind::DirectoryCreation(format!(
                    "{}: {}",
                    parent.display(),
                    e
                )))
            })?;
        }

        let json = encode_state(state)?;
        let temp_path = self.temp_path();
        write_synced(&temp_path, json.as_bytes()).await.map_err(|e| {
            StorageError::new(StorageErrorKind::FileWrite(format!(
                "{}: {}",
                temp_path.display(),
                e
            )))
        })?;

        tokio::fs::rename(&temp_path, &self.path).await.map_err(|e| {
            StorageError::new(StorageErrorKind::FileWrite(format!(
                "rename {} to {}: {}",
                temp_path.display(),
                self.path.display(),
                e
            )))
        })?;

        tracing::trace!("State saved");
        Ok(())
    }

    #[tracing::instrument(skip(self), fields(path = %self.path.display()))]
    async fn clear_state(&self) -> Result<(), StorageError> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => {
                tracing::info!("State cleared");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StorageError::new(StorageErrorKind::FileWrite(format!(
                "{}: {}",
                self.path.display(),
                e
            )))),
        }
    }

    #[tracing::instrument(skip(self), fields(path = %self.path.display()))]
    async fn quarantine(&self) -> Result<Option<String>, StorageError> {
        if !tokio::fs::try_exists(&self.path).await.unwrap_or(false) {
            return Ok(None);
        }

        let mut name = self.path.as_os_str().to_owned();
        name.push(format!(
            ".corrupt-{}",
            chrono::Utc::now().format("%Y%m%dT%H%M%S")
        ));
        let target = PathBuf::from(name);

        tokio::fs::rename(&self.path, &target).await.map_err(|e| {
            StorageError::new(StorageErrorKind::FileWrite(format!(
                "rename {} to {}: {}",
                self.path.display(),
                target.display(),
                e
            )))
        })?;

        tracing::warn!(moved_to = %target.display(), "Quarantined unreadable state");
        Ok(Some(target.display().to_string()))
    }
}
