//! Single-writer access to the engine snapshot.

use barker_core::EngineState;
use barker_error::StorageError;
use barker_interface::StateStore;
use parking_lot::RwLock;
use std::sync::Arc;
use tokio::sync::Mutex;

/// What happened while opening persisted state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadReport {
    /// Persisted state was unreadable and defaults were used instead.
    pub recovered: bool,
    /// Rendered reason for the recovery.
    pub reason: Option<String>,
    /// Where the unreadable data was moved.
    pub quarantined_to: Option<String>,
}

/// Shared handle to the engine snapshot.
///
/// Writers are serialized: every mutation runs as one read-modify-write that
/// is persisted before readers can observe it. Readers take cheap snapshots
/// and never wait on a write in progress. Clones share the same state.
#[derive(Clone)]
pub struct StateHandle {
    store: Arc<dyn StateStore>,
    writer: Arc<Mutex<()>>,
    snapshot: Arc<RwLock<Arc<EngineState>>>,
}

impl std::fmt::Debug for StateHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateHandle")
            .field("history", &self.snapshot.read().post_history.len())
            .finish_non_exhaustive()
    }
}

impl StateHandle {
    /// Load persisted state, falling back to defaults when it is unreadable.
    ///
    /// Unreadable data is moved aside through [`StateStore::quarantine`]
    /// before defaults are used, so nothing is overwritten silently.
    #[tracing::instrument(skip(store))]
    pub async fn open(store: Arc<dyn StateStore>) -> (Self, LoadReport) {
        let mut report = LoadReport::default();

        let state = match store.load_state().await {
            Ok(Some(state)) => state,
            Ok(None) => {
                tracing::info!("No persisted state, starting fresh");
                EngineState::default()
            }
            Err(e) => {
                tracing::warn!(error = %e, "Persisted state unreadable, resetting to defaults");
                report.recovered = true;
                report.reason = Some(e.to_string());
                match store.quarantine().await {
                    Ok(target) => report.quarantined_to = target,
                    Err(qe) => tracing::warn!(error = %qe, "Failed to quarantine state"),
                }
                EngineState::default()
            }
        };

        (Self::from_parts(store, state), report)
    }

    /// Wrap an already-loaded state without touching the backend.
    pub fn from_parts(store: Arc<dyn StateStore>, state: EngineState) -> Self {
        Self {
            store,
            writer: Arc::new(Mutex::new(())),
            snapshot: Arc::new(RwLock::new(Arc::new(state))),
        }
    }

    /// Current committed snapshot.
    pub fn snapshot(&self) -> Arc<EngineState> {
        Arc::clone(&self.snapshot.read())
    }

    /// Read from the committed snapshot.
    pub fn read<R>(&self, f: impl FnOnce(&EngineState) -> R) -> R {
        let snapshot = self.snapshot();
        f(&snapshot)
    }

    /// Apply a mutation atomically and persist it.
    ///
    /// # Errors
    ///
    /// Returns error if the new snapshot cannot be persisted; the committed
    /// state is then left unchanged.
    pub async fn update<R>(
        &self,
        f: impl FnOnce(&mut EngineState) -> R,
    ) -> Result<R, StorageError> {
        self.try_update(|state| Ok::<_, StorageError>(f(state))).await
    }

    /// Apply a fallible mutation atomically.
    ///
    /// The closure works on a copy of the committed state. When it fails,
    /// nothing is persisted or published. When it succeeds, the copy is
    /// persisted and then becomes the committed state.
    ///
    /// # Errors
    ///
    /// Returns the closure's error, or a storage error if persisting fails.
    pub async fn try_update<R, E>(
        &self,
        f: impl FnOnce(&mut EngineState) -> Result<R, E>,
    ) -> Result<R, E>
    where
        E: From<StorageError>,
    {
        let _guard = self.writer.lock().await;

        let current = self.snapshot();
        let mut next = EngineState::clone(&current);
        let out = f(&mut next)?;

        if next != *current {
            self.store.save_state(&next).await?;
            *self.snapshot.write() = Arc::new(next);
        }

        Ok(out)
    }

    /// Persist the committed state as-is.
    ///
    /// # Errors
    ///
    /// Returns error if the snapshot cannot be written.
    pub async fn flush(&self) -> Result<(), StorageError> {
        let _guard = self.writer.lock().await;
        let current = self.snapshot();
        self.store.save_state(&current).await
    }
}
