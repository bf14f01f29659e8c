//! Durable pending actions with cooperative cancellation.
//!
//! A dispatch or reply is persisted with its intended fire time before the
//! owning task starts waiting, so a restart resumes it instead of losing it.
//! Cancelling an action trips its token and removes the persisted copy;
//! shutting down only trips tokens, leaving actions to resume on restart.

use barker_core::{Channel, ScheduledAction};
use barker_error::BarkerResult;
use barker_interface::Clock;
use barker_storage::StateHandle;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument};
use uuid::Uuid;

/// Registry of persisted actions and their cancellation tokens.
#[derive(Debug, Clone)]
pub struct ActionSchedule {
    state: StateHandle,
    tokens: Arc<Mutex<HashMap<Uuid, (Channel, CancellationToken)>>>,
}

impl ActionSchedule {
    /// Schedule over `state`.
    pub fn new(state: StateHandle) -> Self {
        Self {
            state,
            tokens: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Persist `action`, replacing any stored action with the same id.
    ///
    /// # Errors
    ///
    /// Returns error if state cannot be persisted.
    #[instrument(skip(self, action), fields(id = %action.id, channel = %action.channel))]
    pub async fn persist(&self, action: ScheduledAction) -> BarkerResult<()> {
        self.state
            .update(|state| {
                state.pending.retain(|a| a.id != action.id);
                state.pending.push(action);
            })
            .await?;
        Ok(())
    }

    /// Register a waiter for `action` under `parent`.
    ///
    /// The returned token is cancelled by [`cancel`](Self::cancel),
    /// [`cancel_channel`](Self::cancel_channel), or by cancelling `parent`.
    pub fn arm(&self, action: &ScheduledAction, parent: &CancellationToken) -> CancellationToken {
        let token = parent.child_token();
        self.tokens
            .lock()
            .insert(action.id, (action.channel, token.clone()));
        token
    }

    /// Cancel one action. Returns whether it was pending.
    ///
    /// # Errors
    ///
    /// Returns error if state cannot be persisted.
    #[instrument(skip(self))]
    pub async fn cancel(&self, id: Uuid) -> BarkerResult<bool> {
        if let Some((_, token)) = self.tokens.lock().remove(&id) {
            token.cancel();
        }
        let removed = self
            .state
            .update(|state| {
                let before = state.pending.len();
                state.pending.retain(|a| a.id != id);
                before != state.pending.len()
            })
            .await?;
        Ok(removed)
    }

    /// Cancel every pending action on `channel`. Returns how many were removed.
    ///
    /// # Errors
    ///
    /// Returns error if state cannot be persisted.
    #[instrument(skip(self))]
    pub async fn cancel_channel(&self, channel: Channel) -> BarkerResult<usize> {
        {
            let mut tokens = self.tokens.lock();
            tokens.retain(|_, (owner, token)| {
                if *owner == channel {
                    token.cancel();
                    false
                } else {
                    true
                }
            });
        }
        let removed = self
            .state
            .update(|state| {
                let before = state.pending.len();
                state.pending.retain(|a| a.channel != channel);
                before - state.pending.len()
            })
            .await?;
        debug!(%channel, removed, "Pending actions cancelled");
        Ok(removed)
    }

    /// Drop a fired action from the registry and from state.
    ///
    /// # Errors
    ///
    /// Returns error if state cannot be persisted.
    pub async fn complete(&self, id: Uuid) -> BarkerResult<()> {
        self.release(id);
        self.state
            .update(|state| state.pending.retain(|a| a.id != id))
            .await?;
        Ok(())
    }

    /// Forget the token for `id` without touching state.
    pub fn release(&self, id: Uuid) {
        self.tokens.lock().remove(&id);
    }

    /// Whether a waiter for `id` is armed.
    pub fn is_armed(&self, id: Uuid) -> bool {
        self.tokens.lock().contains_key(&id)
    }

    /// Persisted actions, optionally for one channel, by fire time.
    pub fn pending(&self, channel: Option<Channel>) -> Vec<ScheduledAction> {
        let mut actions: Vec<ScheduledAction> = self.state.read(|state| {
            state
                .pending
                .iter()
                .filter(|a| channel.is_none_or(|c| a.channel == c))
                .cloned()
                .collect()
        });
        actions.sort_by_key(|a| a.fire_at);
        actions
    }

    /// The persisted dispatch for `channel`, if any.
    pub fn pending_dispatch(&self, channel: Channel) -> Option<ScheduledAction> {
        self.pending(Some(channel))
            .into_iter()
            .find(ScheduledAction::is_dispatch)
    }

    /// Every persisted reply.
    pub fn pending_replies(&self) -> Vec<ScheduledAction> {
        self.pending(None)
            .into_iter()
            .filter(ScheduledAction::is_reply)
            .collect()
    }
}

/// Wait until `fire_at` on `clock`, or until `token` is cancelled.
///
/// Returns `true` when the action should fire. Overdue actions fire at once.
/// The token is re-checked after the sleep so a cancellation that races the
/// deadline still wins.
pub async fn sleep_until(clock: &dyn Clock, fire_at: DateTime<Utc>, token: &CancellationToken) -> bool {
    let delay = (fire_at - clock.now()).to_std().unwrap_or_default();
    tokio::select! {
        biased;
        _ = token.cancelled() => false,
        _ = tokio::time::sleep(delay) => !token.is_cancelled(),
    }
}
