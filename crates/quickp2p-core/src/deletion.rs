//! Two-step confirmation guarding the destructive profile reset.
//!
//! ```text
//! Idle --request--> Confirming --confirm--> Executing --ok--> Done
//!  ^                  |                         |
//!  +------cancel------+                         +--err--> Failed --request--> Confirming
//! ```
//!
//! Clearing the store needs a [`ClearPermit`], and only `confirm` creates one.
//! After a successful clear the gate asks its [`RestartTrigger`] to rebuild all
//! in-memory state from the now empty store instead of patching it piecemeal.

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::manager::SettingsManager;
use crate::store::StorageError;

/// Proof that the user went through both confirmation steps
#[derive(Debug)]
pub struct ClearPermit {
    _private: (),
}

impl ClearPermit {
    fn new() -> Self {
        Self { _private: () }
    }

    #[cfg(test)]
    pub(crate) fn for_tests() -> Self {
        Self::new()
    }
}

/// Receives the request to tear down and rebuild the application's root state
pub trait RestartTrigger: Send + Sync {
    fn request_restart(&self);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeletionState {
    Idle,
    Confirming,
    Executing,
    Done,
    Failed,
}

impl fmt::Display for DeletionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DeletionState::Idle => "idle",
            DeletionState::Confirming => "awaiting confirmation",
            DeletionState::Executing => "in progress",
            DeletionState::Done => "done",
            DeletionState::Failed => "failed",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeletionAction {
    Request,
    Cancel,
    Confirm,
}

impl fmt::Display for DeletionAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DeletionAction::Request => "request deletion",
            DeletionAction::Cancel => "cancel deletion",
            DeletionAction::Confirm => "confirm deletion",
        };
        f.write_str(name)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DeletionError {
    #[error("cannot {action} while deletion is {state}")]
    InvalidTransition {
        state: DeletionState,
        action: DeletionAction,
    },

    #[error("failed to delete profile data: {0}")]
    Storage(#[source] StorageError),
}

pub struct DeletionGate {
    manager: Arc<SettingsManager>,
    restart: Arc<dyn RestartTrigger>,
    state: Mutex<DeletionState>,
}

impl DeletionGate {
    pub fn new(manager: Arc<SettingsManager>, restart: Arc<dyn RestartTrigger>) -> Self {
        Self {
            manager,
            restart,
            state: Mutex::new(DeletionState::Idle),
        }
    }

    pub fn state(&self) -> DeletionState {
        *self.state.lock()
    }

    /// First step. Also the way to retry after a failed deletion.
    pub fn request_deletion(&self) -> Result<DeletionState, DeletionError> {
        let mut state = self.state.lock();
        match *state {
            DeletionState::Idle | DeletionState::Failed | DeletionState::Confirming => {
                *state = DeletionState::Confirming;
                Ok(*state)
            }
            current => Err(DeletionError::InvalidTransition {
                state: current,
                action: DeletionAction::Request,
            }),
        }
    }

    /// Back out of a pending request. Has no side effects.
    pub fn cancel(&self) -> Result<DeletionState, DeletionError> {
        let mut state = self.state.lock();
        match *state {
            DeletionState::Confirming => {
                *state = DeletionState::Idle;
                Ok(*state)
            }
            current => Err(DeletionError::InvalidTransition {
                state: current,
                action: DeletionAction::Cancel,
            }),
        }
    }

    /// Second step: clear all local data, then request a restart.
    ///
    /// Runs to completion once started. On failure the gate ends in `Failed`,
    /// no restart is requested and the error is returned; retrying is up to
    /// the user.
    pub async fn confirm(&self) -> Result<(), DeletionError> {
        {
            let mut state = self.state.lock();
            if *state != DeletionState::Confirming {
                return Err(DeletionError::InvalidTransition {
                    state: *state,
                    action: DeletionAction::Confirm,
                });
            }
            *state = DeletionState::Executing;
        }

        let permit = ClearPermit::new();
        match self.manager.clear_storage(&permit).await {
            Ok(()) => {
                *self.state.lock() = DeletionState::Done;
                tracing::info!("deletion: profile data cleared, requesting restart");
                self.restart.request_restart();
                Ok(())
            }
            Err(e) => {
                *self.state.lock() = DeletionState::Failed;
                tracing::warn!("deletion: clearing profile data failed: {}", e);
                Err(DeletionError::Storage(e))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ColorMode, SettingsPatch};
    use crate::store::MemoryStore;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingRestart(AtomicUsize);

    impl RestartTrigger for CountingRestart {
        fn request_restart(&self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    impl CountingRestart {
        fn count(&self) -> usize {
            self.0.load(Ordering::SeqCst)
        }
    }

    async fn setup() -> (Arc<MemoryStore>, Arc<SettingsManager>, Arc<CountingRestart>, DeletionGate) {
        let store = Arc::new(MemoryStore::new());
        let manager = Arc::new(SettingsManager::init(store.clone()).await);
        let restart = Arc::new(CountingRestart::default());
        let gate = DeletionGate::new(manager.clone(), restart.clone());
        (store, manager, restart, gate)
    }

    #[tokio::test]
    async fn test_request_then_cancel_leaves_storage_untouched() {
        let (store, _manager, restart, gate) = setup().await;
        let before = store.snapshot();

        assert_eq!(gate.request_deletion().unwrap(), DeletionState::Confirming);
        assert_eq!(gate.cancel().unwrap(), DeletionState::Idle);

        assert_eq!(store.snapshot(), before);
        assert_eq!(store.clear_count(), 0);
        assert_eq!(restart.count(), 0);
    }

    #[tokio::test]
    async fn test_request_is_idempotent() {
        let (_store, _manager, _restart, gate) = setup().await;
        gate.request_deletion().unwrap();
        assert_eq!(gate.request_deletion().unwrap(), DeletionState::Confirming);
    }

    #[tokio::test]
    async fn test_confirm_clears_once_and_restarts() {
        let (store, manager, restart, gate) = setup().await;

        gate.request_deletion().unwrap();
        gate.confirm().await.unwrap();

        assert_eq!(gate.state(), DeletionState::Done);
        assert_eq!(store.clear_count(), 1);
        assert!(store.snapshot().is_none());
        assert_eq!(restart.count(), 1);
        assert!(manager.is_sealed());
    }

    #[tokio::test]
    async fn test_confirm_without_request_is_rejected() {
        let (store, _manager, restart, gate) = setup().await;

        let err = gate.confirm().await.unwrap_err();
        assert!(matches!(
            err,
            DeletionError::InvalidTransition {
                state: DeletionState::Idle,
                action: DeletionAction::Confirm,
            }
        ));
        assert_eq!(store.clear_count(), 0);
        assert_eq!(restart.count(), 0);
    }

    #[tokio::test]
    async fn test_failed_clear_does_not_restart_and_allows_retry() {
        let (store, manager, restart, gate) = setup().await;
        store.set_fail_clears(true);

        gate.request_deletion().unwrap();
        let err = gate.confirm().await.unwrap_err();

        assert!(matches!(err, DeletionError::Storage(_)));
        assert_eq!(gate.state(), DeletionState::Failed);
        assert_eq!(restart.count(), 0);
        assert!(!manager.is_sealed());

        // Manager keeps working after a failed deletion
        manager
            .update(SettingsPatch::new().color_mode(ColorMode::Dark))
            .await
            .unwrap();

        store.set_fail_clears(false);
        gate.request_deletion().unwrap();
        gate.confirm().await.unwrap();
        assert_eq!(store.clear_count(), 2);
        assert_eq!(restart.count(), 1);
    }

    #[tokio::test]
    async fn test_cancel_only_from_confirming() {
        let (_store, _manager, _restart, gate) = setup().await;
        assert!(gate.cancel().is_err());

        gate.request_deletion().unwrap();
        gate.confirm().await.unwrap();
        assert!(matches!(
            gate.cancel(),
            Err(DeletionError::InvalidTransition {
                state: DeletionState::Done,
                ..
            })
        ));
        assert!(gate.request_deletion().is_err());
    }

    #[tokio::test]
    async fn test_update_after_clear_is_refused() {
        let (store, manager, _restart, gate) = setup().await;
        gate.request_deletion().unwrap();
        gate.confirm().await.unwrap();

        assert!(manager
            .update(SettingsPatch::new().play_sound_on_new_message(true))
            .await
            .is_err());
        assert!(store.snapshot().is_none());
    }
}
