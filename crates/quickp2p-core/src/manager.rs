//! Owner of the canonical in-memory settings record.
//!
//! Every mutation goes through one FIFO slot (`tokio::sync::Mutex` hands the
//! lock out in request order), is persisted first and only then becomes
//! visible through [`SettingsManager::get`] and to subscribers. A failed write
//! therefore leaves the in-memory record exactly as it was.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Receiver;
use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::Mutex;

use crate::deletion::ClearPermit;
use crate::events::{ChangeCause, Observers, SettingsChange, SubscriptionId};
use crate::models::{RecordError, SettingsPatch, SettingsRecord};
use crate::store::{PersistedStore, StorageError};

#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("failed to save settings: {0}")]
    StorageWrite(#[source] StorageError),

    #[error("invalid settings: {0}")]
    InvalidRecord(#[from] RecordError),

    #[error("profile data was deleted; restart required before settings can change")]
    ResetPending,

    #[error("the stored profile could not be loaded, so settings are read-only ({0})")]
    StoredProfileLocked(String),
}

pub struct SettingsManager {
    store: Arc<dyn PersistedStore>,
    current: RwLock<SettingsRecord>,
    mutation_slot: Mutex<()>,
    /// Set once the store has been cleared; only a rebuilt runtime may write again
    sealed: AtomicBool,
    /// Why the stored profile was left untouched at init, if it was
    locked: Option<String>,
    observers: Observers,
}

impl SettingsManager {
    /// Load the profile from `store`. Never fails.
    ///
    /// A default record is synthesized and persisted only when the store holds
    /// no profile. When the stored one cannot be read the default lives in
    /// memory only: a corrupt profile has already been set aside by the store,
    /// so later writes may proceed, but any other failure (a newer schema, an
    /// I/O error) locks the manager against writes until the next start.
    pub async fn init(store: Arc<dyn PersistedStore>) -> Self {
        let mut locked = None;
        let record = match store.read().await {
            Ok(Some(record)) => {
                tracing::info!("settings: loaded profile {}", record.user_id);
                record
            }
            Ok(None) => {
                tracing::info!("settings: no stored profile, creating one");
                Self::synthesize(store.as_ref()).await
            }
            Err(e @ StorageError::Corrupt(_)) => {
                tracing::warn!("settings: stored profile unreadable ({}), starting fresh", e);
                SettingsRecord::new_profile()
            }
            Err(e) => {
                tracing::warn!("settings: leaving stored profile untouched: {}", e);
                locked = Some(e.to_string());
                SettingsRecord::new_profile()
            }
        };

        Self {
            store,
            current: RwLock::new(record),
            mutation_slot: Mutex::new(()),
            sealed: AtomicBool::new(false),
            locked,
            observers: Observers::default(),
        }
    }

    async fn synthesize(store: &dyn PersistedStore) -> SettingsRecord {
        let record = SettingsRecord::new_profile();
        if let Err(e) = store.write(&record).await {
            // Still usable in memory; the next successful update persists it
            tracing::warn!("settings: failed to persist new profile: {}", e);
        }
        record
    }

    /// Current record. Does not wait on storage or on pending mutations.
    pub fn get(&self) -> SettingsRecord {
        self.current.read().clone()
    }

    /// Merge `patch` into the current record, persist it, then notify.
    ///
    /// An empty or no-op patch returns the current record without writing.
    pub async fn update(&self, patch: SettingsPatch) -> Result<SettingsRecord, SettingsError> {
        let _slot = self.mutation_slot.lock().await;
        self.ensure_writable()?;

        let previous = self.get();
        let next = previous.merged(&patch);
        if next == previous {
            return Ok(previous);
        }
        self.commit(previous, next, ChangeCause::Updated).await
    }

    /// Replace the whole record, with the same durability contract as `update`
    pub async fn replace(&self, record: SettingsRecord) -> Result<SettingsRecord, SettingsError> {
        let _slot = self.mutation_slot.lock().await;
        self.ensure_writable()?;

        let previous = self.get();
        self.commit(previous, record.normalized(), ChangeCause::Replaced)
            .await
    }

    /// Caller must hold the mutation slot
    async fn commit(
        &self,
        previous: SettingsRecord,
        next: SettingsRecord,
        cause: ChangeCause,
    ) -> Result<SettingsRecord, SettingsError> {
        next.validate()?;

        if let Err(e) = self.store.write(&next).await {
            tracing::warn!("settings: write failed, keeping previous record: {}", e);
            return Err(SettingsError::StorageWrite(e));
        }

        *self.current.write() = next.clone();
        tracing::debug!("settings: committed {:?} change", cause);

        self.observers.notify(&SettingsChange {
            previous,
            current: next.clone(),
            cause,
        });
        Ok(next)
    }

    fn ensure_writable(&self) -> Result<(), SettingsError> {
        if self.sealed.load(Ordering::SeqCst) {
            return Err(SettingsError::ResetPending);
        }
        if let Some(reason) = &self.locked {
            return Err(SettingsError::StoredProfileLocked(reason.clone()));
        }
        Ok(())
    }

    /// Clear the store while holding the mutation slot, so no update can land
    /// between the clear and the restart that follows it.
    pub(crate) async fn clear_storage(&self, permit: &ClearPermit) -> Result<(), StorageError> {
        let _slot = self.mutation_slot.lock().await;
        self.store.clear(permit).await?;
        self.sealed.store(true, Ordering::SeqCst);
        Ok(())
    }

    /// True after the profile was deleted and before the runtime is rebuilt
    pub fn is_sealed(&self) -> bool {
        self.sealed.load(Ordering::SeqCst)
    }

    /// True when a stored profile exists but could not be loaded
    pub fn is_locked(&self) -> bool {
        self.locked.is_some()
    }

    pub fn subscribe<F>(&self, listener: F) -> SubscriptionId
    where
        F: Fn(&SettingsChange) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.observers.subscribe(listener)
    }

    pub fn subscribe_channel(&self) -> (SubscriptionId, Receiver<SettingsChange>) {
        self.observers.subscribe_channel()
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.observers.unsubscribe(id)
    }
}
