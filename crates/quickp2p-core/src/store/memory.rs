use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;

use super::{PersistedStore, StorageError};
use crate::deletion::ClearPermit;
use crate::models::SettingsRecord;

/// In-process store for ephemeral profiles.
///
/// Writes and clears can be made to fail on demand, and both are counted, so
/// hosts can exercise their error paths without a real disk.
#[derive(Debug, Default)]
pub struct MemoryStore {
    record: Mutex<Option<SettingsRecord>>,
    fail_writes: AtomicBool,
    fail_clears: AtomicBool,
    writes: AtomicUsize,
    clears: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store that already holds a persisted profile
    pub fn with_record(record: SettingsRecord) -> Self {
        let store = Self::default();
        *store.record.lock() = Some(record);
        store
    }

    /// What is currently persisted, bypassing the async interface
    pub fn snapshot(&self) -> Option<SettingsRecord> {
        self.record.lock().clone()
    }

    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_clears(&self, fail: bool) {
        self.fail_clears.store(fail, Ordering::SeqCst);
    }

    /// Number of successful writes
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// Number of clear attempts, failed ones included
    pub fn clear_count(&self) -> usize {
        self.clears.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PersistedStore for MemoryStore {
    async fn read(&self) -> Result<Option<SettingsRecord>, StorageError> {
        Ok(self.snapshot())
    }

    async fn write(&self, record: &SettingsRecord) -> Result<(), StorageError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StorageError::Unavailable("writes are disabled".to_string()));
        }
        *self.record.lock() = Some(record.clone());
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn clear(&self, _permit: &ClearPermit) -> Result<(), StorageError> {
        self.clears.fetch_add(1, Ordering::SeqCst);
        if self.fail_clears.load(Ordering::SeqCst) {
            return Err(StorageError::Unavailable("clear is disabled".to_string()));
        }
        *self.record.lock() = None;
        Ok(())
    }
}
