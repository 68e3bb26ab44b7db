pub mod file_store;
pub mod memory;

use async_trait::async_trait;

use crate::deletion::ClearPermit;
use crate::models::SettingsRecord;

pub use file_store::JsonFileStore;
pub use memory::MemoryStore;

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("storage I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("settings could not be encoded: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("stored settings are unreadable: {0}")]
    Corrupt(String),

    #[error("stored profile was written by a newer version (schema {found}, this version supports up to {supported})")]
    TooNew { found: u64, supported: u32 },

    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

/// Durable home of the settings record.
///
/// Implementations must make `write` crash-safe at the granularity of a
/// single call: after a crash the store holds either the old or the new
/// record, never a mix. `clear` can only be reached through the
/// [`crate::deletion::DeletionGate`], which is the only place a
/// [`ClearPermit`] is minted.
#[async_trait]
pub trait PersistedStore: Send + Sync {
    /// `Ok(None)` when no profile has been persisted yet
    async fn read(&self) -> Result<Option<SettingsRecord>, StorageError>;

    async fn write(&self, record: &SettingsRecord) -> Result<(), StorageError>;

    /// Remove all local profile data
    async fn clear(&self, permit: &ClearPermit) -> Result<(), StorageError>;
}
