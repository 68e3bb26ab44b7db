//! JSON file backed settings store.
//!
//! The record lives in `<profile_dir>/settings.json` inside a versioned
//! envelope. Writes go to a temp file which is then renamed over the real one,
//! so an interrupted write never leaves a half-written profile behind.
//!
//! The profile dir may be shared with other files, so the store only ever
//! touches the files it names itself. A profile that cannot be parsed is moved
//! to `settings.json.unreadable` before the error is reported; one written by
//! a newer schema is left exactly where it is.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::fs;

use super::{PersistedStore, StorageError};
use crate::constants::SETTINGS_FILE_NAME;
use crate::deletion::ClearPermit;
use crate::migration::{self, MigrationError, CURRENT_SCHEMA_VERSION};
use crate::models::SettingsRecord;

/// On-disk envelope. The record stays an untyped JSON value until it has been
/// migrated to the current schema.
#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredSettings {
    schema_version: u32,
    record: Value,
}

pub struct JsonFileStore {
    dir: PathBuf,
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new<P: AsRef<Path>>(profile_dir: P) -> Self {
        let dir = profile_dir.as_ref().to_path_buf();
        let path = dir.join(SETTINGS_FILE_NAME);
        Self { dir, path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Where an unparseable profile is moved aside
    pub fn unreadable_path(&self) -> PathBuf {
        self.path.with_extension("json.unreadable")
    }

    fn temp_path(&self) -> PathBuf {
        self.path.with_extension("json.tmp")
    }

    fn decode(contents: &[u8]) -> Result<SettingsRecord, StorageError> {
        let value: Value =
            serde_json::from_slice(contents).map_err(|e| StorageError::Corrupt(e.to_string()))?;

        // Checked before the envelope shape, which a newer version may change
        if let Some(found) = value.get("schemaVersion").and_then(Value::as_u64) {
            if found > u64::from(CURRENT_SCHEMA_VERSION) {
                return Err(StorageError::TooNew {
                    found,
                    supported: CURRENT_SCHEMA_VERSION,
                });
            }
        }

        let stored: StoredSettings =
            serde_json::from_value(value).map_err(|e| StorageError::Corrupt(e.to_string()))?;
        let record = migration::migrate(stored.schema_version, stored.record).map_err(|e| match e {
            MigrationError::TooNew { found, supported } => StorageError::TooNew {
                found: u64::from(found),
                supported,
            },
            other => StorageError::Corrupt(other.to_string()),
        })?;
        serde_json::from_value(record).map_err(|e| StorageError::Corrupt(e.to_string()))
    }

    async fn set_aside(&self) {
        let target = self.unreadable_path();
        match fs::rename(&self.path, &target).await {
            Ok(()) => tracing::warn!(
                "file_store: moved unreadable profile to {}",
                target.display()
            ),
            Err(e) => tracing::warn!(
                "file_store: could not move unreadable profile {}: {}",
                self.path.display(),
                e
            ),
        }
    }
}

async fn remove_if_present(path: &Path) -> Result<(), StorageError> {
    match fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

#[async_trait]
impl PersistedStore for JsonFileStore {
    async fn read(&self) -> Result<Option<SettingsRecord>, StorageError> {
        let contents = match fs::read(&self.path).await {
            Ok(contents) => contents,
            // No profile yet - not an error
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        match Self::decode(&contents) {
            Ok(record) => Ok(Some(record)),
            Err(e @ StorageError::Corrupt(_)) => {
                self.set_aside().await;
                Err(e)
            }
            Err(e) => Err(e),
        }
    }

    async fn write(&self, record: &SettingsRecord) -> Result<(), StorageError> {
        let stored = StoredSettings {
            schema_version: CURRENT_SCHEMA_VERSION,
            record: serde_json::to_value(record)?,
        };
        let json = serde_json::to_vec_pretty(&stored)?;

        fs::create_dir_all(&self.dir).await?;

        let temp = self.temp_path();
        fs::write(&temp, &json).await?;
        fs::rename(&temp, &self.path).await?;

        tracing::debug!("file_store: wrote {} bytes to {}", json.len(), self.path.display());
        Ok(())
    }

    async fn clear(&self, _permit: &ClearPermit) -> Result<(), StorageError> {
        for path in [self.path.clone(), self.temp_path(), self.unreadable_path()] {
            remove_if_present(&path).await?;
        }
        tracing::info!("file_store: removed profile files in {}", self.dir.display());
        Ok(())
    }
}
