//! Portable profile export and import.
//!
//! An export is a pretty-printed JSON document:
//!
//! ```json
//! {
//!   "schemaVersion": 2,
//!   "record": { "colorMode": "dark", ... },
//!   "checksum": "<sha-256 hex of the compact record JSON>"
//! }
//! ```
//!
//! Record keys are emitted in sorted order, so exporting an unchanged record
//! always yields the same bytes and the checksum can be recomputed from any
//! parsed copy. The payload is not encrypted: it carries the user's identity,
//! and callers are expected to warn before it leaves the device.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::constants::MAX_IMPORT_BYTES;
use crate::manager::{SettingsError, SettingsManager};
use crate::migration::{self, MigrationError, CURRENT_SCHEMA_VERSION};
use crate::models::SettingsRecord;

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct Envelope {
    schema_version: u32,
    record: Value,
    checksum: String,
}

/// Serialized profile, ready to be saved to a file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Payload(Vec<u8>);

impl Payload {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Why an import was refused. The messages are meant for the user.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ImportRejection {
    #[error("the file is {size} bytes, larger than the {limit} byte limit")]
    TooLarge { size: usize, limit: usize },

    #[error("the file is not a profile export ({0})")]
    Malformed(String),

    #[error("the file is corrupted (checksum mismatch)")]
    ChecksumMismatch,

    #[error("the profile was exported by a newer version (schema {found}, this version supports up to {supported})")]
    UnsupportedVersion { found: u32, supported: u32 },

    #[error("schema version {0} is not recognized")]
    UnknownVersion(u32),

    #[error("the profile data is invalid ({0})")]
    InvalidRecord(String),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Profile import failed: {reason}")]
pub struct ImportValidationError {
    pub reason: ImportRejection,
}

impl From<ImportRejection> for ImportValidationError {
    fn from(reason: ImportRejection) -> Self {
        Self { reason }
    }
}

impl From<MigrationError> for ImportRejection {
    fn from(err: MigrationError) -> Self {
        match err {
            MigrationError::TooNew { found, supported } => {
                ImportRejection::UnsupportedVersion { found, supported }
            }
            MigrationError::Unknown(version) => ImportRejection::UnknownVersion(version),
            MigrationError::NotAnObject => {
                ImportRejection::InvalidRecord(MigrationError::NotAnObject.to_string())
            }
        }
    }
}

/// Failure of [`PortabilityCodec::import_into`]
#[derive(Debug, thiserror::Error)]
pub enum ImportError {
    #[error(transparent)]
    Validation(#[from] ImportValidationError),

    #[error(transparent)]
    Settings(#[from] SettingsError),
}

pub struct PortabilityCodec;

impl PortabilityCodec {
    pub fn export(record: &SettingsRecord) -> Result<Payload, serde_json::Error> {
        // Value objects keep their keys sorted, which pins the field order
        let record = serde_json::to_value(record)?;
        let envelope = Envelope {
            schema_version: CURRENT_SCHEMA_VERSION,
            checksum: checksum(&record),
            record,
        };
        Ok(Payload(serde_json::to_vec_pretty(&envelope)?))
    }

    /// Parse and validate an exported payload. Nothing is committed here.
    pub fn import(payload: &[u8]) -> Result<SettingsRecord, ImportValidationError> {
        if payload.len() > MAX_IMPORT_BYTES {
            return Err(ImportRejection::TooLarge {
                size: payload.len(),
                limit: MAX_IMPORT_BYTES,
            }
            .into());
        }

        let envelope: Envelope = serde_json::from_slice(payload)
            .map_err(|e| ImportRejection::Malformed(e.to_string()))?;

        if !envelope.checksum.eq_ignore_ascii_case(&checksum(&envelope.record)) {
            return Err(ImportRejection::ChecksumMismatch.into());
        }

        let record = migration::migrate(envelope.schema_version, envelope.record)
            .map_err(ImportRejection::from)?;
        let record = serde_json::from_value::<SettingsRecord>(record)
            .map_err(|e| ImportRejection::InvalidRecord(e.to_string()))?
            .normalized();
        record
            .validate()
            .map_err(|e| ImportRejection::InvalidRecord(e.to_string()))?;

        Ok(record)
    }

    /// Import `payload` and commit it as the new profile. The current profile
    /// is left untouched unless both validation and the write succeed.
    pub async fn import_into(
        manager: &SettingsManager,
        payload: &[u8],
    ) -> Result<SettingsRecord, ImportError> {
        let record = Self::import(payload)?;
        let committed = manager.replace(record).await?;
        tracing::info!("portability: imported profile {}", committed.user_id);
        Ok(committed)
    }
}

fn checksum(record: &Value) -> String {
    hex::encode(Sha256::digest(record.to_string().as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ColorMode, SettingsPatch};
    use crate::store::MemoryStore;
    use serde_json::json;
    use std::sync::Arc;

    fn sample() -> SettingsRecord {
        SettingsRecord::new_profile().merged(
            &SettingsPatch::new()
                .color_mode(ColorMode::Dark)
                .play_sound_on_new_message(true)
                .custom_username(Some("dana".to_string())),
        )
    }

    fn envelope_json(payload: &Payload) -> Value {
        serde_json::from_slice(payload.as_bytes()).unwrap()
    }

    fn encode(value: &Value) -> Vec<u8> {
        serde_json::to_vec_pretty(value).unwrap()
    }

    #[test]
    fn test_round_trip() {
        let record = sample();
        let payload = PortabilityCodec::export(&record).unwrap();
        assert_eq!(PortabilityCodec::import(payload.as_bytes()).unwrap(), record);
    }

    #[test]
    fn test_export_is_byte_identical() {
        let record = sample();
        let first = PortabilityCodec::export(&record).unwrap();
        let second = PortabilityCodec::export(&record.clone()).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_export_is_self_describing() {
        let payload = PortabilityCodec::export(&sample()).unwrap();
        let value = envelope_json(&payload);
        assert_eq!(value["schemaVersion"], CURRENT_SCHEMA_VERSION);
        assert_eq!(value["record"]["colorMode"], "dark");
        assert_eq!(value["checksum"].as_str().unwrap().len(), 64);
    }

    #[test]
    fn test_flipped_checksum_is_rejected() {
        let payload = PortabilityCodec::export(&sample()).unwrap();
        let mut value = envelope_json(&payload);
        let mut checksum = value["checksum"].as_str().unwrap().to_string();
        let flipped = if checksum.starts_with('0') { "1" } else { "0" };
        checksum.replace_range(0..1, flipped);
        value["checksum"] = json!(checksum);

        let err = PortabilityCodec::import(&encode(&value)).unwrap_err();
        assert_eq!(err.reason, ImportRejection::ChecksumMismatch);
    }

    #[test]
    fn test_tampered_record_is_rejected() {
        let payload = PortabilityCodec::export(&sample()).unwrap();
        let mut value = envelope_json(&payload);
        value["record"]["colorMode"] = json!("light");

        let err = PortabilityCodec::import(&encode(&value)).unwrap_err();
        assert_eq!(err.reason, ImportRejection::ChecksumMismatch);
    }

    #[test]
    fn test_key_order_does_not_matter() {
        let record = sample();
        let payload = PortabilityCodec::export(&record).unwrap();
        let value = envelope_json(&payload);
        // Rebuild with the envelope keys reversed
        let reordered = format!(
            r#"{{"checksum":{},"record":{},"schemaVersion":{}}}"#,
            value["checksum"], value["record"], value["schemaVersion"]
        );
        assert_eq!(PortabilityCodec::import(reordered.as_bytes()).unwrap(), record);
    }

    #[test]
    fn test_newer_version_is_rejected() {
        let payload = PortabilityCodec::export(&sample()).unwrap();
        let mut value = envelope_json(&payload);
        value["schemaVersion"] = json!(CURRENT_SCHEMA_VERSION + 1);

        let err = PortabilityCodec::import(&encode(&value)).unwrap_err();
        assert_eq!(
            err.reason,
            ImportRejection::UnsupportedVersion {
                found: CURRENT_SCHEMA_VERSION + 1,
                supported: CURRENT_SCHEMA_VERSION,
            }
        );
    }

    #[test]
    fn test_version_zero_is_rejected() {
        let payload = PortabilityCodec::export(&sample()).unwrap();
        let mut value = envelope_json(&payload);
        value["schemaVersion"] = json!(0);

        let err = PortabilityCodec::import(&encode(&value)).unwrap_err();
        assert_eq!(err.reason, ImportRejection::UnknownVersion(0));
    }

    #[test]
    fn test_v1_payload_is_migrated() {
        let record = json!({
            "colorMode": "dark",
            "playSoundOnNewMessage": true,
            "showNotificationOnNewMessage": true,
            "userId": "6f1c1d0e-4b7a-4f3e-9d2a-1c2b3d4e5f60"
        });
        let value = json!({
            "schemaVersion": 1,
            "checksum": checksum(&record),
            "record": record,
        });

        let imported = PortabilityCodec::import(&encode(&value)).unwrap();
        assert_eq!(imported.color_mode, ColorMode::Dark);
        assert!(imported.play_sound_on_new_message);
        assert!(imported.show_notification_on_new_message);
        assert!(imported.show_active_typing_status);
        assert!(imported.custom_username.is_none());
        assert_eq!(
            imported.user_id.to_string(),
            "6f1c1d0e-4b7a-4f3e-9d2a-1c2b3d4e5f60"
        );
    }

    #[test]
    fn test_missing_field_is_rejected() {
        let record = json!({
            "colorMode": "dark",
            "userId": "6f1c1d0e-4b7a-4f3e-9d2a-1c2b3d4e5f60"
        });
        let value = json!({
            "schemaVersion": CURRENT_SCHEMA_VERSION,
            "checksum": checksum(&record),
            "record": record,
        });

        let err = PortabilityCodec::import(&encode(&value)).unwrap_err();
        assert!(matches!(err.reason, ImportRejection::InvalidRecord(_)));
    }

    #[test]
    fn test_wrong_field_type_is_rejected() {
        let mut record = serde_json::to_value(sample()).unwrap();
        record["showActiveTypingStatus"] = json!("yes");
        let value = json!({
            "schemaVersion": CURRENT_SCHEMA_VERSION,
            "checksum": checksum(&record),
            "record": record,
        });

        let err = PortabilityCodec::import(&encode(&value)).unwrap_err();
        assert!(matches!(err.reason, ImportRejection::InvalidRecord(_)));
    }

    #[tokio::test]
    async fn test_imported_username_is_trimmed() {
        let mut record = serde_json::to_value(sample()).unwrap();
        record["customUsername"] = json!("  alice ");
        let value = json!({
            "schemaVersion": CURRENT_SCHEMA_VERSION,
            "checksum": checksum(&record),
            "record": record,
        });

        let parsed = PortabilityCodec::import(&encode(&value)).unwrap();
        assert_eq!(parsed.custom_username.as_deref(), Some("alice"));

        let store = Arc::new(MemoryStore::new());
        let manager = SettingsManager::init(store.clone()).await;
        PortabilityCodec::import_into(&manager, &encode(&value))
            .await
            .unwrap();
        assert_eq!(manager.get().custom_username.as_deref(), Some("alice"));
        assert_eq!(store.snapshot().unwrap().custom_username.as_deref(), Some("alice"));
    }

    #[test]
    fn test_garbage_and_oversized_input() {
        let err = PortabilityCodec::import(b"hello").unwrap_err();
        assert!(matches!(err.reason, ImportRejection::Malformed(_)));

        let big = vec![b' '; MAX_IMPORT_BYTES + 1];
        let err = PortabilityCodec::import(&big).unwrap_err();
        assert!(matches!(err.reason, ImportRejection::TooLarge { .. }));
    }

    #[test]
    fn test_error_message_is_readable() {
        let err = PortabilityCodec::import(b"{}").unwrap_err();
        assert!(err.to_string().starts_with("Profile import failed: the file is not a profile export"));
    }

    #[tokio::test]
    async fn test_import_onto_fresh_store() {
        let source = Arc::new(MemoryStore::new());
        let source_manager = SettingsManager::init(source).await;
        source_manager
            .update(SettingsPatch::new().color_mode(ColorMode::Dark))
            .await
            .unwrap();
        let exported = source_manager.get();
        let payload = PortabilityCodec::export(&exported).unwrap();

        let target = Arc::new(MemoryStore::new());
        let target_manager = SettingsManager::init(target.clone()).await;
        PortabilityCodec::import_into(&target_manager, payload.as_bytes())
            .await
            .unwrap();

        let imported = target_manager.get();
        assert!(!imported.play_sound_on_new_message);
        assert!(!imported.show_notification_on_new_message);
        assert!(imported.show_active_typing_status);
        assert_eq!(imported.color_mode, ColorMode::Dark);
        assert_eq!(imported, exported);
        assert_eq!(target.snapshot(), Some(exported));
    }

    #[tokio::test]
    async fn test_rejected_import_leaves_settings_untouched() {
        let store = Arc::new(MemoryStore::new());
        let manager = SettingsManager::init(store.clone()).await;
        let before = manager.get();

        let payload = PortabilityCodec::export(&sample()).unwrap();
        let mut value = envelope_json(&payload);
        value["checksum"] = json!("00");

        let err = PortabilityCodec::import_into(&manager, &encode(&value))
            .await
            .unwrap_err();
        assert!(matches!(err, ImportError::Validation(_)));
        assert_eq!(manager.get(), before);
        assert_eq!(store.snapshot(), Some(before));
    }

    #[tokio::test]
    async fn test_import_write_failure_keeps_settings() {
        let store = Arc::new(MemoryStore::new());
        let manager = SettingsManager::init(store.clone()).await;
        let before = manager.get();
        store.set_fail_writes(true);

        let payload = PortabilityCodec::export(&sample()).unwrap();
        let err = PortabilityCodec::import_into(&manager, payload.as_bytes())
            .await
            .unwrap_err();

        assert!(matches!(err, ImportError::Settings(SettingsError::StorageWrite(_))));
        assert_eq!(manager.get(), before);
    }
}
