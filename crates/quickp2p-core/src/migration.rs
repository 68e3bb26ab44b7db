//! Forward migration of persisted and exported settings.
//!
//! Both the file store and the portability codec wrap the record in an
//! envelope carrying `schemaVersion`. Older records are upgraded one version at
//! a time by filling in the fields that version introduced; nothing is ever
//! removed or rewritten, so a migration is deterministic.
//!
//! # Version history
//! - v1: `userId`, `playSoundOnNewMessage`, `showNotificationOnNewMessage`,
//!   `colorMode`
//! - v2: adds `showActiveTypingStatus` and `customUsername`

use serde_json::{Map, Value};

use crate::constants::defaults;

/// Increment whenever `SettingsRecord` gains a field, and append the matching
/// step to [`UPGRADE_STEPS`].
pub const CURRENT_SCHEMA_VERSION: u32 = 2;

/// Oldest version that can still be migrated forward
pub const OLDEST_SCHEMA_VERSION: u32 = 1;

type UpgradeStep = fn(&mut Map<String, Value>);

/// `UPGRADE_STEPS[n]` upgrades a record from version `n + 1` to `n + 2`
const UPGRADE_STEPS: &[UpgradeStep] = &[upgrade_v1_to_v2];

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MigrationError {
    #[error("schema version {found} is newer than the supported version {supported}")]
    TooNew { found: u32, supported: u32 },
    #[error("schema version {0} is not a known version")]
    Unknown(u32),
    #[error("record is not a JSON object")]
    NotAnObject,
}

/// Bring `record`, written at `version`, up to [`CURRENT_SCHEMA_VERSION`].
pub fn migrate(version: u32, record: Value) -> Result<Value, MigrationError> {
    if version > CURRENT_SCHEMA_VERSION {
        return Err(MigrationError::TooNew {
            found: version,
            supported: CURRENT_SCHEMA_VERSION,
        });
    }
    if version < OLDEST_SCHEMA_VERSION {
        return Err(MigrationError::Unknown(version));
    }

    let Value::Object(mut fields) = record else {
        return Err(MigrationError::NotAnObject);
    };

    let first = (version - OLDEST_SCHEMA_VERSION) as usize;
    for step in &UPGRADE_STEPS[first..] {
        step(&mut fields);
    }

    if version < CURRENT_SCHEMA_VERSION {
        tracing::debug!(
            "migration: upgraded settings record from v{} to v{}",
            version,
            CURRENT_SCHEMA_VERSION
        );
    }

    Ok(Value::Object(fields))
}

fn upgrade_v1_to_v2(fields: &mut Map<String, Value>) {
    fields
        .entry("showActiveTypingStatus")
        .or_insert(Value::Bool(defaults::SHOW_ACTIVE_TYPING_STATUS));
    fields.entry("customUsername").or_insert(Value::Null);
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_steps_cover_every_version() {
        assert_eq!(
            UPGRADE_STEPS.len() as u32,
            CURRENT_SCHEMA_VERSION - OLDEST_SCHEMA_VERSION
        );
    }

    #[test]
    fn test_current_version_passes_through() {
        let record = json!({"colorMode": "dark", "showActiveTypingStatus": false});
        let migrated = migrate(CURRENT_SCHEMA_VERSION, record.clone()).unwrap();
        assert_eq!(migrated, record);
    }

    #[test]
    fn test_v1_gets_defaulted_fields() {
        let record = json!({
            "userId": "6f1c1d0e-4b7a-4f3e-9d2a-1c2b3d4e5f60",
            "playSoundOnNewMessage": true,
            "showNotificationOnNewMessage": false,
            "colorMode": "dark"
        });
        let migrated = migrate(1, record).unwrap();
        assert_eq!(migrated["showActiveTypingStatus"], true);
        assert!(migrated["customUsername"].is_null());
        assert_eq!(migrated["playSoundOnNewMessage"], true);
        assert_eq!(migrated["colorMode"], "dark");
    }

    #[test]
    fn test_v1_keeps_fields_already_present() {
        let record = json!({"showActiveTypingStatus": false});
        let migrated = migrate(1, record).unwrap();
        assert_eq!(migrated["showActiveTypingStatus"], false);
    }

    #[test]
    fn test_rejects_newer_and_unknown_versions() {
        assert_eq!(
            migrate(CURRENT_SCHEMA_VERSION + 1, json!({})),
            Err(MigrationError::TooNew {
                found: CURRENT_SCHEMA_VERSION + 1,
                supported: CURRENT_SCHEMA_VERSION,
            })
        );
        assert_eq!(migrate(0, json!({})), Err(MigrationError::Unknown(0)));
    }

    #[test]
    fn test_rejects_non_object() {
        assert_eq!(migrate(1, json!([1, 2])), Err(MigrationError::NotAnObject));
    }
}
