use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use quickp2p_core::{NotificationPermission, ProfileConfig, StorageBackend};
use serde::{Deserialize, Serialize};

/// CLI configuration that can be loaded from a JSON file
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct CliConfig {
    /// Profile directory
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<PathBuf>,

    /// Keep the profile in memory only
    #[serde(default)]
    pub ephemeral: bool,

    /// Answer to the notification permission prompt
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notifications: Option<NotificationPermission>,
}

impl CliConfig {
    /// Load config from a JSON file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: CliConfig = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        Ok(config)
    }

    /// Layer this file config over the environment defaults
    pub fn into_profile_config(self) -> ProfileConfig {
        let mut config = ProfileConfig::from_env();
        if let Some(dir) = self.data_dir {
            config.data_dir = dir;
        }
        if self.ephemeral {
            config.storage = StorageBackend::Memory;
        }
        if let Some(answer) = self.notifications {
            config.notification_answer = answer;
        }
        config
    }
}
