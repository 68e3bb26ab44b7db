use std::path::{Path, PathBuf};

use crate::constants::{env, APP_DIR_NAME, FALLBACK_DATA_DIR};
use crate::notification::NotificationPermission;

/// Where the profile lives
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    /// `settings.json` inside `data_dir`
    File,
    /// Process memory only; nothing survives exit
    Memory,
}

#[derive(Debug, Clone)]
pub struct ProfileConfig {
    pub data_dir: PathBuf,
    pub storage: StorageBackend,
    /// Answer of the notification permission prompt on hosts without one
    pub notification_answer: NotificationPermission,
}

impl ProfileConfig {
    pub fn new<P: AsRef<Path>>(data_dir: P) -> Self {
        Self {
            data_dir: data_dir.as_ref().to_path_buf(),
            storage: StorageBackend::File,
            notification_answer: NotificationPermission::Granted,
        }
    }

    pub fn ephemeral() -> Self {
        Self {
            storage: StorageBackend::Memory,
            ..Self::default()
        }
    }

    /// Defaults with `QUICKP2P_DATA_DIR` and `QUICKP2P_NOTIFICATIONS` applied
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(dir) = std::env::var(env::DATA_DIR) {
            if !dir.trim().is_empty() {
                config.data_dir = PathBuf::from(dir);
            }
        }
        if let Ok(answer) = std::env::var(env::NOTIFICATIONS) {
            match answer.parse() {
                Ok(answer) => config.notification_answer = answer,
                Err(e) => tracing::warn!("ignoring {}: {}", env::NOTIFICATIONS, e),
            }
        }
        config
    }

    pub fn with_storage(mut self, storage: StorageBackend) -> Self {
        self.storage = storage;
        self
    }

    pub fn with_notification_answer(mut self, answer: NotificationPermission) -> Self {
        self.notification_answer = answer;
        self
    }
}

impl Default for ProfileConfig {
    fn default() -> Self {
        let data_dir = dirs::data_dir()
            .map(|dir| dir.join(APP_DIR_NAME))
            .unwrap_or_else(|| PathBuf::from(FALLBACK_DATA_DIR));
        Self::new(data_dir)
    }
}
