use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::models::SettingsRecord;

/// Runtime capability granted by the OS or browser. Never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationPermission {
    Granted,
    Denied,
    /// Not asked yet
    #[default]
    Default,
}

impl fmt::Display for NotificationPermission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            NotificationPermission::Granted => "granted",
            NotificationPermission::Denied => "denied",
            NotificationPermission::Default => "default",
        };
        f.write_str(name)
    }
}

impl FromStr for NotificationPermission {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "granted" => Ok(NotificationPermission::Granted),
            "denied" => Ok(NotificationPermission::Denied),
            "default" => Ok(NotificationPermission::Default),
            other => Err(format!(
                "unknown notification permission '{}' (expected granted, denied or default)",
                other
            )),
        }
    }
}

#[async_trait]
pub trait NotificationService: Send + Sync {
    fn permission(&self) -> NotificationPermission;

    /// Ask for permission if it has not been decided yet
    async fn request_permission(&self) -> NotificationPermission;
}

/// Whether new-message notifications are actually shown: the stored toggle
/// only takes effect once permission is granted.
pub fn notifications_effective(record: &SettingsRecord, permission: NotificationPermission) -> bool {
    permission == NotificationPermission::Granted && record.show_notification_on_new_message
}

/// Permission source with a fixed answer, for hosts without a permission
/// prompt (terminals, tests). Starts undecided; the first request resolves
/// it to the configured answer.
#[derive(Debug)]
pub struct StaticNotificationService {
    permission: RwLock<NotificationPermission>,
    answer: NotificationPermission,
}

impl StaticNotificationService {
    pub fn new(answer: NotificationPermission) -> Self {
        Self {
            permission: RwLock::new(NotificationPermission::Default),
            answer,
        }
    }
}

#[async_trait]
impl NotificationService for StaticNotificationService {
    fn permission(&self) -> NotificationPermission {
        *self.permission.read()
    }

    async fn request_permission(&self) -> NotificationPermission {
        let mut permission = self.permission.write();
        if *permission == NotificationPermission::Default {
            *permission = self.answer;
            tracing::debug!("notifications: permission resolved to {}", self.answer);
        }
        *permission
    }
}
