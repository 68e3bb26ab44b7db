use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::constants::{defaults, DISPLAY_NAME_PREFIX, MAX_USERNAME_CHARS};

/// Color theme of the client
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorMode {
    #[default]
    Light,
    Dark,
}

impl ColorMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ColorMode::Light => "light",
            ColorMode::Dark => "dark",
        }
    }
}

impl fmt::Display for ColorMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ColorMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "light" => Ok(ColorMode::Light),
            "dark" => Ok(ColorMode::Dark),
            other => Err(format!("unknown color mode '{}' (expected light or dark)", other)),
        }
    }
}

/// Reasons a settings record is rejected before it is persisted
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RecordError {
    #[error("custom username must not be blank")]
    BlankUsername,
    #[error("custom username is {len} characters, the limit is {max}")]
    UsernameTooLong { len: usize, max: usize },
}

/// All user preferences of the local profile plus the identity they belong to.
///
/// This is the sole persisted entity. The schema version is not stored on the
/// record itself; it travels in the envelopes written by the stores and by the
/// portability codec (see [`crate::migration`]).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct SettingsRecord {
    /// Identity the display name is derived from. Replaced only by import or reset.
    pub user_id: Uuid,
    /// Name chosen by the user, shown instead of the derived one
    pub custom_username: Option<String>,
    pub play_sound_on_new_message: bool,
    /// Stored independently of the runtime notification permission
    pub show_notification_on_new_message: bool,
    /// Disabling this also hides our own typing status from peers
    pub show_active_typing_status: bool,
    pub color_mode: ColorMode,
}

impl SettingsRecord {
    /// Synthesize the record of a brand new profile with a fresh identity
    pub fn new_profile() -> Self {
        Self::with_user_id(Uuid::new_v4())
    }

    /// Default preferences bound to an existing identity
    pub fn with_user_id(user_id: Uuid) -> Self {
        Self {
            user_id,
            custom_username: None,
            play_sound_on_new_message: defaults::PLAY_SOUND_ON_NEW_MESSAGE,
            show_notification_on_new_message: defaults::SHOW_NOTIFICATION_ON_NEW_MESSAGE,
            show_active_typing_status: defaults::SHOW_ACTIVE_TYPING_STATUS,
            color_mode: ColorMode::default(),
        }
    }

    pub fn validate(&self) -> Result<(), RecordError> {
        if let Some(name) = &self.custom_username {
            let trimmed = name.trim();
            if trimmed.is_empty() {
                return Err(RecordError::BlankUsername);
            }
            let len = trimmed.chars().count();
            if len > MAX_USERNAME_CHARS {
                return Err(RecordError::UsernameTooLong {
                    len,
                    max: MAX_USERNAME_CHARS,
                });
            }
        }
        Ok(())
    }

    /// Same record with the username trimmed, as `merged` stores it
    pub fn normalized(mut self) -> Self {
        if let Some(name) = self.custom_username.as_mut() {
            let trimmed = name.trim();
            if trimmed.len() != name.len() {
                *name = trimmed.to_string();
            }
        }
        self
    }

    /// Merge `patch` into a copy of this record. Fields the patch leaves unset
    /// keep their current value.
    pub fn merged(&self, patch: &SettingsPatch) -> Self {
        let mut next = self.clone();
        if let Some(name) = &patch.custom_username {
            next.custom_username = name.as_ref().map(|n| n.trim().to_string());
        }
        if let Some(value) = patch.play_sound_on_new_message {
            next.play_sound_on_new_message = value;
        }
        if let Some(value) = patch.show_notification_on_new_message {
            next.show_notification_on_new_message = value;
        }
        if let Some(value) = patch.show_active_typing_status {
            next.show_active_typing_status = value;
        }
        if let Some(mode) = patch.color_mode {
            next.color_mode = mode;
        }
        next
    }

    /// Name shown to peers: the custom username if set, otherwise a stable
    /// placeholder derived from the user id.
    pub fn display_name(&self) -> String {
        match &self.custom_username {
            Some(name) => name.clone(),
            None => {
                let simple = self.user_id.simple().to_string();
                format!("{}{}", DISPLAY_NAME_PREFIX, &simple[..8])
            }
        }
    }
}

impl Default for SettingsRecord {
    fn default() -> Self {
        Self::new_profile()
    }
}

/// Partial update of a [`SettingsRecord`]. `None` means "leave untouched".
///
/// `custom_username` is doubly optional: `Some(None)` clears the name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SettingsPatch {
    pub custom_username: Option<Option<String>>,
    pub play_sound_on_new_message: Option<bool>,
    pub show_notification_on_new_message: Option<bool>,
    pub show_active_typing_status: Option<bool>,
    pub color_mode: Option<ColorMode>,
}

impl SettingsPatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn custom_username(mut self, name: Option<String>) -> Self {
        self.custom_username = Some(name);
        self
    }

    pub fn play_sound_on_new_message(mut self, value: bool) -> Self {
        self.play_sound_on_new_message = Some(value);
        self
    }

    pub fn show_notification_on_new_message(mut self, value: bool) -> Self {
        self.show_notification_on_new_message = Some(value);
        self
    }

    pub fn show_active_typing_status(mut self, value: bool) -> Self {
        self.show_active_typing_status = Some(value);
        self
    }

    pub fn color_mode(mut self, mode: ColorMode) -> Self {
        self.color_mode = Some(mode);
        self
    }

    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}
