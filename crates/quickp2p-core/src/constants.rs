//! Application-wide constants
//!
//! Centralized location for file names, limits and default preference
//! values that are used across multiple modules.

/// Directory name under the platform data dir that holds the local profile
pub const APP_DIR_NAME: &str = "quickp2p";

/// Fallback profile directory when the platform data dir is unknown
pub const FALLBACK_DATA_DIR: &str = "quickp2p_data";

/// File holding the persisted settings record inside the profile directory
pub const SETTINGS_FILE_NAME: &str = "settings.json";

/// Suggested file name for profile exports
pub const EXPORT_FILE_NAME: &str = "quickp2p-profile.json";

/// Largest import payload accepted, in bytes
pub const MAX_IMPORT_BYTES: usize = 64 * 1024;

/// Longest accepted custom username, in characters
pub const MAX_USERNAME_CHARS: usize = 64;

/// Prefix of the placeholder display name derived from the user id
pub const DISPLAY_NAME_PREFIX: &str = "peer-";

// Environment overrides
pub mod env {
    /// Overrides the profile directory
    pub const DATA_DIR: &str = "QUICKP2P_DATA_DIR";
    /// Enables DEBUG file logging to the given path
    pub const LOG_FILE: &str = "QUICKP2P_LOG_FILE";
    /// Answer given when notification permission is requested
    /// (`granted`, `denied` or `default`)
    pub const NOTIFICATIONS: &str = "QUICKP2P_NOTIFICATIONS";
}

// Preference defaults for a freshly synthesized profile
pub mod defaults {
    pub const PLAY_SOUND_ON_NEW_MESSAGE: bool = false;
    pub const SHOW_NOTIFICATION_ON_NEW_MESSAGE: bool = false;
    pub const SHOW_ACTIVE_TYPING_STATUS: bool = true;
}
