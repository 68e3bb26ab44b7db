pub mod settings;

pub use settings::{ColorMode, RecordError, SettingsPatch, SettingsRecord};
