//! Local profile core: persisted preferences, portable export/import and the
//! gated destructive reset.

pub mod config;
pub mod constants;
pub mod deletion;
pub mod events;
pub mod manager;
pub mod migration;
pub mod models;
pub mod notification;
pub mod portability;
pub mod runtime;
pub mod store;
pub mod tracing_setup;

pub use config::{ProfileConfig, StorageBackend};
pub use deletion::{DeletionError, DeletionGate, DeletionState, RestartTrigger};
pub use events::{ChangeCause, SettingsChange, SubscriptionId};
pub use manager::{SettingsError, SettingsManager};
pub use models::{ColorMode, SettingsPatch, SettingsRecord};
pub use notification::{notifications_effective, NotificationPermission, NotificationService};
pub use portability::{ImportError, ImportRejection, ImportValidationError, Payload, PortabilityCodec};
pub use runtime::{open_store, ProfileRuntime, RestartSignal};
pub use store::{PersistedStore, StorageError};
