//! Root state of the application.
//!
//! A [`ProfileRuntime`] is built once at startup and handed by reference to
//! whatever needs settings. A profile reset does not try to patch it: the gate
//! fires the runtime's [`RestartSignal`], the host drops the runtime and calls
//! [`ProfileRuntime::init`] again, which rebuilds settings and identity from
//! the now empty store.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::Notify;

use crate::config::{ProfileConfig, StorageBackend};
use crate::deletion::{DeletionGate, RestartTrigger};
use crate::manager::SettingsManager;
use crate::notification::{NotificationService, StaticNotificationService};
use crate::store::{JsonFileStore, MemoryStore, PersistedStore};

/// Restart requests raised by the deletion gate
#[derive(Debug, Clone, Default)]
pub struct RestartSignal {
    requests: Arc<AtomicUsize>,
    notify: Arc<Notify>,
}

impl RestartSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_requested(&self) -> bool {
        self.request_count() > 0
    }

    pub fn request_count(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }

    /// Resolves once a restart has been requested
    pub async fn requested(&self) {
        if self.is_requested() {
            return;
        }
        self.notify.notified().await;
    }
}

impl RestartTrigger for RestartSignal {
    fn request_restart(&self) {
        self.requests.fetch_add(1, Ordering::SeqCst);
        // notify_one stores a permit if nobody is waiting yet
        self.notify.notify_one();
    }
}

/// Open the store selected by `config`. Hold on to the returned handle across
/// restarts so a memory-backed profile is rebuilt from the same store.
pub fn open_store(config: &ProfileConfig) -> Arc<dyn PersistedStore> {
    match config.storage {
        StorageBackend::File => Arc::new(JsonFileStore::new(&config.data_dir)),
        StorageBackend::Memory => Arc::new(MemoryStore::new()),
    }
}

pub struct ProfileRuntime {
    config: ProfileConfig,
    settings: Arc<SettingsManager>,
    deletion: DeletionGate,
    notifications: Arc<dyn NotificationService>,
    restart: RestartSignal,
}

impl ProfileRuntime {
    pub async fn init(config: ProfileConfig) -> Self {
        let store = open_store(&config);
        Self::with_store(config, store).await
    }

    pub async fn with_store(config: ProfileConfig, store: Arc<dyn PersistedStore>) -> Self {
        let notifications: Arc<dyn NotificationService> =
            Arc::new(StaticNotificationService::new(config.notification_answer));
        Self::with_services(config, store, notifications).await
    }

    pub async fn with_services(
        config: ProfileConfig,
        store: Arc<dyn PersistedStore>,
        notifications: Arc<dyn NotificationService>,
    ) -> Self {
        let settings = Arc::new(SettingsManager::init(store).await);
        let restart = RestartSignal::new();
        let deletion = DeletionGate::new(settings.clone(), Arc::new(restart.clone()));

        tracing::info!(
            "runtime: profile {} ready ({:?} storage)",
            settings.get().display_name(),
            config.storage
        );

        Self {
            config,
            settings,
            deletion,
            notifications,
            restart,
        }
    }

    pub fn config(&self) -> &ProfileConfig {
        &self.config
    }

    pub fn settings(&self) -> Arc<SettingsManager> {
        self.settings.clone()
    }

    pub fn deletion(&self) -> &DeletionGate {
        &self.deletion
    }

    pub fn notifications(&self) -> Arc<dyn NotificationService> {
        self.notifications.clone()
    }

    pub fn restart_signal(&self) -> RestartSignal {
        self.restart.clone()
    }

    pub fn restart_requested(&self) -> bool {
        self.restart.is_requested()
    }
}
