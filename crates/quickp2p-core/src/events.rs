use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::models::SettingsRecord;

/// What caused a settings change
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeCause {
    /// Field-by-field update from the UI
    Updated,
    /// Whole-record replacement, e.g. a profile import
    Replaced,
}

/// Published to every subscriber after a change has been persisted
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettingsChange {
    pub previous: SettingsRecord,
    pub current: SettingsRecord,
    pub cause: ChangeCause,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

type Listener = Arc<dyn Fn(&SettingsChange) -> anyhow::Result<()> + Send + Sync>;

#[derive(Clone)]
enum Subscriber {
    Callback(Listener),
    /// Dropped from the registry once its receiver hangs up
    Channel(Sender<SettingsChange>),
}

/// Subscriber registry. Listeners run in subscription order and are isolated
/// from each other: an error or panic is logged and the next one still runs.
#[derive(Default)]
pub(crate) struct Observers {
    next_id: AtomicU64,
    subscribers: RwLock<Vec<(SubscriptionId, Subscriber)>>,
}

impl Observers {
    pub(crate) fn subscribe<F>(&self, listener: F) -> SubscriptionId
    where
        F: Fn(&SettingsChange) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.register(Subscriber::Callback(Arc::new(listener)))
    }

    /// Forward changes into a channel instead of a callback
    pub(crate) fn subscribe_channel(&self) -> (SubscriptionId, Receiver<SettingsChange>) {
        let (tx, rx) = mpsc::channel();
        (self.register(Subscriber::Channel(tx)), rx)
    }

    fn register(&self, subscriber: Subscriber) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::SeqCst));
        self.subscribers.write().push((id, subscriber));
        id
    }

    /// Returns false if the id was not subscribed
    pub(crate) fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut subscribers = self.subscribers.write();
        let before = subscribers.len();
        subscribers.retain(|(existing, _)| *existing != id);
        subscribers.len() != before
    }

    pub(crate) fn len(&self) -> usize {
        self.subscribers.read().len()
    }

    pub(crate) fn notify(&self, change: &SettingsChange) {
        // Snapshot so listeners may (un)subscribe while being notified
        let subscribers: Vec<(SubscriptionId, Subscriber)> = self.subscribers.read().clone();
        let mut disconnected = Vec::new();

        for (id, subscriber) in subscribers {
            match subscriber {
                Subscriber::Callback(listener) => {
                    match catch_unwind(AssertUnwindSafe(|| listener(change))) {
                        Ok(Ok(())) => {}
                        Ok(Err(e)) => {
                            tracing::warn!("settings listener {:?} failed: {:#}", id, e);
                        }
                        Err(_) => {
                            tracing::warn!("settings listener {:?} panicked", id);
                        }
                    }
                }
                Subscriber::Channel(tx) => {
                    if tx.send(change.clone()).is_err() {
                        disconnected.push(id);
                    }
                }
            }
        }

        if !disconnected.is_empty() {
            tracing::debug!("settings: dropping {} closed change channel(s)", disconnected.len());
            self.subscribers
                .write()
                .retain(|(id, _)| !disconnected.contains(id));
        }
    }
}
