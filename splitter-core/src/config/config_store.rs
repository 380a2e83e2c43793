//! Reloadable settings with change notification.
//!
//! `ConfigStore<T>` keeps the current value inside a `watch` channel so that
//! readers always get the latest snapshot and long-running processors can
//! `await` a change instead of polling.

use std::sync::Arc;
use tokio::sync::watch;

/// A shared, reloadable settings value.
///
/// Cloning the store is cheap; all clones observe the same value.
pub struct ConfigStore<T> {
    tx: Arc<watch::Sender<T>>,
}

/// Receives notifications when a [`ConfigStore`] is updated.
pub struct ConfigWatcher<T> {
    rx: watch::Receiver<T>,
}

impl<T> ConfigStore<T> {
    pub fn new(initial: T) -> Self {
        let (tx, _) = watch::channel(initial);
        Self { tx: Arc::new(tx) }
    }

    /// Replace the stored value and wake every watcher.
    pub fn update(&self, value: T) {
        self.tx.send_replace(value);
    }

    pub fn subscribe(&self) -> ConfigWatcher<T> {
        ConfigWatcher {
            rx: self.tx.subscribe(),
        }
    }
}

impl<T: Clone> ConfigStore<T> {
    /// Snapshot of the current value.
    pub fn get(&self) -> T {
        self.tx.borrow().clone()
    }
}

impl<T> Clone for ConfigStore<T> {
    fn clone(&self) -> Self {
        Self {
            tx: Arc::clone(&self.tx),
        }
    }
}

impl<T> ConfigWatcher<T> {
    /// Wait until the store is updated.
    ///
    /// Returns `Err` once every [`ConfigStore`] clone has been dropped.
    pub async fn changed(&mut self) -> Result<(), watch::error::RecvError> {
        self.rx.changed().await
    }
}

impl<T: Clone> ConfigWatcher<T> {
    /// The value seen by the last [`changed`](Self::changed).
    pub fn current(&mut self) -> T {
        self.rx.borrow_and_update().clone()
    }
}
