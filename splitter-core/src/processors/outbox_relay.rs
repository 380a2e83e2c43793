//! Delivers committed outbox rows to the bus.
//!
//! Rows are published one at a time in id order and removed once
//! published. A failure stops the round so that later rows never overtake
//! an earlier one. Delivery is at-least-once: a row whose removal fails is
//! published again on the next round.

use crate::config::{ConfigWatcher, OutboxSettings};
use crate::entities::outbox::{FetchOutboxBatch, OutboxEvent, RemoveOutboxEvents};
use crate::events::{BusError, EventBus};
use crate::framework::DatabaseProcessor;
use bytes::Bytes;
use kanau::processor::Processor;
use std::sync::Arc;
use tokio::sync::{Notify, watch};
use tracing::{debug, error, info, warn};

/// Storage of pending outbox rows.
pub trait OutboxStore: Send + Sync {
    fn fetch_batch(
        &self,
        limit: u32,
    ) -> impl Future<Output = Result<Vec<OutboxEvent>, sqlx::Error>> + Send;

    fn remove(&self, ids: Vec<i64>) -> impl Future<Output = Result<u64, sqlx::Error>> + Send;
}

impl OutboxStore for DatabaseProcessor {
    async fn fetch_batch(&self, limit: u32) -> Result<Vec<OutboxEvent>, sqlx::Error> {
        self.process(FetchOutboxBatch { limit }).await
    }

    async fn remove(&self, ids: Vec<i64>) -> Result<u64, sqlx::Error> {
        self.process(RemoveOutboxEvents { ids }).await
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error("database error: {0}")]
    Store(#[from] sqlx::Error),

    #[error("failed to publish outbox event: {0}")]
    Publish(#[from] BusError),
}

pub struct OutboxRelay<S, B> {
    store: S,
    bus: B,
    wake: Arc<Notify>,
}

impl<S: OutboxStore, B: EventBus> OutboxRelay<S, B> {
    /// `wake` is notified by the cascade coordinator after each commit.
    pub fn new(store: S, bus: B, wake: Arc<Notify>) -> Self {
        Self { store, bus, wake }
    }

    /// Run until shutdown is signaled.
    ///
    /// A round starts on every wakeup, on every poll interval and on
    /// settings changes.
    pub async fn run(
        self,
        mut shutdown_rx: watch::Receiver<bool>,
        mut settings: ConfigWatcher<OutboxSettings>,
    ) {
        let mut current = settings.current();
        info!(
            poll_interval = ?current.poll_interval,
            batch_size = current.batch_size,
            "OutboxRelay started"
        );

        loop {
            match self.deliver_pending(current.batch_size).await {
                Ok(0) => {}
                Ok(delivered) => debug!(delivered, "Outbox round complete"),
                Err(RelayError::Publish(err)) => {
                    warn!(error = %err, "Outbox publish failed, retrying next round")
                }
                Err(RelayError::Store(err)) => error!(error = %err, "Outbox store failed"),
            }

            tokio::select! {
                biased;

                changed = shutdown_rx.changed() => {
                    if changed.is_err() || *shutdown_rx.borrow() {
                        info!("OutboxRelay received shutdown signal");
                        break;
                    }
                }

                Ok(()) = settings.changed() => {
                    current = settings.current();
                    info!(
                        poll_interval = ?current.poll_interval,
                        batch_size = current.batch_size,
                        "OutboxRelay reloaded settings"
                    );
                }

                _ = self.wake.notified() => {}

                _ = tokio::time::sleep(current.poll_interval) => {}
            }
        }

        info!("OutboxRelay shutdown complete");
    }

    /// Publish everything currently pending, `batch_size` rows at a time.
    /// Returns how many rows were published and removed.
    pub async fn deliver_pending(&self, batch_size: u32) -> Result<usize, RelayError> {
        let mut total = 0;
        loop {
            let batch = self.store.fetch_batch(batch_size.max(1)).await?;
            let fetched = batch.len();
            if fetched == 0 {
                return Ok(total);
            }

            let mut published = Vec::with_capacity(fetched);
            let mut failure = None;
            for event in batch {
                match self
                    .bus
                    .publish(event.subject, Bytes::from(event.payload))
                    .await
                {
                    Ok(()) => published.push(event.id),
                    Err(err) => {
                        failure = Some(err);
                        break;
                    }
                }
            }

            if !published.is_empty() {
                total += published.len();
                self.store.remove(published).await?;
            }
            if let Some(err) = failure {
                return Err(err.into());
            }
            if fetched < batch_size.max(1) as usize {
                return Ok(total);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cascade::CascadeDelete;
    use crate::config::{ConfigStore, PublishMode};
    use crate::entities::ResourceKind;
    use crate::events::SubjectRouter;
    use crate::testing::{FailingBus, MemoryStore};
    use std::time::Duration;

    fn store_with_categories(n: usize) -> MemoryStore {
        let store = MemoryStore::new();
        store.insert(ResourceKind::Group, &[("id", "grp-1"), ("currency_id", "cur-usd")]);
        for i in 0..n {
            let id = format!("cat-{i}");
            store.insert(ResourceKind::Category, &[("id", id.as_str()), ("group_id", "grp-1")]);
        }
        store
    }

    async fn queue_group_delete(store: &MemoryStore) -> Vec<String> {
        let router = SubjectRouter::new("splitter").unwrap();
        let cascade =
            CascadeDelete::new(store.clone(), FailingBus::new(), router, PublishMode::Outbox);
        cascade.delete(ResourceKind::Group, "grp-1").await.unwrap();
        store.outbox().into_iter().map(|e| e.subject).collect()
    }

    #[tokio::test]
    async fn test_delivers_in_id_order_and_removes() {
        let store = store_with_categories(4);
        let queued = queue_group_delete(&store).await;
        let bus = FailingBus::new();
        let relay = OutboxRelay::new(store.clone(), bus.clone(), Arc::new(Notify::new()));

        let delivered = relay.deliver_pending(2).await.unwrap();

        assert_eq!(delivered, 5);
        assert_eq!(bus.published(), queued);
        assert!(store.outbox().is_empty());
    }

    #[tokio::test]
    async fn test_failure_keeps_the_failed_row_and_everything_after() {
        let store = store_with_categories(2);
        let queued = queue_group_delete(&store).await;
        let bus = FailingBus::failing_on(&queued[1]);
        let relay = OutboxRelay::new(store.clone(), bus.clone(), Arc::new(Notify::new()));

        let err = relay.deliver_pending(10).await.unwrap_err();

        assert!(matches!(err, RelayError::Publish(_)));
        assert_eq!(bus.published(), vec![queued[0].clone()]);
        let remaining: Vec<String> = store.outbox().into_iter().map(|e| e.subject).collect();
        assert_eq!(remaining, queued[1..].to_vec());
    }

    #[tokio::test]
    async fn test_failed_round_is_retried() {
        let store = store_with_categories(2);
        let queued = queue_group_delete(&store).await;
        let bus = FailingBus::new();
        bus.fail_next(1);
        let relay = OutboxRelay::new(store.clone(), bus.clone(), Arc::new(Notify::new()));

        assert!(relay.deliver_pending(10).await.is_err());
        assert_eq!(relay.deliver_pending(10).await.unwrap(), queued.len());
        assert_eq!(bus.published(), queued);
    }

    #[tokio::test]
    async fn test_commit_wakes_running_relay() {
        let store = store_with_categories(1);
        let bus = FailingBus::new();
        let router = SubjectRouter::new("splitter").unwrap();
        let cascade = CascadeDelete::new(store.clone(), FailingBus::new(), router, PublishMode::Outbox);
        let settings = ConfigStore::new(OutboxSettings {
            poll_interval: Duration::from_secs(3600),
            batch_size: 10,
        });
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let relay = OutboxRelay::new(store.clone(), bus.clone(), cascade.relay_signal());
        let handle = tokio::spawn(relay.run(shutdown_rx, settings.subscribe()));

        cascade.delete(ResourceKind::Group, "grp-1").await.unwrap();

        tokio::time::timeout(Duration::from_secs(5), async {
            while bus.published().len() < 2 {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();
        assert!(store.outbox().is_empty());

        shutdown_tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .unwrap()
            .unwrap();
    }
}
