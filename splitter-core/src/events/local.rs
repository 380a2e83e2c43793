//! In-process bus for single-instance deployments and tests.
//!
//! Each subscriber owns a bounded queue. When a queue is full the
//! notification is dropped for that subscriber only: a full queue already
//! guarantees a pending re-fetch, so nothing observable is lost.

use crate::events::bus::{BusError, BusMessage, EventBus, Subscription};
use crate::events::subject_matches;
use bytes::Bytes;
use futures_util::Stream;
use futures_util::StreamExt;
use std::collections::HashMap;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::task::{Context, Poll};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, warn};

/// Queue capacity of every local subscriber.
pub const DEFAULT_SUBSCRIBER_BUFFER: usize = 256;

#[derive(Clone, Default)]
pub struct LocalBus {
    registry: Arc<Registry>,
}

#[derive(Default)]
struct Registry {
    next_id: AtomicU64,
    subscribers: Mutex<HashMap<u64, LocalSubscriber>>,
}

struct LocalSubscriber {
    pattern: String,
    tx: mpsc::Sender<BusMessage>,
}

impl Registry {
    fn subscribers(&self) -> MutexGuard<'_, HashMap<u64, LocalSubscriber>> {
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

/// Receiving half handed out by [`LocalBus::subscribe`]. Unregisters on drop.
struct LocalStream {
    id: u64,
    registry: Arc<Registry>,
    rx: ReceiverStream<BusMessage>,
}

impl Stream for LocalStream {
    type Item = BusMessage;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<BusMessage>> {
        self.rx.poll_next_unpin(cx)
    }
}

impl Drop for LocalStream {
    fn drop(&mut self) {
        self.registry.subscribers().remove(&self.id);
    }
}

impl LocalBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live subscriptions.
    pub fn subscriber_count(&self) -> usize {
        self.registry.subscribers().len()
    }
}

impl EventBus for LocalBus {
    async fn publish(&self, subject: String, payload: Bytes) -> Result<(), BusError> {
        let subscribers = self.registry.subscribers();
        let mut delivered = 0usize;
        for subscriber in subscribers.values() {
            if !subject_matches(&subscriber.pattern, &subject) {
                continue;
            }
            let message = BusMessage {
                subject: subject.clone(),
                payload: payload.clone(),
            };
            match subscriber.tx.try_send(message) {
                Ok(()) => delivered += 1,
                Err(TrySendError::Full(_)) => {
                    warn!(
                        %subject,
                        pattern = %subscriber.pattern,
                        "Subscriber queue full, dropping notification"
                    );
                }
                Err(TrySendError::Closed(_)) => {}
            }
        }
        debug!(%subject, delivered, "Published on local bus");
        Ok(())
    }

    async fn subscribe(&self, pattern: String) -> Result<Subscription, BusError> {
        let (tx, rx) = mpsc::channel(DEFAULT_SUBSCRIBER_BUFFER);
        let id = self.registry.next_id.fetch_add(1, Ordering::Relaxed);
        self.registry.subscribers().insert(
            id,
            LocalSubscriber {
                pattern: pattern.clone(),
                tx,
            },
        );
        let stream = LocalStream {
            id,
            registry: Arc::clone(&self.registry),
            rx: ReceiverStream::new(rx),
        };
        Ok(Subscription::new(pattern, stream.boxed()))
    }
}
