//! Publish/subscribe abstraction over the change-notification bus.

use crate::events::{LocalBus, NatsBus};
use bytes::Bytes;
use futures_util::FutureExt;
use futures_util::stream::{BoxStream, StreamExt, select_all};
use std::fmt;

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BusMessage {
    pub subject: String,
    pub payload: Bytes,
}

#[derive(Debug, thiserror::Error)]
pub enum BusError {
    #[error("failed to connect to the bus: {0}")]
    Connect(#[source] BoxError),

    #[error("failed to publish on {subject}: {source}")]
    Publish {
        subject: String,
        #[source]
        source: BoxError,
    },

    #[error("failed to subscribe to {pattern}: {source}")]
    Subscribe {
        pattern: String,
        #[source]
        source: BoxError,
    },
}

/// A live subscription.
///
/// Dropping it releases the subscription on the bus.
pub struct Subscription {
    patterns: Vec<String>,
    messages: BoxStream<'static, BusMessage>,
}

impl Subscription {
    pub fn new(pattern: String, messages: BoxStream<'static, BusMessage>) -> Self {
        Self {
            patterns: vec![pattern],
            messages,
        }
    }

    /// One subscription fed by all of `subscriptions`.
    pub fn merge(subscriptions: impl IntoIterator<Item = Subscription>) -> Self {
        let (patterns, streams): (Vec<_>, Vec<_>) = subscriptions
            .into_iter()
            .map(|s| (s.patterns, s.messages))
            .unzip();
        Self {
            patterns: patterns.into_iter().flatten().collect(),
            messages: select_all(streams).boxed(),
        }
    }

    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }

    /// Wait for the next notification. `None` when the bus closed the
    /// subscription. Cancel safe.
    pub async fn recv(&mut self) -> Option<BusMessage> {
        self.messages.next().await
    }

    /// Discard every notification that is already queued and return how
    /// many were dropped.
    ///
    /// Polls outside the task's coop budget, otherwise the receiver reports
    /// an empty queue once the budget runs out.
    pub fn drain_ready(&mut self) -> usize {
        let mut drained = 0;
        while let Some(Some(_)) = tokio::task::unconstrained(self.messages.next()).now_or_never() {
            drained += 1;
        }
        drained
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("patterns", &self.patterns)
            .finish_non_exhaustive()
    }
}

pub trait EventBus: Send + Sync {
    fn publish(
        &self,
        subject: String,
        payload: Bytes,
    ) -> impl Future<Output = Result<(), BusError>> + Send;

    fn subscribe(
        &self,
        pattern: String,
    ) -> impl Future<Output = Result<Subscription, BusError>> + Send;
}

/// The bus selected at startup.
#[derive(Clone)]
pub enum Bus {
    Local(LocalBus),
    Nats(NatsBus),
}

impl EventBus for Bus {
    async fn publish(&self, subject: String, payload: Bytes) -> Result<(), BusError> {
        match self {
            Bus::Local(bus) => bus.publish(subject, payload).await,
            Bus::Nats(bus) => bus.publish(subject, payload).await,
        }
    }

    async fn subscribe(&self, pattern: String) -> Result<Subscription, BusError> {
        match self {
            Bus::Local(bus) => bus.subscribe(pattern).await,
            Bus::Nats(bus) => bus.subscribe(pattern).await,
        }
    }
}
