//! NATS-backed bus for multi-instance deployments.

use crate::events::bus::{BusError, BusMessage, EventBus, Subscription};
use bytes::Bytes;
use futures_util::StreamExt;
use tracing::{debug, info};

#[derive(Clone)]
pub struct NatsBus {
    client: async_nats::Client,
}

impl NatsBus {
    /// Connect with a bounded per-subscription queue.
    ///
    /// A slow session whose queue is full loses notifications instead of
    /// growing memory; it still re-fetches on the ones it does receive.
    pub async fn connect(url: &str, subscription_capacity: usize) -> Result<Self, BusError> {
        let client = async_nats::ConnectOptions::new()
            .subscription_capacity(subscription_capacity)
            .connect(url)
            .await
            .map_err(|e| BusError::Connect(Box::new(e)))?;
        info!(%url, subscription_capacity, "Connected to NATS");
        Ok(Self { client })
    }
}

impl EventBus for NatsBus {
    async fn publish(&self, subject: String, payload: Bytes) -> Result<(), BusError> {
        self.client
            .publish(subject.clone(), payload)
            .await
            .map_err(|e| BusError::Publish {
                subject: subject.clone(),
                source: Box::new(e),
            })?;
        // The client buffers publishes; flushing surfaces connection loss
        // to the caller.
        self.client
            .flush()
            .await
            .map_err(|e| BusError::Publish {
                subject: subject.clone(),
                source: Box::new(e),
            })?;
        debug!(%subject, "Published on NATS");
        Ok(())
    }

    async fn subscribe(&self, pattern: String) -> Result<Subscription, BusError> {
        let subscriber = self
            .client
            .subscribe(pattern.clone())
            .await
            .map_err(|e| BusError::Subscribe {
                pattern: pattern.clone(),
                source: Box::new(e),
            })?;
        let messages = subscriber
            .map(|message| BusMessage {
                subject: message.subject.to_string(),
                payload: message.payload,
            })
            .boxed();
        Ok(Subscription::new(pattern, messages))
    }
}
