//! Long-lived notification streams.
//!
//! A session subscribes to the bus, sends the current value, then keeps
//! the client current: every burst of notifications becomes one re-fetch
//! and one frame, and a `still_alive` frame is sent when nothing changed
//! for a heartbeat period. The bus subscription is owned by the session and
//! released on every exit path.

mod derived;
mod exchange_rate;
mod resource;

pub use derived::DerivedStream;
pub use exchange_rate::{ExchangeRateSource, exchange_rate_patterns};
pub use resource::ResourceStream;

use crate::events::BusError;
use crate::rates::RateError;
use splitter_sdk::objects::{ExchangeRateUpdate, IdSetUpdate, ResourceUpdate};
use tokio::sync::mpsc;

/// Why a session ended early.
#[derive(Debug, thiserror::Error)]
pub enum StreamError {
    /// The resource did not exist when the stream was opened.
    #[error("resource not found")]
    NotFound,

    /// The resource existed when the stream was opened and is gone now.
    #[error("resource no longer found")]
    NoLongerFound,

    #[error("failed to subscribe to {pattern}: {source}")]
    Subscribe {
        pattern: String,
        #[source]
        source: BusError,
    },

    #[error("bus closed the subscription")]
    SubscriptionClosed,

    #[error("database error: {0}")]
    Store(#[from] sqlx::Error),

    #[error("exchange rate unavailable: {0}")]
    RateUnavailable(#[from] RateError),

    #[error("failed to send the current value to the client")]
    SendCurrent,

    #[error("failed to send alive message to the client")]
    SendAlive,
}

/// A frame type that carries values and heartbeats.
pub trait LiveMessage: Send + 'static {
    type Value: Send;

    fn current(value: Self::Value) -> Self;
    fn still_alive() -> Self;
}

impl<T: Send + 'static> LiveMessage for ResourceUpdate<T> {
    type Value = T;

    fn current(resource: T) -> Self {
        ResourceUpdate::Snapshot { resource }
    }

    fn still_alive() -> Self {
        ResourceUpdate::StillAlive
    }
}

impl LiveMessage for IdSetUpdate {
    type Value = Vec<String>;

    fn current(ids: Vec<String>) -> Self {
        IdSetUpdate::Ids { ids }
    }

    fn still_alive() -> Self {
        IdSetUpdate::StillAlive
    }
}

impl LiveMessage for ExchangeRateUpdate {
    type Value = f64;

    fn current(rate: f64) -> Self {
        ExchangeRateUpdate::Rate { rate }
    }

    fn still_alive() -> Self {
        ExchangeRateUpdate::StillAlive
    }
}

#[derive(Debug, thiserror::Error)]
#[error("client is gone")]
pub struct ClientGone;

/// Where a session pushes its frames.
pub trait UpdateSink<M>: Send {
    fn deliver(&mut self, message: M) -> impl Future<Output = Result<(), ClientGone>> + Send;
}

impl<M: Send> UpdateSink<M> for mpsc::Sender<M> {
    async fn deliver(&mut self, message: M) -> Result<(), ClientGone> {
        self.send(message).await.map_err(|_| ClientGone)
    }
}
