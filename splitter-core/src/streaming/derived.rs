use crate::config::StreamSettings;
use crate::events::{EventBus, Subscription};
use crate::streaming::{LiveMessage, StreamError, UpdateSink};
use std::fmt::Debug;
use tokio::time::{Instant, sleep};
use tracing::{debug, trace};

/// Serves a value computed from several upstream resources.
///
/// The value is recomputed on every upstream notification but only sent
/// when it differs from the last computed one. A heartbeat tick recomputes
/// too, so a change that arrived without a notification is delivered no
/// later than the next tick.
pub struct DerivedStream<B> {
    bus: B,
    settings: StreamSettings,
}

impl<B: EventBus> DerivedStream<B> {
    pub fn new(bus: B, settings: StreamSettings) -> Self {
        Self { bus, settings }
    }

    /// `compute` returns `None` when an upstream resource is missing, with
    /// the same open-time/mid-stream distinction as a resource stream.
    #[tracing::instrument(skip_all, name = "derived_stream", fields(?patterns))]
    pub async fn run<M, F, Fut, S, D>(
        &self,
        patterns: Vec<String>,
        mut compute: F,
        sink: &mut S,
        done: D,
    ) -> Result<(), StreamError>
    where
        M: LiveMessage,
        M::Value: Clone + PartialEq + Debug,
        F: FnMut() -> Fut + Send,
        Fut: Future<Output = Result<Option<M::Value>, StreamError>> + Send,
        S: UpdateSink<M>,
        D: Future<Output = ()> + Send,
    {
        let mut subscriptions = Vec::with_capacity(patterns.len());
        for pattern in &patterns {
            let subscription = self
                .bus
                .subscribe(pattern.clone())
                .await
                .map_err(|source| StreamError::Subscribe {
                    pattern: pattern.clone(),
                    source,
                })?;
            subscriptions.push(subscription);
        }
        let mut upstream = Subscription::merge(subscriptions);
        debug!(patterns = ?upstream.patterns(), "Subscribed to upstream resources");

        let Some(initial) = compute().await? else {
            debug!("Upstream resource not found at stream open");
            return Err(StreamError::NotFound);
        };
        let mut last = initial.clone();
        sink.deliver(M::current(initial))
            .await
            .map_err(|_| StreamError::SendCurrent)?;

        let period = self.settings.heartbeat;
        let heartbeat = sleep(period);
        let cap = sleep(self.settings.session_cap);
        tokio::pin!(heartbeat, cap, done);

        loop {
            tokio::select! {
                biased;

                _ = &mut done => {
                    debug!("Stream canceled");
                    return Ok(());
                }

                _ = &mut cap => {
                    debug!("Stream session cap reached");
                    return Ok(());
                }

                notification = upstream.recv() => {
                    let Some(notification) = notification else {
                        return Err(StreamError::SubscriptionClosed);
                    };
                    let coalesced = upstream.drain_ready();
                    trace!(subject = %notification.subject, coalesced, "Upstream notification");

                    let Some(value) = compute().await? else {
                        return Err(StreamError::NoLongerFound);
                    };
                    let changed = value != last;
                    last = value.clone();
                    if changed {
                        sink.deliver(M::current(value))
                            .await
                            .map_err(|_| StreamError::SendCurrent)?;
                        heartbeat.as_mut().reset(Instant::now() + period);
                    } else {
                        trace!(?value, "Derived value unchanged");
                    }
                }

                _ = &mut heartbeat => {
                    let Some(value) = compute().await? else {
                        return Err(StreamError::NoLongerFound);
                    };
                    if value != last {
                        last = value.clone();
                        sink.deliver(M::current(value))
                            .await
                            .map_err(|_| StreamError::SendCurrent)?;
                    } else {
                        sink.deliver(M::still_alive())
                            .await
                            .map_err(|_| StreamError::SendAlive)?;
                    }
                    heartbeat.as_mut().reset(Instant::now() + period);
                }
            }
        }
    }
}
