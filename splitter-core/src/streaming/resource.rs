use crate::config::StreamSettings;
use crate::events::EventBus;
use crate::streaming::{LiveMessage, StreamError, UpdateSink};
use tokio::time::{Instant, sleep};
use tracing::{debug, trace};

/// Serves one single-resource or id-set stream.
pub struct ResourceStream<B> {
    bus: B,
    settings: StreamSettings,
}

impl<B: EventBus> ResourceStream<B> {
    pub fn new(bus: B, settings: StreamSettings) -> Self {
        Self { bus, settings }
    }

    /// Run a session until `done` resolves, the session cap elapses or a
    /// terminal condition is reached.
    ///
    /// `fetch` returns `None` when the resource does not exist. A miss on
    /// the first fetch is [`StreamError::NotFound`]; a miss after that is
    /// [`StreamError::NoLongerFound`].
    #[tracing::instrument(skip_all, name = "resource_stream", fields(%pattern))]
    pub async fn run<M, F, Fut, S, D>(
        &self,
        pattern: String,
        mut fetch: F,
        sink: &mut S,
        done: D,
    ) -> Result<(), StreamError>
    where
        M: LiveMessage,
        F: FnMut() -> Fut + Send,
        Fut: Future<Output = Result<Option<M::Value>, StreamError>> + Send,
        S: UpdateSink<M>,
        D: Future<Output = ()> + Send,
    {
        let mut subscription = self
            .bus
            .subscribe(pattern.clone())
            .await
            .map_err(|source| StreamError::Subscribe {
                pattern: pattern.clone(),
                source,
            })?;

        let Some(initial) = fetch().await? else {
            debug!("Resource not found at stream open");
            return Err(StreamError::NotFound);
        };
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

                notification = subscription.recv() => {
                    let Some(notification) = notification else {
                        return Err(StreamError::SubscriptionClosed);
                    };
                    let coalesced = subscription.drain_ready();
                    trace!(subject = %notification.subject, coalesced, "Change notification");

                    let Some(value) = fetch().await? else {
                        debug!("Resource disappeared during stream");
                        return Err(StreamError::NoLongerFound);
                    };
                    sink.deliver(M::current(value))
                        .await
                        .map_err(|_| StreamError::SendCurrent)?;
                    heartbeat.as_mut().reset(Instant::now() + period);
                }

                _ = &mut heartbeat => {
                    sink.deliver(M::still_alive())
                        .await
                        .map_err(|_| StreamError::SendAlive)?;
                    heartbeat.as_mut().reset(Instant::now() + period);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::ResourceKind;
    use crate::events::{EventKind, LocalBus, SubjectRouter, Token};
    use crate::testing::FailingBus;
    use bytes::Bytes;
    use splitter_sdk::objects::{Category, IdSetUpdate, ResourceUpdate};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;
    use tokio::sync::{mpsc, oneshot};
    use tokio::task::JoinHandle;
    use tokio::time::timeout;

    type Update = ResourceUpdate<Category>;

    #[derive(Clone, Default)]
    struct Row {
        value: Arc<Mutex<Option<Category>>>,
        fetches: Arc<AtomicUsize>,
    }

    impl Row {
        fn with(category: Category) -> Self {
            let row = Row::default();
            row.set(Some(category));
            row
        }

        fn set(&self, value: Option<Category>) {
            *self.value.lock().unwrap() = value;
        }

        fn fetcher(
            &self,
        ) -> impl FnMut() -> std::future::Ready<Result<Option<Category>, StreamError>> + Send + 'static
        {
            let row = self.clone();
            move || {
                row.fetches.fetch_add(1, Ordering::SeqCst);
                std::future::ready(Ok(row.value.lock().unwrap().clone()))
            }
        }
    }

    fn category(name: &str) -> Category {
        Category {
            id: "cat-1".to_string(),
            group_id: "grp-1".to_string(),
            name: name.to_string(),
        }
    }

    fn assert_within_tick(elapsed: Duration, expected: Duration) {
        assert!(
            elapsed >= expected && elapsed < expected + Duration::from_millis(5),
            "{elapsed:?} vs {expected:?}"
        );
    }

    fn router() -> SubjectRouter {
        SubjectRouter::new("splitter").unwrap()
    }

    fn category_pattern() -> String {
        router().resource_pattern(ResourceKind::Category, &[Token::Any], "cat-1")
    }

    async fn notify(bus: &LocalBus, event: EventKind) {
        let subject = router().subject(ResourceKind::Category, &["grp-1"], "cat-1", event);
        bus.publish(subject, Bytes::new()).await.unwrap();
    }

    struct Session {
        rx: mpsc::Receiver<Update>,
        cancel: oneshot::Sender<()>,
        handle: JoinHandle<Result<(), StreamError>>,
    }

    fn open(bus: &LocalBus, row: &Row, settings: StreamSettings) -> Session {
        let (mut tx, rx) = mpsc::channel(16);
        let (cancel, cancelled) = oneshot::channel::<()>();
        let stream = ResourceStream::new(bus.clone(), settings);
        let fetch = row.fetcher();
        let handle = tokio::spawn(async move {
            let done = async move {
                let _ = cancelled.await;
            };
            stream.run(category_pattern(), fetch, &mut tx, done).await
        });
        Session { rx, cancel, handle }
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_message_is_snapshot_then_updates_follow() {
        let bus = LocalBus::new();
        let row = Row::with(category(""));
        let mut session = open(&bus, &row, StreamSettings::default());

        assert_eq!(
            session.rx.recv().await,
            Some(ResourceUpdate::Snapshot { resource: category("") })
        );

        row.set(Some(category("Groceries")));
        notify(&bus, EventKind::Updated).await;
        assert_eq!(
            session.rx.recv().await,
            Some(ResourceUpdate::Snapshot {
                resource: category("Groceries")
            })
        );

        session.cancel.send(()).unwrap();
        assert!(session.handle.await.unwrap().is_ok());
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_resource_fails_without_leaking_subscription() {
        let bus = LocalBus::new();
        let row = Row::default();
        let before = bus.subscriber_count();
        let mut session = open(&bus, &row, StreamSettings::default());

        let result = session.handle.await.unwrap();
        assert!(matches!(result, Err(StreamError::NotFound)));
        assert_eq!(session.rx.recv().await, None);
        assert_eq!(bus.subscriber_count(), before);
    }

    #[tokio::test(start_paused = true)]
    async fn test_heartbeat_after_quiet_period() {
        let bus = LocalBus::new();
        let row = Row::with(category(""));
        let mut session = open(&bus, &row, StreamSettings::default());
        session.rx.recv().await.unwrap();

        let started = Instant::now();
        assert_eq!(session.rx.recv().await, Some(ResourceUpdate::StillAlive));
        assert_within_tick(started.elapsed(), StreamSettings::DEFAULT_HEARTBEAT);
        assert_eq!(session.rx.recv().await, Some(ResourceUpdate::StillAlive));
    }

    #[tokio::test(start_paused = true)]
    async fn test_update_resets_heartbeat() {
        let bus = LocalBus::new();
        let row = Row::with(category(""));
        let mut session = open(&bus, &row, StreamSettings::default());
        session.rx.recv().await.unwrap();

        tokio::time::sleep(Duration::from_secs(45)).await;
        row.set(Some(category("Rent")));
        notify(&bus, EventKind::Updated).await;
        assert!(matches!(
            session.rx.recv().await,
            Some(ResourceUpdate::Snapshot { .. })
        ));

        let updated_at = Instant::now();
        let quiet = timeout(Duration::from_secs(59), session.rx.recv()).await;
        assert!(quiet.is_err(), "no heartbeat within one period after an update");
        assert_eq!(session.rx.recv().await, Some(ResourceUpdate::StillAlive));
        assert_within_tick(updated_at.elapsed(), StreamSettings::DEFAULT_HEARTBEAT);
    }

    #[tokio::test(start_paused = true)]
    async fn test_burst_is_coalesced_into_one_fetch() {
        let bus = LocalBus::new();
        let row = Row::with(category(""));
        let mut session = open(&bus, &row, StreamSettings::default());
        session.rx.recv().await.unwrap();
        assert_eq!(row.fetches.load(Ordering::SeqCst), 1);

        for name in ["a", "b", "c", "d", "latest"] {
            row.set(Some(category(name)));
            notify(&bus, EventKind::Updated).await;
        }

        assert_eq!(
            session.rx.recv().await,
            Some(ResourceUpdate::Snapshot {
                resource: category("latest")
            })
        );
        let quiet = timeout(Duration::from_secs(30), session.rx.recv()).await;
        assert!(quiet.is_err());
        assert_eq!(row.fetches.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_burst_larger_than_coop_budget_is_one_fetch() {
        let bus = LocalBus::new();
        let row = Row::with(category(""));
        let mut session = open(&bus, &row, StreamSettings::default());
        session.rx.recv().await.unwrap();

        row.set(Some(category("latest")));
        for _ in 0..200 {
            notify(&bus, EventKind::Updated).await;
        }

        assert_eq!(
            session.rx.recv().await,
            Some(ResourceUpdate::Snapshot {
                resource: category("latest")
            })
        );
        let quiet = timeout(Duration::from_secs(1), session.rx.recv()).await;
        assert!(quiet.is_err(), "one frame per burst");
        assert_eq!(row.fetches.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_deletion_ends_stream_with_data_loss() {
        let bus = LocalBus::new();
        let row = Row::with(category(""));
        let mut session = open(&bus, &row, StreamSettings::default());
        session.rx.recv().await.unwrap();

        row.set(None);
        notify(&bus, EventKind::Deleted).await;

        let result = session.handle.await.unwrap();
        assert!(matches!(result, Err(StreamError::NoLongerFound)));
        assert_eq!(session.rx.recv().await, None);
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_session_cap_ends_stream_normally() {
        let bus = LocalBus::new();
        let row = Row::with(category(""));
        let settings = StreamSettings {
            heartbeat: Duration::from_secs(60),
            session_cap: Duration::from_secs(150),
        };
        let mut session = open(&bus, &row, settings);
        session.rx.recv().await.unwrap();

        assert_eq!(session.rx.recv().await, Some(ResourceUpdate::StillAlive));
        assert_eq!(session.rx.recv().await, Some(ResourceUpdate::StillAlive));
        assert!(session.handle.await.unwrap().is_ok());
        assert_eq!(session.rx.recv().await, None);
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unreachable_client_cancels_session() {
        let bus = LocalBus::new();
        let row = Row::with(category(""));
        let mut session = open(&bus, &row, StreamSettings::default());
        session.rx.recv().await.unwrap();
        drop(session.rx);

        notify(&bus, EventKind::Updated).await;
        let result = session.handle.await.unwrap();
        assert!(matches!(result, Err(StreamError::SendCurrent)));
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unreachable_client_on_heartbeat() {
        let bus = LocalBus::new();
        let row = Row::with(category(""));
        let mut session = open(&bus, &row, StreamSettings::default());
        session.rx.recv().await.unwrap();
        drop(session.rx);

        let result = session.handle.await.unwrap();
        assert!(matches!(result, Err(StreamError::SendAlive)));
    }

    #[tokio::test]
    async fn test_subscribe_failure_is_reported() {
        let stream = ResourceStream::new(FailingBus::refusing_subscriptions(), StreamSettings::default());
        let (mut tx, _rx) = mpsc::channel::<IdSetUpdate>(1);
        let result = stream
            .run(
                "splitter.Group.>".to_string(),
                || std::future::ready(Ok(Some(Vec::new()))),
                &mut tx,
                std::future::pending(),
            )
            .await;
        assert!(matches!(result, Err(StreamError::Subscribe { .. })));
    }

    #[tokio::test(start_paused = true)]
    async fn test_id_set_stream_never_reports_not_found() {
        let bus = LocalBus::new();
        let ids = Arc::new(Mutex::new(vec!["cat-1".to_string()]));
        let stream = ResourceStream::new(bus.clone(), StreamSettings::default());
        let (mut tx, mut rx) = mpsc::channel::<IdSetUpdate>(4);
        let pattern = router().scoped_wildcard(ResourceKind::Category, &[Token::Id("grp-1")]);
        let source = Arc::clone(&ids);
        tokio::spawn(async move {
            let fetch = move || std::future::ready(Ok(Some(source.lock().unwrap().clone())));
            stream.run(pattern, fetch, &mut tx, std::future::pending()).await
        });

        assert_eq!(rx.recv().await, Some(IdSetUpdate::Ids { ids: vec!["cat-1".to_string()] }));
        ids.lock().unwrap().clear();
        notify(&bus, EventKind::Deleted).await;
        assert_eq!(rx.recv().await, Some(IdSetUpdate::Ids { ids: Vec::new() }));
    }
}
