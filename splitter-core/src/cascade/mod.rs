//! Transactional cascade delete with per-row deletion events.
//!
//! Deleting a row removes every dependent row in the same transaction,
//! transitively, and announces one `Deleted` event per removed row on that
//! row's own subject. How the events reach the bus depends on
//! [`PublishMode`].

mod postgres;

use crate::config::PublishMode;
use crate::entities::ResourceKind;
use crate::events::{BusError, EventBus, EventKind, ResourceEvent, SubjectRouter};
use bytes::Bytes;
use futures_util::future::join_all;
use smallvec::SmallVec;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::Notify;
use tracing::{debug, error, info, warn};

/// A row removed by a cascade, with the ids its subject is built from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeletedRow {
    pub kind: ResourceKind,
    pub id: String,
    pub scope: SmallVec<[String; 2]>,
}

/// Column equality filter, `(column, value)`.
pub type Filter<'a> = [(&'static str, &'a str)];

/// The transaction a cascade runs in.
pub trait CascadeTransaction: Send {
    /// Delete every row of `kind` matching all of `filter` and return them.
    fn delete_where(
        &mut self,
        kind: ResourceKind,
        filter: &Filter<'_>,
    ) -> impl Future<Output = Result<Vec<DeletedRow>, sqlx::Error>> + Send;

    /// Queue an event for the outbox relay.
    fn enqueue(
        &mut self,
        subject: &str,
        payload: &[u8],
    ) -> impl Future<Output = Result<(), sqlx::Error>> + Send;

    fn commit(self) -> impl Future<Output = Result<(), sqlx::Error>> + Send;

    fn rollback(self) -> impl Future<Output = Result<(), sqlx::Error>> + Send;
}

/// Opens cascade transactions.
pub trait TransactionSource: Send + Sync {
    type Tx: CascadeTransaction;

    fn begin(&self) -> impl Future<Output = Result<Self::Tx, sqlx::Error>> + Send;
}

#[derive(Debug, thiserror::Error)]
pub enum CascadeError {
    #[error("resource not found")]
    NotFound,

    #[error("database error: {0}")]
    Store(#[from] sqlx::Error),

    #[error("failed to publish deletion event: {0}")]
    Publish(#[from] BusError),

    #[error("failed to encode deletion event: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Runs cascade deletes.
pub struct CascadeDelete<S, B> {
    store: S,
    bus: B,
    router: SubjectRouter,
    mode: PublishMode,
    relay: Arc<Notify>,
}

impl<S: TransactionSource, B: EventBus> CascadeDelete<S, B> {
    pub fn new(store: S, bus: B, router: SubjectRouter, mode: PublishMode) -> Self {
        Self {
            store,
            bus,
            router,
            mode,
            relay: Arc::new(Notify::new()),
        }
    }

    /// Woken after every outbox commit.
    pub fn relay_signal(&self) -> Arc<Notify> {
        Arc::clone(&self.relay)
    }

    pub fn mode(&self) -> PublishMode {
        self.mode
    }

    /// Delete the row of `kind` with id `id` and everything depending on it.
    #[tracing::instrument(skip(self), fields(mode = ?self.mode))]
    pub async fn delete(&self, kind: ResourceKind, id: &str) -> Result<Vec<DeletedRow>, CascadeError> {
        let id_column = kind.table().id_column;
        self.run(kind, &[(id_column, id)]).await
    }

    /// Remove the link between one expense and one category.
    #[tracing::instrument(skip(self), fields(mode = ?self.mode))]
    pub async fn delete_relation(
        &self,
        expense_id: &str,
        category_id: &str,
    ) -> Result<Vec<DeletedRow>, CascadeError> {
        self.run(
            ResourceKind::ExpenseCategoryRelation,
            &[("expense_id", expense_id), ("category_id", category_id)],
        )
        .await
    }

    async fn run(&self, kind: ResourceKind, filter: &Filter<'_>) -> Result<Vec<DeletedRow>, CascadeError> {
        let mut tx = self.store.begin().await?;
        match self.delete_and_announce(&mut tx, kind, filter).await {
            Ok(deleted) => {
                tx.commit().await?;
                info!(rows = deleted.len(), "Cascade delete committed");
                if self.mode == PublishMode::Outbox {
                    self.relay.notify_one();
                }
                Ok(deleted)
            }
            Err(err) => {
                if let Err(rollback) = tx.rollback().await {
                    error!(%rollback, "Failed to roll back cascade delete");
                }
                Err(err)
            }
        }
    }

    async fn delete_and_announce(
        &self,
        tx: &mut S::Tx,
        kind: ResourceKind,
        filter: &Filter<'_>,
    ) -> Result<Vec<DeletedRow>, CascadeError> {
        let roots = tx.delete_where(kind, filter).await?;
        if roots.is_empty() {
            debug!("Nothing to delete");
            return Err(CascadeError::NotFound);
        }
        let deleted = delete_dependents(tx, roots).await?;

        let mut events = Vec::with_capacity(deleted.len());
        for row in &deleted {
            let scope: SmallVec<[&str; 2]> = row.scope.iter().map(String::as_str).collect();
            let subject = self
                .router
                .subject(row.kind, &scope, &row.id, EventKind::Deleted);
            let payload =
                ResourceEvent::new(row.kind, EventKind::Deleted, row.id.clone(), row.scope.clone())
                    .to_bytes()?;
            events.push((subject, payload));
        }

        match self.mode {
            PublishMode::Direct => self.publish_all(events).await?,
            PublishMode::Outbox => {
                for (subject, payload) in &events {
                    tx.enqueue(subject, payload).await?;
                }
            }
        }
        Ok(deleted)
    }

    /// Publish concurrently and report the first failure once all settled.
    async fn publish_all(&self, events: Vec<(String, Bytes)>) -> Result<(), BusError> {
        let results = join_all(
            events
                .into_iter()
                .map(|(subject, payload)| self.bus.publish(subject, payload)),
        )
        .await;
        let failed = results.iter().filter(|r| r.is_err()).count();
        match results.into_iter().find_map(Result::err) {
            Some(err) => {
                warn!(failed, "Deletion events already published stay on the bus");
                Err(err)
            }
            None => Ok(()),
        }
    }
}

/// Delete the dependents of `roots`, breadth first, and return every
/// deleted row with the roots first.
async fn delete_dependents<T: CascadeTransaction>(
    tx: &mut T,
    roots: Vec<DeletedRow>,
) -> Result<Vec<DeletedRow>, sqlx::Error> {
    let mut deleted = Vec::new();
    let mut pending: VecDeque<DeletedRow> = roots.into();
    while let Some(row) = pending.pop_front() {
        for dependent in row.kind.dependents() {
            let children = tx
                .delete_where(dependent.kind, &[(dependent.parent_column, row.id.as_str())])
                .await?;
            pending.extend(children);
        }
        deleted.push(row);
    }
    Ok(deleted)
}
