//! In-memory stand-ins for the database and the bus.

use crate::cascade::{CascadeTransaction, DeletedRow, Filter, TransactionSource};
use crate::entities::outbox::OutboxEvent;
use crate::entities::{CurrencyDirectory, ResourceKind};
use crate::events::{BusError, EventBus, LocalBus, Subscription};
use crate::processors::OutboxStore;
use bytes::Bytes;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

type Row = BTreeMap<&'static str, String>;

#[derive(Debug, Clone, Default)]
struct Tables {
    rows: HashMap<ResourceKind, Vec<Row>>,
    outbox: Vec<OutboxEvent>,
    next_outbox_id: i64,
}

#[derive(Debug, Default)]
struct Faults {
    deletes_of: Option<ResourceKind>,
    enqueues_after: Option<usize>,
}

fn injected(what: &str) -> sqlx::Error {
    sqlx::Error::Protocol(format!("injected {what} failure"))
}

/// Tables held in memory. A transaction works on a copy that replaces the
/// tables on commit.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    tables: Arc<Mutex<Tables>>,
    faults: Arc<Mutex<Faults>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, kind: ResourceKind, columns: &[(&'static str, &str)]) {
        let row = columns
            .iter()
            .map(|(column, value)| (*column, value.to_string()))
            .collect();
        self.tables
            .lock()
            .unwrap()
            .rows
            .entry(kind)
            .or_default()
            .push(row);
    }

    pub fn exists(&self, kind: ResourceKind, id: &str) -> bool {
        let id_column = kind.table().id_column;
        self.tables
            .lock()
            .unwrap()
            .rows
            .get(&kind)
            .is_some_and(|rows| {
                rows.iter()
                    .any(|row| row.get(id_column).is_some_and(|v| v == id))
            })
    }

    pub fn count(&self, kind: ResourceKind) -> usize {
        self.tables
            .lock()
            .unwrap()
            .rows
            .get(&kind)
            .map_or(0, Vec::len)
    }

    pub fn outbox(&self) -> Vec<OutboxEvent> {
        self.tables.lock().unwrap().outbox.clone()
    }

    /// Every delete on `kind` fails.
    pub fn fail_deletes_of(&self, kind: ResourceKind) {
        self.faults.lock().unwrap().deletes_of = Some(kind);
    }

    /// Outbox inserts fail once `n` were made in a transaction.
    pub fn fail_enqueues_after(&self, n: usize) {
        self.faults.lock().unwrap().enqueues_after = Some(n);
    }
}

pub struct MemoryTx {
    store: MemoryStore,
    working: Tables,
    enqueued: usize,
}

impl TransactionSource for MemoryStore {
    type Tx = MemoryTx;

    async fn begin(&self) -> Result<MemoryTx, sqlx::Error> {
        Ok(MemoryTx {
            store: self.clone(),
            working: self.tables.lock().unwrap().clone(),
            enqueued: 0,
        })
    }
}

impl CascadeTransaction for MemoryTx {
    async fn delete_where(
        &mut self,
        kind: ResourceKind,
        filter: &Filter<'_>,
    ) -> Result<Vec<DeletedRow>, sqlx::Error> {
        if self.store.faults.lock().unwrap().deletes_of == Some(kind) {
            return Err(injected("delete"));
        }
        let layout = kind.table();
        let rows = self.working.rows.entry(kind).or_default();
        let (deleted, kept): (Vec<Row>, Vec<Row>) = rows.drain(..).partition(|row| {
            filter
                .iter()
                .all(|(column, value)| row.get(column).is_some_and(|v| v == value))
        });
        *rows = kept;
        Ok(deleted
            .into_iter()
            .map(|row| DeletedRow {
                kind,
                id: row.get(layout.id_column).cloned().unwrap_or_default(),
                scope: layout
                    .scope_columns
                    .iter()
                    .map(|column| row.get(column).cloned().unwrap_or_default())
                    .collect(),
            })
            .collect())
    }

    async fn enqueue(&mut self, subject: &str, payload: &[u8]) -> Result<(), sqlx::Error> {
        let limit = self.store.faults.lock().unwrap().enqueues_after;
        if limit.is_some_and(|n| self.enqueued >= n) {
            return Err(injected("enqueue"));
        }
        self.enqueued += 1;
        self.working.next_outbox_id += 1;
        self.working.outbox.push(OutboxEvent {
            id: self.working.next_outbox_id,
            subject: subject.to_string(),
            payload: payload.to_vec(),
        });
        Ok(())
    }

    async fn commit(self) -> Result<(), sqlx::Error> {
        *self.store.tables.lock().unwrap() = self.working;
        Ok(())
    }

    async fn rollback(self) -> Result<(), sqlx::Error> {
        Ok(())
    }
}

impl OutboxStore for MemoryStore {
    async fn fetch_batch(&self, limit: u32) -> Result<Vec<OutboxEvent>, sqlx::Error> {
        let tables = self.tables.lock().unwrap();
        Ok(tables.outbox.iter().take(limit as usize).cloned().collect())
    }

    async fn remove(&self, ids: Vec<i64>) -> Result<u64, sqlx::Error> {
        let mut tables = self.tables.lock().unwrap();
        let before = tables.outbox.len();
        tables.outbox.retain(|event| !ids.contains(&event.id));
        Ok((before - tables.outbox.len()) as u64)
    }
}

/// A [`LocalBus`] that records successful publishes and fails on demand.
#[derive(Clone, Default)]
pub struct FailingBus {
    inner: LocalBus,
    published: Arc<Mutex<Vec<String>>>,
    fail_subject: Option<String>,
    fail_next: Arc<AtomicUsize>,
    refuse_subscriptions: bool,
}

impl FailingBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publishing on `subject` always fails.
    pub fn failing_on(subject: &str) -> Self {
        Self {
            fail_subject: Some(subject.to_string()),
            ..Self::default()
        }
    }

    pub fn refusing_subscriptions() -> Self {
        Self {
            refuse_subscriptions: true,
            ..Self::default()
        }
    }

    /// The next `n` publishes fail.
    pub fn fail_next(&self, n: usize) {
        self.fail_next.store(n, Ordering::SeqCst);
    }

    /// Subjects published successfully, in order.
    pub fn published(&self) -> Vec<String> {
        self.published.lock().unwrap().clone()
    }
}

impl EventBus for FailingBus {
    async fn publish(&self, subject: String, payload: Bytes) -> Result<(), BusError> {
        let forced = self
            .fail_next
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if forced || self.fail_subject.as_deref() == Some(subject.as_str()) {
            return Err(BusError::Publish {
                subject,
                source: "injected publish failure".into(),
            });
        }
        self.published.lock().unwrap().push(subject.clone());
        self.inner.publish(subject, payload).await
    }

    async fn subscribe(&self, pattern: String) -> Result<Subscription, BusError> {
        if self.refuse_subscriptions {
            return Err(BusError::Subscribe {
                pattern,
                source: "injected subscribe failure".into(),
            });
        }
        self.inner.subscribe(pattern).await
    }
}

/// Currency id to acronym lookup without a database.
#[derive(Debug, Clone, Default)]
pub struct MemoryCurrencies {
    acronyms: Arc<Mutex<HashMap<String, String>>>,
}

impl MemoryCurrencies {
    pub fn insert(&self, id: &str, acronym: &str) {
        self.acronyms
            .lock()
            .unwrap()
            .insert(id.to_string(), acronym.to_string());
    }

    pub fn remove(&self, id: &str) {
        self.acronyms.lock().unwrap().remove(id);
    }
}

impl CurrencyDirectory for MemoryCurrencies {
    async fn acronym(&self, currency_id: &str) -> Result<Option<String>, sqlx::Error> {
        Ok(self.acronyms.lock().unwrap().get(currency_id).cloned())
    }
}
