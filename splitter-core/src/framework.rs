//! Database handles the processors run on.

use sqlx::{PgConnection, PgPool, Postgres, Transaction};

/// Pool-backed handle. Every read query is a `Processor` on it.
#[derive(Clone)]
pub struct DatabaseProcessor {
    pub pool: PgPool,
}

/// One open transaction. Dropped without a commit, it rolls back.
pub struct TransactionProcessor {
    pub tx: Transaction<'static, Postgres>,
}

impl TransactionProcessor {
    pub fn connection(&mut self) -> &mut PgConnection {
        &mut self.tx
    }
}
