//! Deletion events waiting for the relay to publish them.

use crate::framework::DatabaseProcessor;
use kanau::processor::Processor;

#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct OutboxEvent {
    pub id: i64,
    pub subject: String,
    pub payload: Vec<u8>,
}

impl OutboxEvent {
    /// Queue an event within a transaction.
    pub async fn insert_tx(
        conn: &mut sqlx::PgConnection,
        subject: &str,
        payload: &[u8],
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO outbox_events (subject, payload)
            VALUES ($1, $2)
            "#,
        )
        .bind(subject)
        .bind(payload)
        .execute(conn)
        .await?;
        Ok(())
    }
}

#[derive(Debug, Clone)]
/// Oldest pending events, in insertion order.
pub struct FetchOutboxBatch {
    pub limit: u32,
}

impl Processor<FetchOutboxBatch> for DatabaseProcessor {
    type Output = Vec<OutboxEvent>;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:FetchOutboxBatch")]
    async fn process(&self, query: FetchOutboxBatch) -> Result<Vec<OutboxEvent>, sqlx::Error> {
        sqlx::query_as::<_, OutboxEvent>(
            r#"
            SELECT id, subject, payload FROM outbox_events
            ORDER BY id ASC
            LIMIT $1
            "#,
        )
        .bind(i64::from(query.limit))
        .fetch_all(&self.pool)
        .await
    }
}

#[derive(Debug, Clone)]
/// Drop events that have been published.
pub struct RemoveOutboxEvents {
    pub ids: Vec<i64>,
}

impl Processor<RemoveOutboxEvents> for DatabaseProcessor {
    type Output = u64;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:RemoveOutboxEvents")]
    async fn process(&self, query: RemoveOutboxEvents) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM outbox_events WHERE id = ANY($1)")
            .bind(&query.ids)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}
