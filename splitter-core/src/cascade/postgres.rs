use crate::cascade::{CascadeTransaction, DeletedRow, Filter, TransactionSource};
use crate::entities::ResourceKind;
use crate::entities::outbox::OutboxEvent;
use crate::framework::{DatabaseProcessor, TransactionProcessor};
use smallvec::SmallVec;
use sqlx::Row;
use sqlx::postgres::PgRow;

impl TransactionSource for DatabaseProcessor {
    type Tx = TransactionProcessor;

    async fn begin(&self) -> Result<TransactionProcessor, sqlx::Error> {
        let tx = self.pool.begin().await?;
        Ok(TransactionProcessor { tx })
    }
}

impl CascadeTransaction for TransactionProcessor {
    #[tracing::instrument(skip_all, err, name = "SQL:DeleteReturning", fields(kind = kind.segment()))]
    async fn delete_where(
        &mut self,
        kind: ResourceKind,
        filter: &Filter<'_>,
    ) -> Result<Vec<DeletedRow>, sqlx::Error> {
        let sql = delete_returning_sql(kind, filter);
        let mut query = sqlx::query(&sql);
        for (_, value) in filter {
            query = query.bind(*value);
        }
        let rows = query.fetch_all(self.connection()).await?;
        rows.iter().map(|row| deleted_row(kind, row)).collect()
    }

    async fn enqueue(&mut self, subject: &str, payload: &[u8]) -> Result<(), sqlx::Error> {
        OutboxEvent::insert_tx(self.connection(), subject, payload).await
    }

    async fn commit(self) -> Result<(), sqlx::Error> {
        self.tx.commit().await
    }

    async fn rollback(self) -> Result<(), sqlx::Error> {
        self.tx.rollback().await
    }
}

/// `DELETE ... RETURNING` the subject id column followed by the scope
/// columns. Column names come from [`ResourceKind::table`] and the
/// dependency table, never from input.
fn delete_returning_sql(kind: ResourceKind, filter: &Filter<'_>) -> String {
    let layout = kind.table();
    let conditions = filter
        .iter()
        .enumerate()
        .map(|(i, (column, _))| format!("{column} = ${}", i + 1))
        .collect::<Vec<_>>()
        .join(" AND ");
    let returning = std::iter::once(layout.id_column)
        .chain(layout.scope_columns.iter().copied())
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "DELETE FROM {} WHERE {conditions} RETURNING {returning}",
        layout.table
    )
}

fn deleted_row(kind: ResourceKind, row: &PgRow) -> Result<DeletedRow, sqlx::Error> {
    let scope_len = kind.table().scope_columns.len();
    let scope = (1..=scope_len)
        .map(|i| row.try_get::<String, _>(i))
        .collect::<Result<SmallVec<_>, _>>()?;
    Ok(DeletedRow {
        kind,
        id: row.try_get(0)?,
        scope,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delete_sql_returns_subject_columns() {
        assert_eq!(
            delete_returning_sql(ResourceKind::ExpenseStake, &[("expense_id", "exp-1")]),
            "DELETE FROM expense_stakes WHERE expense_id = $1 RETURNING id, group_id, expense_id"
        );
        assert_eq!(
            delete_returning_sql(
                ResourceKind::ExpenseCategoryRelation,
                &[("expense_id", "exp-1"), ("category_id", "cat-1")]
            ),
            "DELETE FROM expense_category_relations WHERE expense_id = $1 AND category_id = $2 \
             RETURNING category_id, group_id, expense_id"
        );
        assert_eq!(
            delete_returning_sql(ResourceKind::Group, &[("id", "grp-1")]),
            "DELETE FROM groups WHERE id = $1 RETURNING id"
        );
    }
}
