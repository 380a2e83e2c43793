use crate::entities::{Record, ResourceKind};
use crate::framework::DatabaseProcessor;
use kanau::processor::Processor;
use splitter_sdk::objects::Expense as SdkExpense;

#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct ExpenseRecord {
    pub id: String,
    pub group_id: String,
    pub by_id: String,
    pub name: String,
    pub occurred_at: time::PrimitiveDateTime,
    pub currency_id: String,
}

impl Record for ExpenseRecord {
    const KIND: ResourceKind = ResourceKind::Expense;
    const COLUMNS: &'static str = "id, group_id, by_id, name, occurred_at, currency_id";
}

impl From<ExpenseRecord> for SdkExpense {
    fn from(value: ExpenseRecord) -> Self {
        SdkExpense {
            id: value.id,
            group_id: value.group_id,
            by_id: value.by_id,
            name: value.name,
            timestamp: value.occurred_at.assume_utc().unix_timestamp(),
            currency_id: value.currency_id,
        }
    }
}

#[derive(Debug, Clone)]
/// Ids of the expenses in a group.
pub struct ListExpenseIdsInGroup {
    pub group_id: String,
}

impl Processor<ListExpenseIdsInGroup> for DatabaseProcessor {
    type Output = Vec<String>;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:ListExpenseIdsInGroup")]
    async fn process(&self, query: ListExpenseIdsInGroup) -> Result<Vec<String>, sqlx::Error> {
        sqlx::query_scalar::<_, String>(
            r#"
            SELECT id FROM expenses
            WHERE group_id = $1
            ORDER BY id ASC
            "#,
        )
        .bind(query.group_id)
        .fetch_all(&self.pool)
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn test_occurred_at_becomes_unix_timestamp() {
        let record = ExpenseRecord {
            id: "exp-1".to_string(),
            group_id: "grp-1".to_string(),
            by_id: "per-1".to_string(),
            name: "Dinner".to_string(),
            occurred_at: datetime!(2024-01-01 00:00:00),
            currency_id: "cur-eur".to_string(),
        };
        let expense: SdkExpense = record.into();
        assert_eq!(expense.timestamp, 1_704_067_200);
        assert_eq!(expense.by_id, "per-1");
    }
}
