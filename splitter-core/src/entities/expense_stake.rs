use crate::entities::{Record, ResourceKind};
use crate::framework::DatabaseProcessor;
use kanau::processor::Processor;
use splitter_sdk::objects::ExpenseStake as SdkExpenseStake;

#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct ExpenseStakeRecord {
    pub id: String,
    pub group_id: String,
    pub expense_id: String,
    pub for_id: String,
    pub value: rust_decimal::Decimal,
}

impl Record for ExpenseStakeRecord {
    const KIND: ResourceKind = ResourceKind::ExpenseStake;
    const COLUMNS: &'static str = "id, group_id, expense_id, for_id, value";
}

impl From<ExpenseStakeRecord> for SdkExpenseStake {
    fn from(value: ExpenseStakeRecord) -> Self {
        SdkExpenseStake {
            id: value.id,
            group_id: value.group_id,
            expense_id: value.expense_id,
            for_id: value.for_id,
            value: value.value,
        }
    }
}

#[derive(Debug, Clone)]
/// Ids of the stakes of an expense, ordered by the person they are for.
pub struct ListExpenseStakeIdsInExpense {
    pub expense_id: String,
}

impl Processor<ListExpenseStakeIdsInExpense> for DatabaseProcessor {
    type Output = Vec<String>;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:ListExpenseStakeIdsInExpense")]
    async fn process(
        &self,
        query: ListExpenseStakeIdsInExpense,
    ) -> Result<Vec<String>, sqlx::Error> {
        sqlx::query_scalar::<_, String>(
            r#"
            SELECT id FROM expense_stakes
            WHERE expense_id = $1
            ORDER BY for_id ASC, id ASC
            "#,
        )
        .bind(query.expense_id)
        .fetch_all(&self.pool)
        .await
    }
}

#[derive(Debug, Clone)]
/// Ids of the stakes of every expense in a group, ordered by the person
/// they are for.
pub struct ListExpenseStakeIdsInGroup {
    pub group_id: String,
}

impl Processor<ListExpenseStakeIdsInGroup> for DatabaseProcessor {
    type Output = Vec<String>;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:ListExpenseStakeIdsInGroup")]
    async fn process(
        &self,
        query: ListExpenseStakeIdsInGroup,
    ) -> Result<Vec<String>, sqlx::Error> {
        sqlx::query_scalar::<_, String>(
            r#"
            SELECT id FROM expense_stakes
            WHERE group_id = $1
            ORDER BY for_id ASC, id ASC
            "#,
        )
        .bind(query.group_id)
        .fetch_all(&self.pool)
        .await
    }
}
