//! Many-to-many link between expenses and categories.
//!
//! A relation has no id of its own; on the bus it is addressed by its
//! category id under the `(group, expense)` scope.

use crate::framework::DatabaseProcessor;
use kanau::processor::Processor;

#[derive(Debug, Clone)]
pub struct ListCategoryIdsForExpense {
    pub expense_id: String,
}

impl Processor<ListCategoryIdsForExpense> for DatabaseProcessor {
    type Output = Vec<String>;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:ListCategoryIdsForExpense")]
    async fn process(&self, query: ListCategoryIdsForExpense) -> Result<Vec<String>, sqlx::Error> {
        sqlx::query_scalar::<_, String>(
            r#"
            SELECT category_id FROM expense_category_relations
            WHERE expense_id = $1
            ORDER BY category_id ASC
            "#,
        )
        .bind(query.expense_id)
        .fetch_all(&self.pool)
        .await
    }
}

#[derive(Debug, Clone)]
pub struct ListExpenseIdsForCategory {
    pub category_id: String,
}

impl Processor<ListExpenseIdsForCategory> for DatabaseProcessor {
    type Output = Vec<String>;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:ListExpenseIdsForCategory")]
    async fn process(&self, query: ListExpenseIdsForCategory) -> Result<Vec<String>, sqlx::Error> {
        sqlx::query_scalar::<_, String>(
            r#"
            SELECT expense_id FROM expense_category_relations
            WHERE category_id = $1
            ORDER BY expense_id ASC
            "#,
        )
        .bind(query.category_id)
        .fetch_all(&self.pool)
        .await
    }
}
