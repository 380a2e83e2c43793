//! Relational model of the splitter resources.
//!
//! Each resource kind maps to one table. [`ResourceKind::table`] describes
//! where its subject id and scope ids live, and [`ResourceKind::dependents`]
//! lists the tables whose rows must go when a row of this kind is deleted.

pub mod category;
pub mod currency;
pub mod expense;
pub mod expense_category_relation;
pub mod expense_stake;
pub mod group;
pub mod outbox;
pub mod person;

pub use currency::CurrencyDirectory;

use crate::framework::DatabaseProcessor;
use kanau::processor::Processor;
use sqlx::postgres::PgRow;
use std::fmt;
use std::marker::PhantomData;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Group,
    Person,
    Category,
    Expense,
    ExpenseStake,
    ExpenseCategoryRelation,
    Currency,
}

/// Table layout of one resource kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableLayout {
    pub table: &'static str,
    /// Column holding the id used as the last subject segment.
    pub id_column: &'static str,
    /// Ancestor id columns, outermost first.
    pub scope_columns: &'static [&'static str],
}

/// A table whose rows reference a parent row through `parent_column`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dependent {
    pub kind: ResourceKind,
    pub parent_column: &'static str,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 7] = [
        ResourceKind::Group,
        ResourceKind::Person,
        ResourceKind::Category,
        ResourceKind::Expense,
        ResourceKind::ExpenseStake,
        ResourceKind::ExpenseCategoryRelation,
        ResourceKind::Currency,
    ];

    /// Subject segment naming this kind.
    pub fn segment(self) -> &'static str {
        match self {
            ResourceKind::Group => "Group",
            ResourceKind::Person => "Person",
            ResourceKind::Category => "Category",
            ResourceKind::Expense => "Expense",
            ResourceKind::ExpenseStake => "ExpenseStake",
            ResourceKind::ExpenseCategoryRelation => "ExpenseCategoryRelation",
            ResourceKind::Currency => "Currency",
        }
    }

    pub fn table(self) -> TableLayout {
        match self {
            ResourceKind::Group => TableLayout {
                table: "groups",
                id_column: "id",
                scope_columns: &[],
            },
            ResourceKind::Person => TableLayout {
                table: "people",
                id_column: "id",
                scope_columns: &["group_id"],
            },
            ResourceKind::Category => TableLayout {
                table: "categories",
                id_column: "id",
                scope_columns: &["group_id"],
            },
            ResourceKind::Expense => TableLayout {
                table: "expenses",
                id_column: "id",
                scope_columns: &["group_id"],
            },
            ResourceKind::ExpenseStake => TableLayout {
                table: "expense_stakes",
                id_column: "id",
                scope_columns: &["group_id", "expense_id"],
            },
            ResourceKind::ExpenseCategoryRelation => TableLayout {
                table: "expense_category_relations",
                id_column: "category_id",
                scope_columns: &["group_id", "expense_id"],
            },
            ResourceKind::Currency => TableLayout {
                table: "currencies",
                id_column: "id",
                scope_columns: &[],
            },
        }
    }

    /// Tables cascaded when a row of this kind is deleted.
    pub fn dependents(self) -> &'static [Dependent] {
        match self {
            ResourceKind::Group => &[
                Dependent {
                    kind: ResourceKind::Person,
                    parent_column: "group_id",
                },
                Dependent {
                    kind: ResourceKind::Category,
                    parent_column: "group_id",
                },
                Dependent {
                    kind: ResourceKind::Expense,
                    parent_column: "group_id",
                },
            ],
            ResourceKind::Person => &[Dependent {
                kind: ResourceKind::Expense,
                parent_column: "by_id",
            }],
            ResourceKind::Expense => &[
                Dependent {
                    kind: ResourceKind::ExpenseStake,
                    parent_column: "expense_id",
                },
                Dependent {
                    kind: ResourceKind::ExpenseCategoryRelation,
                    parent_column: "expense_id",
                },
            ],
            ResourceKind::Category => &[Dependent {
                kind: ResourceKind::ExpenseCategoryRelation,
                parent_column: "category_id",
            }],
            ResourceKind::ExpenseStake
            | ResourceKind::ExpenseCategoryRelation
            | ResourceKind::Currency => &[],
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.segment())
    }
}

/// A row that can be loaded by its primary key.
pub trait Record: for<'r> sqlx::FromRow<'r, PgRow> + Send + Unpin + 'static {
    const KIND: ResourceKind;
    /// Select list used to load the row.
    const COLUMNS: &'static str;
}

/// Load one record of type `R` by id.
pub struct GetById<R> {
    pub id: String,
    record: PhantomData<fn() -> R>,
}

impl<R> GetById<R> {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            record: PhantomData,
        }
    }
}

impl<R: Record> Processor<GetById<R>> for DatabaseProcessor {
    type Output = Option<R>;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:GetById", fields(kind = R::KIND.segment(), id = %query.id))]
    async fn process(&self, query: GetById<R>) -> Result<Option<R>, sqlx::Error> {
        let layout = R::KIND.table();
        let sql = format!(
            "SELECT {} FROM {} WHERE {} = $1",
            R::COLUMNS,
            layout.table,
            layout.id_column
        );
        sqlx::query_as::<_, R>(&sql)
            .bind(&query.id)
            .fetch_optional(&self.pool)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_segments_are_distinct() {
        let mut segments: Vec<_> = ResourceKind::ALL.iter().map(|kind| kind.segment()).collect();
        segments.sort_unstable();
        segments.dedup();
        assert_eq!(segments.len(), ResourceKind::ALL.len());
    }

    #[test]
    fn test_dependent_columns_exist_on_child_tables() {
        for kind in ResourceKind::ALL {
            for dependent in kind.dependents() {
                let child = dependent.kind.table();
                let known = child.id_column == dependent.parent_column
                    || child.scope_columns.contains(&dependent.parent_column)
                    || dependent.parent_column == "by_id";
                assert!(known, "{kind} -> {:?}", dependent);
            }
        }
    }

    #[test]
    fn test_leaf_kinds_have_no_dependents() {
        assert!(ResourceKind::ExpenseStake.dependents().is_empty());
        assert!(ResourceKind::ExpenseCategoryRelation.dependents().is_empty());
        assert!(ResourceKind::Currency.dependents().is_empty());
    }
}
