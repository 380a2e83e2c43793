use crate::entities::{Record, ResourceKind};
use crate::framework::DatabaseProcessor;
use kanau::processor::Processor;
use splitter_sdk::objects::Category as SdkCategory;

#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct CategoryRecord {
    pub id: String,
    pub group_id: String,
    pub name: String,
}

impl Record for CategoryRecord {
    const KIND: ResourceKind = ResourceKind::Category;
    const COLUMNS: &'static str = "id, group_id, name";
}

impl From<CategoryRecord> for SdkCategory {
    fn from(value: CategoryRecord) -> Self {
        SdkCategory {
            id: value.id,
            group_id: value.group_id,
            name: value.name,
        }
    }
}

#[derive(Debug, Clone)]
/// Ids of the categories in a group, ordered by name.
pub struct ListCategoryIdsInGroup {
    pub group_id: String,
}

impl Processor<ListCategoryIdsInGroup> for DatabaseProcessor {
    type Output = Vec<String>;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:ListCategoryIdsInGroup")]
    async fn process(&self, query: ListCategoryIdsInGroup) -> Result<Vec<String>, sqlx::Error> {
        sqlx::query_scalar::<_, String>(
            r#"
            SELECT id FROM categories
            WHERE group_id = $1
            ORDER BY name ASC, id ASC
            "#,
        )
        .bind(query.group_id)
        .fetch_all(&self.pool)
        .await
    }
}
