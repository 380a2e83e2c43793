use crate::entities::{Record, ResourceKind};
use crate::framework::DatabaseProcessor;
use kanau::processor::Processor;
use splitter_sdk::objects::Group as SdkGroup;

#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct GroupRecord {
    pub id: String,
    pub name: String,
    pub currency_id: String,
}

impl Record for GroupRecord {
    const KIND: ResourceKind = ResourceKind::Group;
    const COLUMNS: &'static str = "id, name, currency_id";
}

impl From<GroupRecord> for SdkGroup {
    fn from(value: GroupRecord) -> Self {
        SdkGroup {
            id: value.id,
            name: value.name,
            currency_id: value.currency_id,
        }
    }
}

#[derive(Debug, Clone)]
/// Ids of every group.
pub struct ListGroupIds;

impl Processor<ListGroupIds> for DatabaseProcessor {
    type Output = Vec<String>;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:ListGroupIds")]
    async fn process(&self, _query: ListGroupIds) -> Result<Vec<String>, sqlx::Error> {
        sqlx::query_scalar::<_, String>("SELECT id FROM groups ORDER BY id ASC")
            .fetch_all(&self.pool)
            .await
    }
}
