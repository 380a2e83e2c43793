use crate::entities::{Record, ResourceKind};
use crate::framework::DatabaseProcessor;
use kanau::processor::Processor;
use splitter_sdk::objects::Person as SdkPerson;

#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct PersonRecord {
    pub id: String,
    pub group_id: String,
    pub name: String,
}

impl Record for PersonRecord {
    const KIND: ResourceKind = ResourceKind::Person;
    const COLUMNS: &'static str = "id, group_id, name";
}

impl From<PersonRecord> for SdkPerson {
    fn from(value: PersonRecord) -> Self {
        SdkPerson {
            id: value.id,
            group_id: value.group_id,
            name: value.name,
        }
    }
}

#[derive(Debug, Clone)]
/// Ids of the people in a group, ordered by name.
pub struct ListPersonIdsInGroup {
    pub group_id: String,
}

impl Processor<ListPersonIdsInGroup> for DatabaseProcessor {
    type Output = Vec<String>;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:ListPersonIdsInGroup")]
    async fn process(&self, query: ListPersonIdsInGroup) -> Result<Vec<String>, sqlx::Error> {
        sqlx::query_scalar::<_, String>(
            r#"
            SELECT id FROM people
            WHERE group_id = $1
            ORDER BY name ASC, id ASC
            "#,
        )
        .bind(query.group_id)
        .fetch_all(&self.pool)
        .await
    }
}

#[derive(Debug, Clone)]
/// Ids of every person across all groups, ordered by name.
pub struct ListPersonIds;

impl Processor<ListPersonIds> for DatabaseProcessor {
    type Output = Vec<String>;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:ListPersonIds")]
    async fn process(&self, _query: ListPersonIds) -> Result<Vec<String>, sqlx::Error> {
        sqlx::query_scalar::<_, String>("SELECT id FROM people ORDER BY name ASC, id ASC")
            .fetch_all(&self.pool)
            .await
    }
}
