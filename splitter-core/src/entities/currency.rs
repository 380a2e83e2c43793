use crate::entities::{GetById, Record, ResourceKind};
use crate::framework::DatabaseProcessor;
use kanau::processor::Processor;
use splitter_sdk::objects::Currency as SdkCurrency;

#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct CurrencyRecord {
    pub id: String,
    pub acronym: String,
    pub name: String,
}

impl Record for CurrencyRecord {
    const KIND: ResourceKind = ResourceKind::Currency;
    const COLUMNS: &'static str = "id, acronym, name";
}

impl From<CurrencyRecord> for SdkCurrency {
    fn from(value: CurrencyRecord) -> Self {
        SdkCurrency {
            id: value.id,
            acronym: value.acronym,
            name: value.name,
        }
    }
}

#[derive(Debug, Clone)]
/// Ids of every currency, ordered by acronym.
pub struct ListCurrencyIds;

impl Processor<ListCurrencyIds> for DatabaseProcessor {
    type Output = Vec<String>;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:ListCurrencyIds")]
    async fn process(&self, _query: ListCurrencyIds) -> Result<Vec<String>, sqlx::Error> {
        sqlx::query_scalar::<_, String>("SELECT id FROM currencies ORDER BY acronym ASC")
            .fetch_all(&self.pool)
            .await
    }
}

/// Resolves currency ids to their ISO acronyms.
pub trait CurrencyDirectory: Send + Sync {
    fn acronym(
        &self,
        currency_id: &str,
    ) -> impl Future<Output = Result<Option<String>, sqlx::Error>> + Send;
}

impl CurrencyDirectory for DatabaseProcessor {
    async fn acronym(&self, currency_id: &str) -> Result<Option<String>, sqlx::Error> {
        let currency = self
            .process(GetById::<CurrencyRecord>::new(currency_id))
            .await?;
        Ok(currency.map(|c| c.acronym))
    }
}
