use crate::entities::{CurrencyDirectory, ResourceKind};
use crate::events::SubjectRouter;
use crate::rates::RateProvider;
use crate::streaming::StreamError;
use tracing::debug;

/// Computes the exchange rate between two stored currencies.
#[derive(Debug, Clone)]
pub struct ExchangeRateSource<C, P> {
    currencies: C,
    provider: P,
}

impl<C: CurrencyDirectory, P: RateProvider> ExchangeRateSource<C, P> {
    pub fn new(currencies: C, provider: P) -> Self {
        Self {
            currencies,
            provider,
        }
    }

    /// Latest rate from `source_id` to `destination_id`, or `None` if either
    /// currency does not exist.
    pub async fn current(
        &self,
        source_id: &str,
        destination_id: &str,
    ) -> Result<Option<f64>, StreamError> {
        let Some(source) = self.currencies.acronym(source_id).await? else {
            debug!(source_id, "Source currency missing");
            return Ok(None);
        };
        let Some(destination) = self.currencies.acronym(destination_id).await? else {
            debug!(destination_id, "Destination currency missing");
            return Ok(None);
        };
        if source.eq_ignore_ascii_case(&destination) {
            return Ok(Some(1.0));
        }
        let rate = self.provider.rate(&source, &destination).await?;
        Ok(Some(rate))
    }
}

/// Subscription patterns covering both upstream currencies of a rate.
pub fn exchange_rate_patterns(
    router: &SubjectRouter,
    source_id: &str,
    destination_id: &str,
) -> Vec<String> {
    let mut patterns = vec![router.resource_pattern(ResourceKind::Currency, &[], source_id)];
    if destination_id != source_id {
        patterns.push(router.resource_pattern(ResourceKind::Currency, &[], destination_id));
    }
    patterns
}
