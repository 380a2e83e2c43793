//! Exchange rates from the public currency API.

use std::time::Duration;
use tracing::{debug, error};
use url::Url;

pub const DEFAULT_RATES_BASE_URL: &str = "https://cdn.jsdelivr.net/gh/fawazahmed0/currency-api@1";

#[derive(Debug, thiserror::Error)]
pub enum RateError {
    #[error("HTTP request error: {0}")]
    Request(#[from] reqwest::Error),

    #[error("invalid rate url: {0}")]
    Url(#[from] url::ParseError),

    #[error("no exchange rate from {source_acronym} to {destination_acronym}")]
    NotFound {
        source_acronym: String,
        destination_acronym: String,
    },

    #[error("exchange rate response has no numeric {0} field")]
    Malformed(String),
}

pub trait RateProvider: Send + Sync {
    /// How many units of `destination` one unit of `source` buys today.
    fn rate(
        &self,
        source_acronym: &str,
        destination_acronym: &str,
    ) -> impl Future<Output = Result<f64, RateError>> + Send;
}

#[derive(Debug, Clone)]
pub struct HttpRateProvider {
    http: reqwest::Client,
    base_url: Url,
}

impl HttpRateProvider {
    pub fn new(base_url: Url, timeout: Duration) -> Result<Self, RateError> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { http, base_url })
    }

    fn rate_url(&self, source: &str, destination: &str) -> Result<Url, RateError> {
        let mut base = self.base_url.clone();
        if !base.path().ends_with('/') {
            base.set_path(&format!("{}/", base.path()));
        }
        Ok(base.join(&format!("latest/currencies/{source}/{destination}.json"))?)
    }
}

impl RateProvider for HttpRateProvider {
    async fn rate(
        &self,
        source_acronym: &str,
        destination_acronym: &str,
    ) -> Result<f64, RateError> {
        let source = source_acronym.to_lowercase();
        let destination = destination_acronym.to_lowercase();
        let url = self.rate_url(&source, &destination)?;
        debug!(%url, "Fetching exchange rate");

        let response = self.http.get(url).send().await?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            error!(%source, %destination, "Exchange rate not found");
            return Err(RateError::NotFound {
                source_acronym: source,
                destination_acronym: destination,
            });
        }
        let body: serde_json::Value = response.error_for_status()?.json().await?;
        parse_rate(&body, &destination)
    }
}

fn parse_rate(body: &serde_json::Value, destination: &str) -> Result<f64, RateError> {
    body.get(destination)
        .and_then(serde_json::Value::as_f64)
        .ok_or_else(|| RateError::Malformed(destination.to_string()))
}
