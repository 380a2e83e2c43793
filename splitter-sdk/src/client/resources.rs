//! HTTP client for the cascade-delete endpoints.

use reqwest::Client;
use url::Url;

use super::{ClientError, endpoint};
use crate::objects::ErrorBody;

/// Typed HTTP client for resource deletion.
#[derive(Debug, Clone)]
pub struct ResourceClient {
    http: Client,
    base_url: Url,
}

impl ResourceClient {
    /// * `base_url` – root URL of the splitter server (e.g. `http://localhost:8080/`).
    pub fn new(base_url: Url) -> Self {
        Self {
            http: Client::new(),
            base_url,
        }
    }

    /// Replace the default `reqwest::Client` with a custom one.
    pub fn with_http_client(mut self, client: Client) -> Self {
        self.http = client;
        self
    }

    /// `DELETE /groups/{id}` – removes the group with its people,
    /// categories and expenses.
    pub async fn delete_group(&self, id: &str) -> Result<(), ClientError> {
        self.delete(&["groups", id]).await
    }

    /// `DELETE /people/{id}` – removes the person and the expenses they paid.
    pub async fn delete_person(&self, id: &str) -> Result<(), ClientError> {
        self.delete(&["people", id]).await
    }

    pub async fn delete_category(&self, id: &str) -> Result<(), ClientError> {
        self.delete(&["categories", id]).await
    }

    /// `DELETE /expenses/{id}` – removes the expense, its stakes and its
    /// category relations.
    pub async fn delete_expense(&self, id: &str) -> Result<(), ClientError> {
        self.delete(&["expenses", id]).await
    }

    pub async fn delete_expense_stake(&self, id: &str) -> Result<(), ClientError> {
        self.delete(&["expense-stakes", id]).await
    }

    pub async fn delete_expense_category_relation(
        &self,
        expense_id: &str,
        category_id: &str,
    ) -> Result<(), ClientError> {
        self.delete(&["expenses", expense_id, "categories", category_id])
            .await
    }

    async fn delete(&self, segments: &[&str]) -> Result<(), ClientError> {
        let url = endpoint(&self.base_url, segments)?;
        let resp = self.http.delete(url).send().await?;
        let status = resp.status();
        if status.is_success() {
            return Ok(());
        }
        let body = resp.text().await.unwrap_or_default();
        match serde_json::from_str::<ErrorBody>(&body) {
            Ok(error) => Err(ClientError::Rejected(error)),
            Err(_) => Err(ClientError::Api { status, body }),
        }
    }
}
