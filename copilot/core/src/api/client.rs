//! HTTP client for the finance backend

use std::time::Duration;

use serde::de::DeserializeOwned;
use tracing::debug;

use super::types::{Expense, HealthStatus, NewExpense, NewIncome, Summary};
use crate::config::ApiConfig;
use crate::streaming::Credential;

/// Timeout for the short CRUD and summary calls
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Finance backend client
#[derive(Clone)]
pub struct FinanceApi {
    /// Base URL without trailing slash
    base_url: String,
    /// Bearer token sent with every call, when present
    credential: Option<Credential>,
    /// HTTP client
    http_client: reqwest::Client,
}

impl FinanceApi {
    /// Create a client for `base_url`
    ///
    /// # Errors
    ///
    /// Fails if the TLS backend cannot be initialized.
    pub fn new(base_url: impl Into<String>, connect_timeout: Duration) -> Result<Self, reqwest::Error> {
        let http_client = reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            credential: None,
            http_client,
        })
    }

    /// Create from the `[api]` configuration section
    ///
    /// # Errors
    ///
    /// Fails if the HTTP client cannot be built.
    pub fn from_config(config: &ApiConfig) -> Result<Self, reqwest::Error> {
        Self::new(config.base_url.clone(), config.connect_timeout)
    }

    /// Attach a bearer token; blank tokens are ignored
    #[must_use]
    pub fn with_credential(mut self, credential: Credential) -> Self {
        self.credential = (!credential.is_blank()).then_some(credential);
        self
    }

    /// Base URL in use
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    fn authorize(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.credential {
            Some(credential) => builder.bearer_auth(credential.expose()),
            None => builder,
        }
    }

    async fn read_json<T: DeserializeOwned>(response: reqwest::Response) -> anyhow::Result<T> {
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("backend returned {status}: {body}");
        }
        Ok(response.json().await?)
    }

    /// Record an expense
    ///
    /// # Errors
    ///
    /// Fails on connection errors or a non-success status.
    pub async fn create_expense(&self, expense: &NewExpense) -> anyhow::Result<serde_json::Value> {
        debug!(amount = expense.amount, category = %expense.category, "recording expense");
        let response = self
            .authorize(self.http_client.post(self.url("/expenses")))
            .json(expense)
            .send()
            .await?;
        Self::read_json(response).await
    }

    /// Record income
    ///
    /// # Errors
    ///
    /// Fails on connection errors or a non-success status.
    pub async fn create_income(&self, income: &NewIncome) -> anyhow::Result<serde_json::Value> {
        debug!(amount = income.amount, source = %income.source, "recording income");
        let response = self
            .authorize(self.http_client.post(self.url("/income")))
            .json(income)
            .send()
            .await?;
        Self::read_json(response).await
    }

    /// List a user's expenses
    ///
    /// # Errors
    ///
    /// Fails on connection errors, a non-success status, or an unexpected body.
    pub async fn list_expenses(&self, user_id: u64) -> anyhow::Result<Vec<Expense>> {
        let response = self
            .authorize(self.http_client.get(self.url(&format!("/expenses/{user_id}"))))
            .send()
            .await?;
        Self::read_json(response).await
    }

    /// Fetch a user's summary
    ///
    /// # Errors
    ///
    /// Fails on connection errors, a non-success status, or an unexpected body.
    pub async fn summary(&self, user_id: u64) -> anyhow::Result<Summary> {
        let response = self
            .authorize(self.http_client.get(self.url(&format!("/summary/{user_id}"))))
            .send()
            .await?;
        Self::read_json(response).await
    }

    /// Check the backend is up
    ///
    /// # Errors
    ///
    /// Fails if the backend is unreachable or unhealthy.
    pub async fn health_check(&self) -> anyhow::Result<HealthStatus> {
        let response = self
            .http_client
            .get(self.url("/"))
            .timeout(Duration::from_secs(5))
            .send()
            .await?;
        Self::read_json(response).await
    }
}

impl std::fmt::Debug for FinanceApi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FinanceApi")
            .field("base_url", &self.base_url)
            .field("credential", &self.credential)
            .finish_non_exhaustive()
    }
}
