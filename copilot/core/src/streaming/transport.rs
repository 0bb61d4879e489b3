//! Insight Transport
//!
//! The seam between a session and the network. A transport opens the insight
//! endpoint for a user and hands back the raw body as a byte stream; it knows
//! nothing about decoding or playback.
//!
//! # Endpoint scopes
//!
//! The backend exposes the same stream two ways:
//!
//! - [`EndpointScope::PerUser`]: `GET {base}/ai-stream/{user_id}`
//! - [`EndpointScope::Token`]: `GET {base}/ai-stream`, user taken from the token
//!
//! Both send `Authorization: Bearer <token>`.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::ApiConfig;
use crate::error::{InsightError, TransportError};

/// Raw response body, block by block
pub type ByteStream = BoxStream<'static, Result<Bytes, InsightError>>;

/// Opaque bearer token produced by the external login flow
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    /// Wrap a token
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// The raw token, for building the authorization header
    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Whether the token is empty or whitespace
    #[must_use]
    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(***)")
    }
}

/// Who the insight is for and how to prove it
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InsightRequest {
    /// Backend user id
    pub user_id: u64,
    /// Bearer token (None = not logged in)
    pub credential: Option<Credential>,
}

impl InsightRequest {
    /// Create a request for a user, with no credential yet
    #[must_use]
    pub fn new(user_id: u64) -> Self {
        Self {
            user_id,
            credential: None,
        }
    }

    /// Attach the bearer token
    #[must_use]
    pub fn with_credential(mut self, credential: Credential) -> Self {
        self.credential = Some(credential);
        self
    }

    /// The credential, if present and non-blank
    #[must_use]
    pub fn usable_credential(&self) -> Option<&Credential> {
        self.credential.as_ref().filter(|c| !c.is_blank())
    }
}

/// Which flavor of the stream endpoint to call
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EndpointScope {
    /// User id in the path
    #[default]
    PerUser,
    /// User resolved from the bearer token
    Token,
}

impl FromStr for EndpointScope {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "per_user" | "per-user" | "user" => Ok(Self::PerUser),
            "token" | "token_scoped" | "token-scoped" => Ok(Self::Token),
            other => Err(format!("unknown endpoint scope '{other}'")),
        }
    }
}

/// Source of insight byte streams
///
/// Implement this to point sessions at something other than the HTTP
/// backend, a scripted stream in tests for instance.
#[async_trait]
pub trait InsightTransport: Send + Sync {
    /// Short name for logs
    fn name(&self) -> &str;

    /// Open the stream for `request`
    ///
    /// Resolves once the response head has arrived. Failures before the
    /// first body byte (missing credential, connect errors, non-success
    /// status) are reported here; later ones come through the stream.
    async fn open(&self, request: &InsightRequest) -> Result<ByteStream, InsightError>;
}

/// Insight transport over the backend's HTTP endpoint
#[derive(Clone)]
pub struct HttpTransport {
    /// Backend base URL, without trailing slash
    base_url: String,
    /// Endpoint flavor
    scope: EndpointScope,
    /// HTTP client
    http_client: reqwest::Client,
}

impl HttpTransport {
    /// Create a transport
    ///
    /// Only the connect phase is bounded by `connect_timeout`; an insight
    /// body may legitimately take a long time to finish, so idle reads are
    /// bounded by the reader instead.
    ///
    /// # Errors
    ///
    /// Fails if the TLS backend cannot be initialized.
    pub fn new(
        base_url: impl Into<String>,
        scope: EndpointScope,
        connect_timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        let http_client = reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .build()?;

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            scope,
            http_client,
        })
    }

    /// Create from the `[api]` configuration section
    ///
    /// # Errors
    ///
    /// Fails if the HTTP client cannot be built.
    pub fn from_config(config: &ApiConfig) -> Result<Self, reqwest::Error> {
        Self::new(config.base_url.clone(), config.scope, config.connect_timeout)
    }

    /// Endpoint scope in use
    #[must_use]
    pub fn scope(&self) -> EndpointScope {
        self.scope
    }

    /// URL of the stream endpoint for `request`
    #[must_use]
    pub fn stream_url(&self, request: &InsightRequest) -> String {
        match self.scope {
            EndpointScope::PerUser => format!("{}/ai-stream/{}", self.base_url, request.user_id),
            EndpointScope::Token => format!("{}/ai-stream", self.base_url),
        }
    }
}

#[async_trait]
impl InsightTransport for HttpTransport {
    fn name(&self) -> &'static str {
        "http"
    }

    async fn open(&self, request: &InsightRequest) -> Result<ByteStream, InsightError> {
        let credential = request
            .usable_credential()
            .ok_or_else(InsightError::missing_credential)?;

        let url = self.stream_url(request);
        debug!(url = %url, scope = ?self.scope, "opening insight stream");

        let response = self
            .http_client
            .get(&url)
            .bearer_auth(credential.expose())
            .header(reqwest::header::ACCEPT, "text/plain")
            .send()
            .await
            .map_err(|e| InsightError::from_reqwest(&e, &url))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(InsightError::from_status(status.as_u16(), &body));
        }

        let stream = response.bytes_stream().map(|block| {
            block.map_err(|e| InsightError::from(TransportError::Dropped(e.to_string())))
        });

        Ok(stream.boxed())
    }
}
