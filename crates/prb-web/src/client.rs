#![forbid(unsafe_code)]

//! `reqwest`-backed [`Fetch`] implementation.

use std::time::Duration;

use async_trait::async_trait;
use prb_core::{BlockerRecord, ConfigError, Endpoint, Fetch, FetchError};
use reqwest::header::CONTENT_TYPE;
use thiserror::Error;

use crate::decode::decode_response;

/// Where and how to reach the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpFetcherConfig {
    /// Server root, including any context path (`https://host/bitbucket`).
    pub base_url: String,
    /// Per-request timeout.
    ///
    /// Default: 30s.
    pub timeout: Duration,
}

impl HttpFetcherConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            timeout: Duration::from_secs(30),
        }
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |message: &str| ConfigError::InvalidBaseUrl {
            url: self.base_url.clone(),
            message: message.to_string(),
        };
        let url = reqwest::Url::parse(&self.base_url).map_err(|err| invalid(&err.to_string()))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(invalid("scheme must be http or https"));
        }
        if url.query().is_some() || url.fragment().is_some() {
            return Err(invalid("must not carry a query or fragment"));
        }
        if self.timeout.is_zero() {
            return Err(ConfigError::ZeroDuration {
                field: "timeout",
                value: self.timeout,
            });
        }
        Ok(())
    }
}

#[derive(Debug, Error)]
pub enum HttpFetcherError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Fetches merge status over HTTP.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
    base_url: String,
}

impl HttpFetcher {
    pub fn new(config: HttpFetcherConfig) -> Result<Self, HttpFetcherError> {
        config.validate()?;
        let client = reqwest::Client::builder().timeout(config.timeout).build()?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Absolute URL for `endpoint`. The endpoint path is appended verbatim so
    /// a context path in the base URL survives.
    #[must_use]
    pub fn url_for(&self, endpoint: &Endpoint) -> String {
        format!("{}{}", self.base_url, endpoint.path())
    }
}

#[async_trait(?Send)]
impl Fetch for HttpFetcher {
    async fn fetch_blockers(&self, endpoint: &Endpoint) -> Result<BlockerRecord, FetchError> {
        let url = self.url_for(endpoint);
        let response = self
            .client
            .get(&url)
            .header(CONTENT_TYPE, "application/json")
            .send()
            .await
            .map_err(|err| FetchError::transport(err.to_string()))?;
        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|err| FetchError::transport(err.to_string()))?;
        tracing::trace!(message = "http.response", url = %url, status = status.as_u16(), bytes = body.len());
        decode_response(status.as_u16(), &body)
    }
}
