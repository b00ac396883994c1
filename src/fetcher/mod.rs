//! HTTP fetching for listing and detail pages
//!
//! This module contains:
//! - `Transport`: the single-attempt network seam (real HTTP or scripted in tests)
//! - `HttpTransport`: the reqwest implementation with error classification
//! - `RetryingFetcher`: fixed-delay retry around a transport

mod retry;
#[cfg(test)]
pub(crate) mod scripted;

pub use retry::{FetchError, RetryPolicy, RetryingFetcher};

use crate::config::UserAgentConfig;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use std::time::Duration;
use thiserror::Error;

/// A fetched page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    /// Final URL after redirects
    pub url: String,

    /// HTTP status code
    pub status: u16,

    /// Page body
    pub body: String,
}

impl Document {
    pub fn new(url: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            status: 200,
            body: body.into(),
        }
    }

    /// Whether the server answered with a 2xx status
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// A failed fetch attempt; every variant is considered transient
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    #[error("request timed out")]
    Timeout,

    #[error("connection failed: {0}")]
    Connect(String),

    #[error("server responded with HTTP {0}")]
    Status(u16),

    #[error("failed to read response body: {0}")]
    Body(String),

    #[error("malformed response: {0}")]
    Malformed(String),

    #[error("{0}")]
    Other(String),
}

/// One network attempt for one URL
#[async_trait]
pub trait Transport: Send + Sync {
    async fn get(&self, url: &str) -> Result<Document, TransportError>;
}

/// Builds an HTTP client with proper configuration
///
/// The user agent identifies the crawler and how to reach its operator:
/// `CrawlerName/Version (+ContactURL; ContactEmail)`.
pub fn build_http_client(config: &UserAgentConfig) -> Result<Client, reqwest::Error> {
    let user_agent = format!(
        "{}/{} (+{}; {})",
        config.crawler_name, config.crawler_version, config.contact_url, config.contact_email
    );

    Client::builder()
        .user_agent(user_agent)
        .timeout(Duration::from_secs(30))
        .connect_timeout(Duration::from_secs(10))
        .gzip(true)
        .brotli(true)
        .build()
}

/// reqwest-backed transport
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    pub fn from_config(config: &UserAgentConfig) -> Result<Self, reqwest::Error> {
        Ok(Self::new(build_http_client(config)?))
    }
}

#[async_trait]
impl Transport for HttpTransport {
    /// Sends a GET request and classifies the outcome
    ///
    /// | Condition | Result |
    /// |-----------|--------|
    /// | Timeout | `TransportError::Timeout` |
    /// | Connection refused / TLS | `TransportError::Connect` |
    /// | HTTP 5xx, HTTP 429 | `TransportError::Status` |
    /// | Body read failure | `TransportError::Body` |
    /// | Any other status | `Document` carrying the status |
    ///
    /// `RetryingFetcher` treats a document without a 2xx status as a failed
    /// attempt, so block pages never reach a site parser.
    async fn get(&self, url: &str) -> Result<Document, TransportError> {
        let response = self.client.get(url).send().await.map_err(classify)?;

        let status = response.status();
        if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
            return Err(TransportError::Status(status.as_u16()));
        }

        let final_url = response.url().to_string();
        let body = response
            .text()
            .await
            .map_err(|e| TransportError::Body(e.to_string()))?;

        Ok(Document {
            url: final_url,
            status: status.as_u16(),
            body,
        })
    }
}

fn classify(error: reqwest::Error) -> TransportError {
    if error.is_timeout() {
        TransportError::Timeout
    } else if error.is_connect() {
        TransportError::Connect(error.to_string())
    } else {
        TransportError::Other(error.to_string())
    }
}
