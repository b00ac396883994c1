//! Fixed-delay retry around a `Transport`
//!
//! Listing and detail pages are fetched through `RetryingFetcher`. With the
//! default policy a failing URL is retried forever, five seconds apart, and
//! the caller never sees an error. A bounded policy (attempt limit and/or
//! wall-clock budget) turns that into a reported `FetchError`.

use crate::config::RetryConfig;
use crate::fetcher::{Document, Transport, TransportError};
use std::convert::Infallible;
use std::fmt::Display;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;

/// Default delay between attempts
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(5);

/// A fetch gave up under a bounded retry policy
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchError {
    #[error("giving up on {url} after {attempts} attempts: {last_error}")]
    Exhausted {
        url: String,
        attempts: u32,
        last_error: TransportError,
    },

    #[error("giving up on {url} after {attempts} attempts in {elapsed:?}: {last_error}")]
    BudgetExceeded {
        url: String,
        attempts: u32,
        elapsed: Duration,
        last_error: TransportError,
    },
}

/// When and how long to retry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Sleep between attempts
    pub delay: Duration,

    /// Maximum number of attempts, `None` for no limit
    pub max_attempts: Option<u32>,

    /// Maximum time spent on one fetch, `None` for no limit
    pub budget: Option<Duration>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            delay: DEFAULT_RETRY_DELAY,
            max_attempts: None,
            budget: None,
        }
    }
}

impl RetryPolicy {
    pub fn from_config(config: &RetryConfig) -> Self {
        Self {
            delay: config.delay(),
            max_attempts: config.max_attempts.as_option(),
            budget: config.budget(),
        }
    }

    pub fn is_unbounded(&self) -> bool {
        self.max_attempts.is_none() && self.budget.is_none()
    }
}

/// Fetches one URL, retrying transient failures per the policy
#[derive(Clone)]
pub struct RetryingFetcher {
    transport: Arc<dyn Transport>,
    policy: RetryPolicy,
}

impl RetryingFetcher {
    pub fn new(transport: Arc<dyn Transport>, policy: RetryPolicy) -> Self {
        Self { transport, policy }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Fetches `url`, retrying transport failures
    pub async fn fetch(&self, url: &str) -> Result<Document, FetchError> {
        self.fetch_with(url, |document| Ok::<_, Infallible>(document.clone()))
            .await
    }

    /// Fetches `url` and parses it, treating a parse failure as a malformed
    /// response that is retried like any other transient failure
    ///
    /// A page served with a non-2xx status is never parsed; it counts as a
    /// failed attempt with `TransportError::Status`.
    pub async fn fetch_with<T, E, F>(&self, url: &str, parse: F) -> Result<T, FetchError>
    where
        E: Display,
        F: Fn(&Document) -> Result<T, E>,
    {
        let started = Instant::now();
        let mut attempts = 0u32;

        loop {
            attempts += 1;
            let error = match self.transport.get(url).await {
                Ok(document) if !document.is_success() => {
                    TransportError::Status(document.status)
                }
                Ok(document) => match parse(&document) {
                    Ok(parsed) => return Ok(parsed),
                    Err(e) => TransportError::Malformed(e.to_string()),
                },
                Err(e) => e,
            };

            if let Some(max) = self.policy.max_attempts {
                if attempts >= max {
                    tracing::error!("Fetch of {} failed {} times: {}", url, attempts, error);
                    return Err(FetchError::Exhausted {
                        url: url.to_string(),
                        attempts,
                        last_error: error,
                    });
                }
            }

            if let Some(budget) = self.policy.budget {
                let elapsed = started.elapsed();
                if elapsed + self.policy.delay > budget {
                    tracing::error!(
                        "Fetch of {} out of time after {} attempts: {}",
                        url,
                        attempts,
                        error
                    );
                    return Err(FetchError::BudgetExceeded {
                        url: url.to_string(),
                        attempts,
                        elapsed,
                        last_error: error,
                    });
                }
            }

            tracing::warn!(
                "Encountered {} when fetching {}; sleeping for {:?} (attempt {})",
                error,
                url,
                self.policy.delay,
                attempts
            );
            tokio::time::sleep(self.policy.delay).await;
        }
    }
}
