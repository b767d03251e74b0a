//! # Retrying Fetcher
//!
//! A thin wrapper around `reqwest` that adds a randomized politeness delay
//! before every request, a per-attempt timeout, and classification-driven
//! retries with linear backoff.

use crate::constants::{
    DEFAULT_BACKOFF_SECS, DEFAULT_MAX_RETRIES, DEFAULT_POLITENESS_MAX_MS,
    DEFAULT_POLITENESS_MIN_MS, DEFAULT_RETRYABLE_STATUS, DEFAULT_TIMEOUT_SECS, USER_AGENT,
};
use rand::Rng;
use reqwest::Client;
use std::collections::HashSet;
use std::time::Duration;
use thiserror::Error;
use tokio::time::sleep;
use tracing::{debug, warn};

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("Failed to build HTTP client: {0}")]
    ClientBuild(#[source] reqwest::Error),
    #[error("Timed out fetching {url}")]
    Timeout { url: String },
    #[error("HTTP status {status} for {url}")]
    HttpStatus { url: String, status: u16 },
    #[error("Request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("Max retries exceeded for {url} after {attempts} attempts")]
    MaxRetriesExceeded { url: String, attempts: u32 },
}

impl FetchError {
    pub fn url(&self) -> Option<&str> {
        match self {
            FetchError::ClientBuild(_) => None,
            FetchError::Timeout { url }
            | FetchError::HttpStatus { url, .. }
            | FetchError::Request { url, .. }
            | FetchError::MaxRetriesExceeded { url, .. } => Some(url),
        }
    }
}

/// Retry and rate-limit settings for a [`RetryingFetcher`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total number of attempts, including the first.
    pub max_retries: u32,
    /// Attempt `i` sleeps `backoff_base * i` after a retryable status.
    pub backoff_base: Duration,
    pub timeout_per_attempt: Duration,
    pub retryable_status: HashSet<u16>,
    pub politeness_min: Duration,
    pub politeness_max: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            backoff_base: Duration::from_secs(DEFAULT_BACKOFF_SECS),
            timeout_per_attempt: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            retryable_status: DEFAULT_RETRYABLE_STATUS.into_iter().collect(),
            politeness_min: Duration::from_millis(DEFAULT_POLITENESS_MIN_MS),
            politeness_max: Duration::from_millis(DEFAULT_POLITENESS_MAX_MS),
        }
    }
}

impl RetryPolicy {
    /// Disables the politeness delay and the backoff sleeps.
    pub fn without_delays(mut self) -> Self {
        self.politeness_min = Duration::ZERO;
        self.politeness_max = Duration::ZERO;
        self.backoff_base = Duration::ZERO;
        self
    }

    pub fn is_retryable_status(&self, status: u16) -> bool {
        self.retryable_status.contains(&status)
    }

    /// Draws the pre-request pause uniformly from the politeness interval.
    pub fn politeness_delay(&self) -> Duration {
        let min = self.politeness_min.as_millis() as u64;
        let max = self.politeness_max.as_millis() as u64;
        if max <= min {
            return Duration::from_millis(min);
        }
        Duration::from_millis(rand::rng().random_range(min..=max))
    }
}

/// A successfully fetched response body.
#[derive(Debug, Clone)]
pub struct Fetched {
    pub url: String,
    pub status: u16,
    pub body: Vec<u8>,
}

impl Fetched {
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Issues GET requests under a [`RetryPolicy`].
///
/// Holds no mutable state, so one instance can serve concurrent calls for
/// different URLs.
#[derive(Debug, Clone)]
pub struct RetryingFetcher {
    client: Client,
    policy: RetryPolicy,
}

impl RetryingFetcher {
    pub fn new(policy: RetryPolicy) -> Result<Self, FetchError> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .map_err(FetchError::ClientBuild)?;
        Ok(Self { client, policy })
    }

    pub fn with_client(client: Client, policy: RetryPolicy) -> Self {
        Self { client, policy }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Fetches `url`, retrying timeouts and retryable statuses.
    ///
    /// Any other failure is returned as soon as it happens. After
    /// `max_retries` failed attempts the result is
    /// [`FetchError::MaxRetriesExceeded`].
    pub async fn fetch(&self, url: &str) -> Result<Fetched, FetchError> {
        let max = self.policy.max_retries;
        for attempt in 1..=max {
            let pause = self.policy.politeness_delay();
            if !pause.is_zero() {
                sleep(pause).await;
            }

            match self.attempt(url).await {
                Ok(fetched) => {
                    debug!("Fetched {} ({} bytes) on attempt {attempt}", url, fetched.body.len());
                    return Ok(fetched);
                }
                Err(FetchError::HttpStatus { status, .. })
                    if self.policy.is_retryable_status(status) =>
                {
                    if attempt < max {
                        let backoff = self.policy.backoff_base * attempt;
                        warn!(
                            "{status} for {url}, attempt {attempt}/{max}, sleeping {:.1}s and retrying",
                            backoff.as_secs_f32()
                        );
                        sleep(backoff).await;
                    } else {
                        warn!("{status} for {url}, attempt {attempt}/{max}, giving up");
                    }
                }
                Err(FetchError::Timeout { .. }) => {
                    warn!("Timeout for {url}, attempt {attempt}/{max}");
                }
                Err(e) => return Err(e),
            }
        }

        Err(FetchError::MaxRetriesExceeded {
            url: url.to_string(),
            attempts: max,
        })
    }

    async fn attempt(&self, url: &str) -> Result<Fetched, FetchError> {
        let response = self
            .client
            .get(url)
            .timeout(self.policy.timeout_per_attempt)
            .send()
            .await
            .map_err(|e| classify(url, e))?;

        let status = response.status().as_u16();
        if self.policy.is_retryable_status(status) || !response.status().is_success() {
            return Err(FetchError::HttpStatus {
                url: url.to_string(),
                status,
            });
        }

        let body = response.bytes().await.map_err(|e| classify(url, e))?;
        Ok(Fetched {
            url: url.to_string(),
            status,
            body: body.to_vec(),
        })
    }
}

fn classify(url: &str, error: reqwest::Error) -> FetchError {
    if error.is_timeout() {
        FetchError::Timeout {
            url: url.to_string(),
        }
    } else {
        FetchError::Request {
            url: url.to_string(),
            source: error,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_politeness_delay_stays_in_interval() {
        let policy = RetryPolicy {
            politeness_min: Duration::from_millis(10),
            politeness_max: Duration::from_millis(20),
            ..Default::default()
        };
        for _ in 0..100 {
            let d = policy.politeness_delay();
            assert!(d >= Duration::from_millis(10) && d <= Duration::from_millis(20));
        }
    }

    #[test]
    fn test_without_delays_zeroes_politeness() {
        let policy = RetryPolicy::default().without_delays();
        assert_eq!(policy.politeness_delay(), Duration::ZERO);
        assert_eq!(policy.backoff_base, Duration::ZERO);
    }
}
