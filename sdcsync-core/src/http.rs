//! Shared HTTP fetcher with retry and backoff.
//!
//! Every outbound request (record API, image download, record page scrape)
//! goes through [`HttpFetcher`]: one client, one user agent, a per-request
//! timeout and a bounded number of retries for transient failures.

use std::sync::atomic::{AtomicU32, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use backoff::{future::retry_notify, ExponentialBackoff};
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use tracing::{debug, instrument, warn};

use crate::config::SyncConfig;
use crate::error::{Result, SyncError};
use crate::fingerprint::ImageSource;
use crate::identifier::PageSource;

/// Initial retry interval.
const INITIAL_INTERVAL: Duration = Duration::from_millis(250);

/// Maximum retry interval.
const MAX_INTERVAL: Duration = Duration::from_secs(4);

#[derive(Debug, Clone)]
pub struct HttpConfig {
    pub user_agent: String,
    /// Request timeout.
    pub timeout: Duration,
    /// Maximum retry attempts for transient errors.
    pub max_retries: u32,
    pub initial_interval: Duration,
    pub max_interval: Duration,
}

impl From<&SyncConfig> for HttpConfig {
    fn from(config: &SyncConfig) -> Self {
        Self {
            user_agent: config.user_agent.clone(),
            timeout: config.http_timeout(),
            max_retries: config.http_max_retries,
            initial_interval: INITIAL_INTERVAL,
            max_interval: MAX_INTERVAL,
        }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self::from(&SyncConfig::default())
    }
}

/// HTTP client shared by the catalog client and the image/page sources.
pub struct HttpFetcher {
    client: Client,
    config: HttpConfig,
}

impl HttpFetcher {
    pub fn new(config: HttpConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| SyncError::Config(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self { client, config })
    }

    /// Response body as bytes.
    #[instrument(skip(self))]
    pub async fn get_bytes(&self, url: &str) -> Result<Vec<u8>> {
        let attempts = AtomicU32::new(0);

        retry_notify(
            self.build_backoff(),
            || {
                let attempts = &attempts;
                async move {
                    let attempt = attempts.fetch_add(1, Ordering::Relaxed);
                    self.get_once(url).await.map_err(|err| match err {
                        backoff::Error::Transient { err, .. } if attempt >= self.config.max_retries => {
                            warn!(url, attempts = attempt + 1, "Retries exhausted");
                            backoff::Error::permanent(err)
                        }
                        other => other,
                    })
                }
            },
            |err: SyncError, duration: Duration| {
                warn!(
                    error = %err,
                    retry_after_ms = duration.as_millis() as u64,
                    "Retry scheduled"
                );
            },
        )
        .await
    }

    /// Response body as text. Invalid UTF-8 is replaced.
    pub async fn get_text(&self, url: &str) -> Result<String> {
        let bytes = self.get_bytes(url).await?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    pub async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        let bytes = self.get_bytes(url).await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    async fn get_once(&self, url: &str) -> std::result::Result<Vec<u8>, backoff::Error<SyncError>> {
        let start = Instant::now();

        let response = self.client.get(url).send().await.map_err(|e| {
            let latency_ms = start.elapsed().as_millis() as u64;
            if is_transient_error(&e) {
                warn!(error = %e, latency_ms, "Transient error, will retry");
                backoff::Error::transient(SyncError::NetworkFailure(format!(
                    "Transient error (will retry): {e}"
                )))
            } else {
                warn!(error = %e, latency_ms, "Permanent error, aborting");
                backoff::Error::permanent(SyncError::NetworkFailure(format!(
                    "Request to {url} failed: {e}"
                )))
            }
        })?;

        let status = response.status();
        debug!(status = %status, "Received HTTP response");

        if !status.is_success() {
            let latency_ms = start.elapsed().as_millis() as u64;
            let err = SyncError::NetworkFailure(format!("{url} returned status: {status}"));
            return if is_transient_status(status) {
                warn!(status = %status, latency_ms, "Transient HTTP status, will retry");
                Err(backoff::Error::transient(err))
            } else {
                warn!(status = %status, latency_ms, "Permanent HTTP error");
                Err(backoff::Error::permanent(err))
            };
        }

        let body = response.bytes().await.map_err(|e| {
            warn!(error = %e, "Failed to read response body");
            backoff::Error::transient(SyncError::NetworkFailure(format!(
                "Failed to read body of {url}: {e}"
            )))
        })?;

        debug!(
            latency_ms = start.elapsed().as_millis() as u64,
            bytes = body.len(),
            "Request completed successfully"
        );
        Ok(body.to_vec())
    }

    fn build_backoff(&self) -> ExponentialBackoff {
        ExponentialBackoff {
            initial_interval: self.config.initial_interval,
            max_interval: self.config.max_interval,
            max_elapsed_time: Some(self.config.timeout * (self.config.max_retries + 1)),
            ..Default::default()
        }
    }
}

#[async_trait]
impl ImageSource for HttpFetcher {
    async fn fetch_image(&self, url: &str) -> Result<Vec<u8>> {
        self.get_bytes(url).await
    }
}

#[async_trait]
impl PageSource for HttpFetcher {
    async fn fetch_page(&self, url: &str) -> Result<String> {
        self.get_text(url).await
    }
}

/// Check if a reqwest error is transient and should be retried.
pub fn is_transient_error(error: &reqwest::Error) -> bool {
    error.is_timeout() || error.is_connect() || error.is_request()
}

/// Check if an HTTP status code indicates a transient error.
pub fn is_transient_status(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::TOO_MANY_REQUESTS
            | StatusCode::SERVICE_UNAVAILABLE
            | StatusCode::GATEWAY_TIMEOUT
            | StatusCode::BAD_GATEWAY
    )
}
