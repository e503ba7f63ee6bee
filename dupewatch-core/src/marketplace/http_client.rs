//! Marketplace HTTP transport with bounded retry on transient statuses.
//!
//! Only 429/502/503/504 are retried, with exponential backoff. Timeouts and
//! other request failures are returned immediately: the session records them
//! against the page and moves on. When retries run out the last status is
//! handed back to the session unchanged.

use std::future::Future;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::{Duration, Instant};

use backoff::{future::retry_notify, ExponentialBackoff};
use reqwest::{Client, StatusCode};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, instrument, warn};

use super::{PageRequest, PageResponse, PageTransport};
use crate::error::{DupewatchError, Result, TransportError};

/// Default timeout for a single request.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Default number of retries for transient statuses.
const DEFAULT_MAX_RETRIES: u32 = 2;

const INITIAL_INTERVAL: Duration = Duration::from_millis(500);

const MAX_INTERVAL: Duration = Duration::from_secs(5);

/// Configuration for the marketplace HTTP transport.
#[derive(Debug, Clone)]
pub struct HttpTransportConfig {
    /// Request timeout.
    pub timeout: Duration,
    /// Retries for transient statuses. 0 disables retrying.
    pub max_retries: u32,
    /// Initial retry interval.
    pub initial_interval: Duration,
    /// Maximum retry interval.
    pub max_interval: Duration,
}

impl Default for HttpTransportConfig {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            max_retries: DEFAULT_MAX_RETRIES,
            initial_interval: INITIAL_INTERVAL,
            max_interval: MAX_INTERVAL,
        }
    }
}

/// Outcome of one attempt that did not produce a usable page.
#[derive(Debug, Error)]
enum AttemptError {
    #[error("status {0}")]
    Status(u16),
    #[error(transparent)]
    Transport(TransportError),
}

/// `reqwest`-backed [`PageTransport`].
pub struct HttpTransport {
    client: Client,
    config: HttpTransportConfig,
}

impl HttpTransport {
    /// Create a new transport with the given configuration.
    #[instrument(level = "debug", skip_all, fields(
        timeout_ms = config.timeout.as_millis() as u64,
        max_retries = config.max_retries
    ))]
    pub fn new(config: HttpTransportConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .https_only(true)
            .build()
            .map_err(|e| {
                warn!(error = %e, "Failed to create HTTP client");
                DupewatchError::ConfigError(format!("Failed to create HTTP client: {e}"))
            })?;

        debug!("Marketplace HTTP transport created");
        Ok(Self { client, config })
    }

    pub fn config(&self) -> &HttpTransportConfig {
        &self.config
    }

    /// Send one request. Any status is returned as a response.
    async fn send_once(
        &self,
        request: &PageRequest,
    ) -> std::result::Result<PageResponse, TransportError> {
        let start = Instant::now();

        let mut builder = self.client.get(&request.url).query(&request.query);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        let response = builder.send().await.map_err(|e| {
            let latency_ms = start.elapsed().as_millis() as u64;
            warn!(error = %e, latency_ms, "Request failed");
            TransportError::from(e)
        })?;

        let status = response.status();
        debug!(status = %status, "Received HTTP response");

        if !status.is_success() {
            return Ok(PageResponse {
                status: status.as_u16(),
                body: Value::Null,
            });
        }

        let body: Value = response.json().await.map_err(|e| {
            warn!(error = %e, "Failed to read JSON body");
            TransportError::from(e)
        })?;

        debug!(
            latency_ms = start.elapsed().as_millis() as u64,
            "Request completed successfully"
        );

        Ok(PageResponse {
            status: status.as_u16(),
            body,
        })
    }

    /// Run `send` until it yields a non-transient status or `max_retries`
    /// retries are spent. Request failures are never retried.
    async fn retry_transient<F, Fut>(
        &self,
        send: F,
    ) -> std::result::Result<PageResponse, TransportError>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = std::result::Result<PageResponse, TransportError>>,
    {
        let attempts = AtomicU32::new(0);
        let attempts = &attempts;
        let send = &send;
        let max_retries = self.config.max_retries;

        let result = retry_notify(
            self.build_backoff(),
            move || async move {
                let attempt = attempts.fetch_add(1, Ordering::SeqCst);
                let response = match send().await {
                    Ok(response) => response,
                    Err(e) => return Err(backoff::Error::permanent(AttemptError::Transport(e))),
                };

                let transient = StatusCode::from_u16(response.status)
                    .map(is_transient_status)
                    .unwrap_or(false);
                if transient && attempt < max_retries {
                    warn!(status = response.status, attempt, "Transient HTTP status, will retry");
                    return Err(backoff::Error::transient(AttemptError::Status(
                        response.status,
                    )));
                }
                Ok(response)
            },
            |err: AttemptError, duration: Duration| {
                warn!(
                    error = %err,
                    retry_after_ms = duration.as_millis() as u64,
                    "Retry scheduled"
                );
            },
        )
        .await;

        match result {
            Ok(response) => Ok(response),
            Err(AttemptError::Status(status)) => Ok(PageResponse {
                status,
                body: Value::Null,
            }),
            Err(AttemptError::Transport(err)) => Err(err),
        }
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

#[async_trait::async_trait]
impl PageTransport for HttpTransport {
    #[instrument(level = "debug", skip_all, fields(url = %request.url))]
    async fn fetch_page(
        &self,
        request: &PageRequest,
    ) -> std::result::Result<PageResponse, TransportError> {
        self.retry_transient(|| self.send_once(request)).await
    }
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_status_codes() {
        assert!(is_transient_status(StatusCode::TOO_MANY_REQUESTS));
        assert!(is_transient_status(StatusCode::SERVICE_UNAVAILABLE));
        assert!(is_transient_status(StatusCode::GATEWAY_TIMEOUT));
        assert!(is_transient_status(StatusCode::BAD_GATEWAY));
        assert!(!is_transient_status(StatusCode::NOT_FOUND));
        assert!(!is_transient_status(StatusCode::FORBIDDEN));
        assert!(!is_transient_status(StatusCode::INTERNAL_SERVER_ERROR));
    }

    #[test]
    fn test_default_config() {
        let config = HttpTransportConfig::default();
        assert_eq!(config.timeout, DEFAULT_TIMEOUT);
        assert_eq!(config.max_retries, DEFAULT_MAX_RETRIES);
    }

    #[test]
    fn test_create_transport() {
        let transport = HttpTransport::new(HttpTransportConfig {
            timeout: Duration::from_secs(5),
            ..Default::default()
        });
        assert!(transport.is_ok());
    }

    fn fast_transport(max_retries: u32) -> HttpTransport {
        HttpTransport::new(HttpTransportConfig {
            timeout: Duration::from_secs(5),
            max_retries,
            initial_interval: Duration::from_millis(1),
            max_interval: Duration::from_millis(5),
        })
        .unwrap()
    }

    fn status(status: u16) -> PageResponse {
        PageResponse {
            status,
            body: Value::Null,
        }
    }

    #[tokio::test]
    async fn test_persistent_transient_status_is_returned_after_retries() {
        let transport = fast_transport(2);
        let calls = AtomicU32::new(0);
        let counter = &calls;

        let response = transport
            .retry_transient(move || async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(status(503))
            })
            .await
            .unwrap();

        assert_eq!(response.status, 503);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_transient_status_recovers() {
        let transport = fast_transport(2);
        let calls = AtomicU32::new(0);
        let counter = &calls;

        let response = transport
            .retry_transient(move || async move {
                match counter.fetch_add(1, Ordering::SeqCst) {
                    0 => Ok(status(429)),
                    _ => Ok(PageResponse::ok(serde_json::json!({ "items": [] }))),
                }
            })
            .await
            .unwrap();

        assert_eq!(response.status, 200);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_other_statuses_are_not_retried() {
        for (max_retries, code) in [(2, 403), (2, 500), (0, 503)] {
            let transport = fast_transport(max_retries);
            let calls = AtomicU32::new(0);
            let counter = &calls;

            let response = transport
                .retry_transient(move || async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Ok(status(code))
                })
                .await
                .unwrap();

            assert_eq!(response.status, code);
            assert_eq!(calls.load(Ordering::SeqCst), 1);
        }
    }

    #[tokio::test]
    async fn test_request_failure_is_not_retried() {
        let transport = fast_transport(2);
        let calls = AtomicU32::new(0);
        let counter = &calls;

        let result = transport
            .retry_transient(move || async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err(TransportError::Request("connection reset".into()))
            })
            .await;

        assert!(matches!(result, Err(TransportError::Request(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_attempt_error_messages() {
        assert_eq!(AttemptError::Status(503).to_string(), "status 503");
        assert_eq!(
            AttemptError::Transport(TransportError::Timeout).to_string(),
            "request timed out"
        );
    }

    #[test]
    fn test_backoff_is_bounded() {
        let transport = HttpTransport::new(HttpTransportConfig::default()).unwrap();
        let backoff = transport.build_backoff();
        assert_eq!(backoff.max_elapsed_time, Some(DEFAULT_TIMEOUT * 3));
        assert_eq!(backoff.initial_interval, INITIAL_INTERVAL);
    }
}
