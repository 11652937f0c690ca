//! HTTP client with retry and backoff shared by the OCR and LLM services.

use backoff::{future::retry_notify, ExponentialBackoff};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use crate::error::{Result, SentinelError};

/// Error constructor for the calling service (`SentinelError::OcrError`,
/// `SentinelError::LlmError`).
pub type ServiceError = fn(String) -> SentinelError;

#[derive(Debug, Clone)]
pub struct HttpConfig {
    /// Per-request timeout.
    pub timeout: Duration,
    /// Maximum retry attempts for transient errors.
    pub max_retries: u32,
    pub initial_interval: Duration,
    pub max_interval: Duration,
    /// Refuse plain-HTTP endpoints. Tests against local stubs turn this off.
    pub require_https: bool,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(60),
            max_retries: 3,
            initial_interval: Duration::from_millis(250),
            max_interval: Duration::from_secs(4),
            require_https: true,
        }
    }
}

pub struct RetryingClient {
    client: Client,
    config: HttpConfig,
}

impl RetryingClient {
    pub fn new(config: HttpConfig, make_err: ServiceError) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .https_only(config.require_https)
            .build()
            .map_err(|e| make_err(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self { client, config })
    }

    pub fn config(&self) -> &HttpConfig {
        &self.config
    }

    /// Send a request built by `build`, retrying transient failures, and
    /// return the first successful response.
    pub async fn send<F>(&self, service: &str, make_err: ServiceError, build: F) -> Result<Response>
    where
        F: Fn(&Client) -> RequestBuilder,
    {
        retry_notify(
            self.build_backoff(),
            || {
                let build = &build;
                async move { self.send_once(service, make_err, build).await }
            },
            |err: SentinelError, duration: Duration| {
                warn!(
                    service,
                    error = %err,
                    retry_after_ms = duration.as_millis() as u64,
                    "Retry scheduled"
                );
            },
        )
        .await
    }

    async fn send_once<F>(
        &self,
        service: &str,
        make_err: ServiceError,
        build: &F,
    ) -> std::result::Result<Response, backoff::Error<SentinelError>>
    where
        F: Fn(&Client) -> RequestBuilder,
    {
        let start = Instant::now();

        let response = build(&self.client).send().await.map_err(|e| {
            let latency_ms = start.elapsed().as_millis() as u64;
            if is_transient_error(&e) {
                warn!(service, error = %e, latency_ms, "Transient error, will retry");
                backoff::Error::transient(make_err(format!("{service} request failed: {e}")))
            } else {
                warn!(service, error = %e, latency_ms, "Permanent error, aborting");
                backoff::Error::permanent(make_err(format!("{service} request failed: {e}")))
            }
        })?;

        let status = response.status();
        let latency_ms = start.elapsed().as_millis() as u64;
        debug!(service, status = %status, latency_ms, "Received HTTP response");

        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let err = make_err(format!(
            "{service} returned status {status}: {}",
            truncate(body.trim(), 300)
        ));
        if is_transient_status(status) {
            warn!(service, status = %status, "Transient HTTP status, will retry");
            Err(backoff::Error::transient(err))
        } else {
            warn!(service, status = %status, "Permanent HTTP error");
            Err(backoff::Error::permanent(err))
        }
    }

    fn build_backoff(&self) -> ExponentialBackoff {
        ExponentialBackoff {
            initial_interval: self.config.initial_interval,
            max_interval: self.config.max_interval,
            max_elapsed_time: Some(self.config.timeout * self.config.max_retries.max(1)),
            ..Default::default()
        }
    }
}

fn truncate(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_status_codes() {
        assert!(is_transient_status(StatusCode::TOO_MANY_REQUESTS));
        assert!(is_transient_status(StatusCode::SERVICE_UNAVAILABLE));
        assert!(is_transient_status(StatusCode::GATEWAY_TIMEOUT));
        assert!(is_transient_status(StatusCode::BAD_GATEWAY));
        assert!(!is_transient_status(StatusCode::UNAUTHORIZED));
        assert!(!is_transient_status(StatusCode::INTERNAL_SERVER_ERROR));
    }

    #[test]
    fn test_truncate_respects_char_boundaries() {
        assert_eq!(truncate("héllo", 2), "hé");
        assert_eq!(truncate("abc", 10), "abc");
    }

    #[test]
    fn test_https_required_by_default() {
        assert!(HttpConfig::default().require_https);
    }
}
