//! Shared outbound HTTP transport.
//!
//! Every remote call in the engine goes through [`HttpTransport::send`]:
//! it waits for a slot on the global rate limiter, sends the identifying
//! User-Agent, maps non-2xx statuses to [`TransportError::Status`] and
//! retries idempotent requests on transient failures with exponential
//! backoff.

use std::num::NonZeroU32;
use std::time::Duration;

use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use reqwest::{Method, Request, RequestBuilder, Response};
use serde::de::DeserializeOwned;

use crate::config::NetworkConfig;

/// User agent for API requests
pub const USER_AGENT: &str = concat!(
    "songbridge/",
    env!("CARGO_PKG_VERSION"),
    " ( https://github.com/songbridge/songbridge )"
);

/// Longest error body kept on a status failure
const MAX_ERROR_BODY: usize = 512;

/// Transport-level failures
#[derive(Debug, Clone, thiserror::Error)]
pub enum TransportError {
    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),

    /// Server answered with a non-2xx status
    #[error("HTTP {status} from {url}")]
    Status {
        status: u16,
        url: String,
        body: String,
    },

    #[error("Failed to decode response: {0}")]
    Decode(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl TransportError {
    /// HTTP status code, when the failure was a status failure
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Whether another attempt may succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Timeout(_) | Self::Network(_) => true,
            Self::Status { status, .. } => *status == 429 || *status >= 500,
            Self::Decode(_) | Self::InvalidRequest(_) => false,
        }
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::Timeout(e.to_string())
        } else if e.is_decode() {
            Self::Decode(e.to_string())
        } else if e.is_builder() {
            Self::InvalidRequest(e.to_string())
        } else {
            Self::Network(e.to_string())
        }
    }
}

/// Exponential backoff settings for a single call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl RetryPolicy {
    /// Single attempt, no retry
    pub const fn none() -> Self {
        Self {
            max_retries: 0,
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
        }
    }

    /// Delay before retry number `attempt` (1-based): base * 2^(attempt-1), capped
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        self.base_delay
            .saturating_mul(1u32 << exponent)
            .min(self.max_delay)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        NetworkConfig::default().retry_policy()
    }
}

/// Rate-limited HTTP client shared by every API client in the engine
pub struct HttpTransport {
    client: reqwest::Client,
    limiter: DefaultDirectRateLimiter,
    policy: RetryPolicy,
    request_timeout: Duration,
}

impl HttpTransport {
    /// Build the transport from network settings
    pub fn new(config: &NetworkConfig) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.as_str())
            .connect_timeout(config.request_timeout())
            .build()?;

        let per_second =
            NonZeroU32::new(config.requests_per_second).unwrap_or(NonZeroU32::MIN);

        Ok(Self {
            client,
            limiter: RateLimiter::direct(Quota::per_second(per_second)),
            policy: config.retry_policy(),
            request_timeout: config.request_timeout(),
        })
    }

    /// Retry policy configured for idempotent API calls
    pub fn default_policy(&self) -> RetryPolicy {
        self.policy
    }

    /// Whole-request timeout for API calls. Streaming downloads do not use it.
    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    /// Start a GET request on the shared client
    pub fn get(&self, url: &str) -> RequestBuilder {
        self.client.get(url)
    }

    /// Start a POST request on the shared client
    pub fn post(&self, url: &str) -> RequestBuilder {
        self.client.post(url)
    }

    /// Send a request, retrying per `policy` when it is safe to do so.
    ///
    /// Only idempotent methods with a replayable body are retried; anything
    /// else gets exactly one attempt.
    pub async fn send(
        &self,
        request: Request,
        policy: RetryPolicy,
    ) -> Result<Response, TransportError> {
        let idempotent = matches!(
            *request.method(),
            Method::GET | Method::HEAD | Method::OPTIONS | Method::PUT | Method::DELETE
        );

        if !idempotent || policy.max_retries == 0 || request.try_clone().is_none() {
            return self.execute(request).await;
        }

        let url = request.url().to_string();
        tryhard::retry_fn(|| {
            let attempt = request.try_clone();
            async move {
                let request = attempt.ok_or_else(|| {
                    TransportError::InvalidRequest("request body is not replayable".to_string())
                })?;
                self.execute(request).await
            }
        })
        .retries(policy.max_retries)
        .custom_backoff(|attempt, err: &TransportError| {
            if err.is_retryable() {
                tryhard::RetryPolicy::Delay(policy.delay_for(attempt))
            } else {
                tryhard::RetryPolicy::Break
            }
        })
        .on_retry(|attempt, next_delay, err: &TransportError| {
            let message = err.to_string();
            let url = url.clone();
            async move {
                tracing::debug!(
                    attempt,
                    ?next_delay,
                    url = %url,
                    error = %message,
                    "Retrying request"
                );
            }
        })
        .await
    }

    /// GET a URL and decode the JSON body
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        policy: RetryPolicy,
    ) -> Result<T, TransportError> {
        let request = self
            .get(url)
            .header(reqwest::header::ACCEPT, "application/json")
            .timeout(self.request_timeout)
            .build()?;
        let response = self.send(request, policy).await?;
        response
            .json::<T>()
            .await
            .map_err(|e| TransportError::Decode(e.to_string()))
    }

    /// One attempt: wait for a limiter slot, send, check status
    async fn execute(&self, request: Request) -> Result<Response, TransportError> {
        self.limiter.until_ready().await;

        tracing::trace!(method = %request.method(), url = %request.url(), "Sending request");
        let response = self.client.execute(request).await?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let url = response.url().to_string();
        let body: String = response
            .text()
            .await
            .unwrap_or_default()
            .chars()
            .take(MAX_ERROR_BODY)
            .collect();

        Err(TransportError::Status {
            status: status.as_u16(),
            url,
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{Reply, TestServer, test_network_config};

    #[test]
    fn test_backoff_is_exponential_and_capped() {
        let policy = RetryPolicy {
            max_retries: 5,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(16),
        };
        assert_eq!(policy.delay_for(1), Duration::from_secs(1));
        assert_eq!(policy.delay_for(2), Duration::from_secs(2));
        assert_eq!(policy.delay_for(3), Duration::from_secs(4));
        assert_eq!(policy.delay_for(5), Duration::from_secs(16));
        assert_eq!(policy.delay_for(9), Duration::from_secs(16));
    }

    #[test]
    fn test_retryable_classification() {
        let status = |code| TransportError::Status {
            status: code,
            url: String::new(),
            body: String::new(),
        };
        assert!(status(503).is_retryable());
        assert!(status(429).is_retryable());
        assert!(!status(404).is_retryable());
        assert!(TransportError::Timeout("slow".into()).is_retryable());
        assert!(!TransportError::Decode("bad json".into()).is_retryable());
    }

    #[tokio::test]
    async fn test_sends_user_agent() {
        let server = TestServer::start(vec![("/ping", vec![Reply::text(200, "pong")])]).await;
        let transport = HttpTransport::new(&test_network_config()).unwrap();

        let request = transport.get(&server.url("/ping")).build().unwrap();
        let response = transport.send(request, RetryPolicy::none()).await.unwrap();
        assert_eq!(response.text().await.unwrap(), "pong");

        let recorded = server.requests();
        assert_eq!(recorded.len(), 1);
        assert_eq!(recorded[0].header("user-agent"), Some(USER_AGENT));
    }

    #[tokio::test]
    async fn test_retries_transient_status_then_succeeds() {
        let server = TestServer::start(vec![(
            "/flaky",
            vec![Reply::text(503, "busy"), Reply::text(200, "ok")],
        )])
        .await;
        let transport = HttpTransport::new(&test_network_config()).unwrap();

        let request = transport.get(&server.url("/flaky")).build().unwrap();
        let response = transport
            .send(request, transport.default_policy())
            .await
            .unwrap();

        assert_eq!(response.status().as_u16(), 200);
        assert_eq!(server.requests().len(), 2);
    }

    #[tokio::test]
    async fn test_client_error_is_not_retried() {
        let server = TestServer::start(vec![("/missing", vec![Reply::text(404, "nope")])]).await;
        let transport = HttpTransport::new(&test_network_config()).unwrap();

        let request = transport.get(&server.url("/missing")).build().unwrap();
        let err = transport
            .send(request, transport.default_policy())
            .await
            .unwrap_err();

        assert_eq!(err.status(), Some(404));
        assert_eq!(server.requests().len(), 1);
        match err {
            TransportError::Status { body, .. } => assert_eq!(body, "nope"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_post_is_never_retried() {
        let server = TestServer::start(vec![("/submit", vec![Reply::text(503, "busy")])]).await;
        let transport = HttpTransport::new(&test_network_config()).unwrap();

        let request = transport
            .post(&server.url("/submit"))
            .body("payload")
            .build()
            .unwrap();
        let err = transport
            .send(request, transport.default_policy())
            .await
            .unwrap_err();

        assert_eq!(err.status(), Some(503));
        assert_eq!(server.requests().len(), 1);
    }

    #[tokio::test]
    async fn test_get_json_decode_failure() {
        let server =
            TestServer::start(vec![("/json", vec![Reply::json(200, "not json at all")])]).await;
        let transport = HttpTransport::new(&test_network_config()).unwrap();

        let result: Result<serde_json::Value, _> = transport
            .get_json(&server.url("/json"), RetryPolicy::none())
            .await;
        assert!(matches!(result, Err(TransportError::Decode(_))));
    }

    #[tokio::test]
    async fn test_failed_request_consumes_limiter_slot() {
        let server = TestServer::start(vec![("/missing", vec![Reply::text(404, "nope")])]).await;
        let config = NetworkConfig {
            requests_per_second: 2,
            max_retries: 0,
            ..test_network_config()
        };
        let transport = HttpTransport::new(&config).unwrap();

        let started = std::time::Instant::now();
        for _ in 0..3 {
            let request = transport.get(&server.url("/missing")).build().unwrap();
            let err = transport.send(request, RetryPolicy::none()).await.unwrap_err();
            assert_eq!(err.status(), Some(404));
        }

        // Two failures used the burst, so the third waited for a refill
        assert!(started.elapsed() >= Duration::from_millis(400));
        assert_eq!(server.requests().len(), 3);
    }
}
