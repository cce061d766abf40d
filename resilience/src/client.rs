//! HTTP client for one downstream service
//!
//! Each logical call runs inside the service's circuit breaker exactly once;
//! the retry loop lives inside that single breaker call.

use crate::circuit_breaker::{BreakerError, CircuitBreaker, CircuitBreakerConfig};
use crate::error::{Error, Result};
use crate::metrics::{
    SERVICE_CLIENT_REQUESTS_TOTAL, SERVICE_CLIENT_REQUEST_DURATION, SERVICE_CLIENT_RETRIES_TOTAL,
};
use crate::retry::{RetryConfig, RetryPolicy};
use bytes::Bytes;
use protocol_core::{SharedClock, SystemClock};
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};
use uuid::Uuid;

/// Header carrying the per-call request id
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Configuration of one named dependency
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceClientConfig {
    /// Dependency name (also the breaker name)
    pub name: String,
    /// Base URL, e.g. `http://wallet:8080`
    pub base_url: String,
    /// Per-attempt HTTP timeout (milliseconds)
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    /// Retry settings
    #[serde(default)]
    pub retry: RetryConfig,
    /// Breaker settings
    #[serde(default)]
    pub breaker: CircuitBreakerConfig,
}

fn default_request_timeout_ms() -> u64 {
    crate::DEFAULT_REQUEST_TIMEOUT_MS
}

impl ServiceClientConfig {
    /// Config with default timeouts, retry and breaker settings
    pub fn new(name: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            base_url: base_url.into(),
            request_timeout_ms: crate::DEFAULT_REQUEST_TIMEOUT_MS,
            retry: RetryConfig::default(),
            breaker: CircuitBreakerConfig::default(),
        }
    }
}

/// Client for one downstream service, guarded by its own breaker
#[derive(Debug)]
pub struct ServiceClient {
    name: String,
    base_url: String,
    request_timeout: Duration,
    http: reqwest::Client,
    breaker: Arc<CircuitBreaker>,
    retry: RetryPolicy,
}

impl ServiceClient {
    /// Build a client on the system clock
    pub fn new(config: ServiceClientConfig) -> Result<Self> {
        Self::from_config(config, SystemClock::shared())
    }

    /// Build a client whose breaker reads time from `clock`
    pub fn from_config(config: ServiceClientConfig, clock: SharedClock) -> Result<Self> {
        if config.name.trim().is_empty() {
            return Err(Error::Config("service name must not be empty".to_string()));
        }

        let base_url = config.base_url.trim_end_matches('/').to_string();
        if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
            return Err(Error::Config(format!(
                "base URL for {} must be http(s): {}",
                config.name, config.base_url
            )));
        }

        let request_timeout = Duration::from_millis(config.request_timeout_ms);
        let http = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| Error::Config(format!("Failed to create HTTP client: {}", e)))?;

        let breaker = Arc::new(CircuitBreaker::with_clock(
            config.name.clone(),
            config.breaker,
            clock,
        ));

        Ok(Self {
            name: config.name,
            base_url,
            request_timeout,
            http,
            breaker,
            retry: RetryPolicy::new(config.retry),
        })
    }

    /// Dependency name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Base URL without a trailing slash
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// The breaker guarding this dependency
    pub fn breaker(&self) -> &Arc<CircuitBreaker> {
        &self.breaker
    }

    /// GET `path` and decode the JSON body
    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let body = self.call(Method::GET, path, None).await?;
        self.decode(&body)
    }

    /// POST a JSON body to `path` and decode the JSON response
    pub async fn post_json<B, T>(&self, path: &str, body: &B) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let payload = self.encode(body)?;
        let body = self.call(Method::POST, path, Some(payload)).await?;
        self.decode(&body)
    }

    /// PUT a JSON body to `path` and decode the JSON response
    pub async fn put_json<B, T>(&self, path: &str, body: &B) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let payload = self.encode(body)?;
        let body = self.call(Method::PUT, path, Some(payload)).await?;
        self.decode(&body)
    }

    /// DELETE `path`, ignoring any response body
    pub async fn delete(&self, path: &str) -> Result<()> {
        self.call(Method::DELETE, path, None).await.map(|_| ())
    }

    /// GET `/health`; any 2xx is healthy
    pub async fn health(&self) -> Result<()> {
        self.call(Method::GET, "/health", None).await.map(|_| ())
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    fn encode<B: Serialize + ?Sized>(&self, body: &B) -> Result<serde_json::Value> {
        serde_json::to_value(body).map_err(|e| Error::InvalidRequest(e.to_string()))
    }

    fn decode<T: DeserializeOwned>(&self, body: &[u8]) -> Result<T> {
        serde_json::from_slice(body).map_err(|e| Error::Decode {
            service: self.name.clone(),
            message: e.to_string(),
        })
    }

    async fn call(
        &self,
        method: Method,
        path: &str,
        payload: Option<serde_json::Value>,
    ) -> Result<Bytes> {
        let url = self.url(path);
        let request_id = Uuid::new_v4().to_string();
        let operation = format!("{} {} {}", self.name, method, path);
        let start = Instant::now();

        debug!(request_id = %request_id, "Calling {}", operation);

        let result = self
            .breaker
            .execute_classified(
                || {
                    self.retry.run(
                        &operation,
                        |attempt| {
                            if attempt > 0 {
                                SERVICE_CLIENT_RETRIES_TOTAL
                                    .with_label_values(&[&self.name])
                                    .inc();
                            }
                            self.attempt(method.clone(), &url, payload.as_ref(), &request_id)
                        },
                        Error::is_retryable,
                    )
                },
                Error::counts_against_breaker,
            )
            .await;

        let result = result.map_err(|e| match e {
            BreakerError::Open { retry_at, .. } => Error::CircuitOpen {
                service: self.name.clone(),
                retry_at,
            },
            BreakerError::Timeout { after, .. } => Error::CallTimeout {
                service: self.name.clone(),
                timeout_ms: after.as_millis() as u64,
            },
            BreakerError::Inner(inner) => inner,
        });

        SERVICE_CLIENT_REQUEST_DURATION
            .with_label_values(&[&self.name])
            .observe(start.elapsed().as_secs_f64());
        SERVICE_CLIENT_REQUESTS_TOTAL
            .with_label_values(&[&self.name, outcome(&result)])
            .inc();

        if let Err(e) = &result {
            warn!(request_id = %request_id, "{} failed: {}", operation, e);
        }

        result
    }

    async fn attempt(
        &self,
        method: Method,
        url: &str,
        payload: Option<&serde_json::Value>,
        request_id: &str,
    ) -> Result<Bytes> {
        let mut request = self
            .http
            .request(method, url)
            .header(REQUEST_ID_HEADER, request_id);
        if let Some(payload) = payload {
            request = request.json(payload);
        }

        let response = request.send().await.map_err(|e| self.transport_error(e))?;
        let status = response.status();
        let body = response.bytes().await.map_err(|e| self.transport_error(e))?;

        if !status.is_success() {
            return Err(Error::Status {
                service: self.name.clone(),
                status: status.as_u16(),
                body: String::from_utf8_lossy(&body).into_owned(),
            });
        }

        Ok(body)
    }

    fn transport_error(&self, e: reqwest::Error) -> Error {
        if e.is_timeout() {
            Error::CallTimeout {
                service: self.name.clone(),
                timeout_ms: self.request_timeout.as_millis() as u64,
            }
        } else {
            Error::Transport {
                service: self.name.clone(),
                message: e.without_url().to_string(),
            }
        }
    }
}

fn outcome<T>(result: &Result<T>) -> &'static str {
    match result {
        Ok(_) => "success",
        Err(Error::CircuitOpen { .. }) => "circuit_open",
        Err(Error::CallTimeout { .. }) => "timeout",
        Err(e) if e.is_client_error() => "client_error",
        Err(_) => "error",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::CircuitState;
    use protocol_core::ManualClock;
    use serde_json::json;
    use wiremock::matchers::{body_json, header_exists, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config(server: &MockServer, max_retries: u32, failure_threshold: u32) -> ServiceClientConfig {
        ServiceClientConfig {
            name: "wallet".to_string(),
            base_url: format!("{}/", server.uri()),
            request_timeout_ms: 500,
            retry: RetryConfig {
                max_retries,
                initial_delay_ms: 1,
                max_delay_ms: 5,
                backoff_multiplier: 2.0,
                jitter_factor: 0.0,
            },
            breaker: CircuitBreakerConfig {
                failure_threshold,
                success_threshold: 1,
                call_timeout_ms: 5_000,
                reset_timeout_ms: 60_000,
            },
        }
    }

    fn client(cfg: ServiceClientConfig) -> (ServiceClient, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::starting_now());
        (ServiceClient::from_config(cfg, clock.clone()).unwrap(), clock)
    }

    #[tokio::test]
    async fn test_post_json_round_trip() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/payments"))
            .and(header_exists(REQUEST_ID_HEADER))
            .and(body_json(json!({"amount": 10})))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({"reference": "R-1"})))
            .expect(1)
            .mount(&server)
            .await;

        let (client, _) = client(config(&server, 0, 3));
        let resp: serde_json::Value = client
            .post_json("/payments", &json!({"amount": 10}))
            .await
            .unwrap();

        assert_eq!(resp["reference"], "R-1");
        assert_eq!(client.base_url(), server.uri());
    }

    #[tokio::test]
    async fn test_retries_5xx_inside_one_breaker_call() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/balance"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(2)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/balance"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"balance": 5})))
            .mount(&server)
            .await;

        let (client, _) = client(config(&server, 2, 1));
        let resp: serde_json::Value = client.get_json("/balance").await.unwrap();

        assert_eq!(resp["balance"], 5);
        assert_eq!(client.breaker().state(), CircuitState::Closed);
        assert_eq!(server.received_requests().await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_exhausted_retries_count_as_one_breaker_failure() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/balance"))
            .respond_with(ResponseTemplate::new(503))
            .expect(3)
            .mount(&server)
            .await;

        let (client, _) = client(config(&server, 2, 5));
        let err = client
            .get_json::<serde_json::Value>("/balance")
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Status { status: 503, .. }));
        assert_eq!(server.received_requests().await.unwrap().len(), 3);
        let snapshot = client.breaker().snapshot();
        assert_eq!(snapshot.failure_count, 1);
        assert_eq!(snapshot.state, CircuitState::Closed);
    }

    #[tokio::test]
    async fn test_client_error_is_not_retried_and_does_not_trip() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/accounts/missing"))
            .respond_with(ResponseTemplate::new(404).set_body_string("not found"))
            .expect(3)
            .mount(&server)
            .await;

        let (client, _) = client(config(&server, 3, 1));
        for _ in 0..3 {
            let err = client
                .get_json::<serde_json::Value>("/accounts/missing")
                .await
                .unwrap_err();
            assert!(matches!(err, Error::Status { status: 404, ref body, .. } if body == "not found"));
        }
        assert_eq!(client.breaker().state(), CircuitState::Closed);
    }

    #[tokio::test]
    async fn test_open_circuit_rejects_without_request() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/health"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let (client, clock) = client(config(&server, 0, 2));
        assert!(client.health().await.is_err());
        assert!(client.health().await.is_err());
        assert_eq!(client.breaker().state(), CircuitState::Open);

        let err = client.health().await.unwrap_err();
        assert!(matches!(err, Error::CircuitOpen { .. }));
        assert_eq!(server.received_requests().await.unwrap().len(), 2);

        clock.advance(chrono::Duration::seconds(61));
        server.reset().await;
        Mock::given(method("GET"))
            .and(path("/health"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        client.health().await.unwrap();
        assert_eq!(client.breaker().state(), CircuitState::Closed);
    }

    #[tokio::test]
    async fn test_slow_response_is_call_timeout() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/slow"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({}))
                    .set_delay(Duration::from_millis(800)),
            )
            .mount(&server)
            .await;

        let (client, _) = client(config(&server, 0, 5));
        let err = client.get_json::<serde_json::Value>("/slow").await.unwrap_err();

        assert!(matches!(err, Error::CallTimeout { timeout_ms: 500, .. }));
        assert!(err.is_retryable());
        assert_eq!(client.breaker().snapshot().failure_count, 1);
    }

    #[tokio::test]
    async fn test_connection_refused_is_transport_error() {
        let cfg = ServiceClientConfig {
            retry: RetryConfig::none(),
            ..ServiceClientConfig::new("ledger", "http://127.0.0.1:9")
        };
        let (client, _) = client(cfg);

        let err = client.delete("/entries/1").await.unwrap_err();
        assert!(matches!(err, Error::Transport { .. } | Error::CallTimeout { .. }));
        assert!(!err.to_string().contains("127.0.0.1"));
    }

    #[tokio::test]
    async fn test_undecodable_body_is_decode_error() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/limits"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>"))
            .mount(&server)
            .await;

        let (client, _) = client(config(&server, 0, 5));
        let err = client
            .put_json::<_, serde_json::Value>("/limits", &json!({"daily": 100}))
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Decode { .. }));
        assert_eq!(client.breaker().state(), CircuitState::Closed);
    }

    #[test]
    fn test_rejects_bad_base_url() {
        assert!(ServiceClient::new(ServiceClientConfig::new("x", "ftp://host")).is_err());
        assert!(ServiceClient::new(ServiceClientConfig::new("", "http://host")).is_err());
    }
}
