//! HTTP client wrapper guarded by a circuit breaker and a per-call timeout.

use std::time::Duration;

use rendezvous_types::config::MapServiceConfig;
use rendezvous_types::error::MeetupError;
use thiserror::Error;
use tracing::warn;

use super::breaker::CircuitBreaker;

/// Status reported when the upstream gave none (transport error, timeout).
const FALLBACK_STATUS: u16 = 500;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
}

/// A request to the downstream service, relative to its base URL.
#[derive(Debug, Clone, PartialEq)]
pub struct UpstreamRequest {
    pub method: HttpMethod,
    pub path: String,
    pub query: Vec<(String, String)>,
    pub body: Option<serde_json::Value>,
}

impl UpstreamRequest {
    pub fn get(path: impl Into<String>, query: Vec<(String, String)>) -> Self {
        Self {
            method: HttpMethod::Get,
            path: path.into(),
            query,
            body: None,
        }
    }

    pub fn post(path: impl Into<String>, body: serde_json::Value) -> Self {
        Self {
            method: HttpMethod::Post,
            path: path.into(),
            query: Vec::new(),
            body: Some(body),
        }
    }
}

/// Failure reported by a transport: a non-success status or no response.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct UpstreamError {
    pub status: Option<u16>,
    pub message: String,
}

/// The raw HTTP capability the resilient client wraps.
///
/// Implementations live in rendezvous-infra (e.g., ReqwestTransport).
pub trait HttpTransport: Send + Sync {
    fn send(
        &self,
        request: UpstreamRequest,
    ) -> impl std::future::Future<Output = Result<serde_json::Value, UpstreamError>> + Send;
}

/// Calls a downstream dependency through a shared circuit breaker.
///
/// Every call is bounded by `timeout`; a timeout counts as a failure. All
/// upstream failures surface as `ExternalService` carrying the upstream
/// status when one is known.
pub struct ResilientClient<T: HttpTransport> {
    transport: T,
    breaker: CircuitBreaker,
    timeout: Duration,
}

impl<T: HttpTransport> ResilientClient<T> {
    pub fn new(transport: T, breaker: CircuitBreaker, timeout: Duration) -> Self {
        Self {
            transport,
            breaker,
            timeout,
        }
    }

    /// Build a client for the map service from its configuration section.
    pub fn from_config(transport: T, config: &MapServiceConfig) -> Self {
        Self::new(
            transport,
            CircuitBreaker::new("map-service", config.max_failures, config.reset_timeout()),
            config.timeout(),
        )
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    pub async fn request(&self, request: UpstreamRequest) -> Result<serde_json::Value, MeetupError> {
        let path = request.path.clone();
        self.breaker
            .call(|| async move {
                match tokio::time::timeout(self.timeout, self.transport.send(request)).await {
                    Ok(Ok(value)) => Ok(value),
                    Ok(Err(e)) => {
                        warn!(
                            dependency = %self.breaker.name(),
                            %path,
                            status = ?e.status,
                            error = %e,
                            "upstream call failed"
                        );
                        Err(MeetupError::ExternalService {
                            status: e.status.unwrap_or(FALLBACK_STATUS),
                            message: e.message,
                        })
                    }
                    Err(_) => {
                        warn!(
                            dependency = %self.breaker.name(),
                            %path,
                            timeout_ms = self.timeout.as_millis() as u64,
                            "upstream call timed out"
                        );
                        Err(MeetupError::ExternalService {
                            status: FALLBACK_STATUS,
                            message: format!("request to {path} timed out"),
                        })
                    }
                }
            })
            .await
    }

    pub async fn get(
        &self,
        path: &str,
        query: Vec<(String, String)>,
    ) -> Result<serde_json::Value, MeetupError> {
        self.request(UpstreamRequest::get(path, query)).await
    }

    pub async fn post(
        &self,
        path: &str,
        body: serde_json::Value,
    ) -> Result<serde_json::Value, MeetupError> {
        self.request(UpstreamRequest::post(path, body)).await
    }
}
