//! reqwest-backed [`HttpTransport`] for the map service.
//!
//! The transport performs exactly one request per call and reports failures
//! as [`UpstreamError`]. Timeouts and the circuit breaker are applied by the
//! `ResilientClient` wrapping it.

use rendezvous_core::resilience::client::{HttpMethod, HttpTransport, UpstreamError, UpstreamRequest};

/// Status reported when a successful response cannot be read or decoded.
const BAD_GATEWAY: u16 = 502;

/// HTTP transport rooted at a base URL.
pub struct ReqwestTransport {
    client: reqwest::Client,
    base_url: String,
}

impl ReqwestTransport {
    pub fn new(base_url: impl Into<String>) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("rendezvous/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self::with_client(client, base_url))
    }

    pub fn with_client(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }
}

impl HttpTransport for ReqwestTransport {
    async fn send(&self, request: UpstreamRequest) -> Result<serde_json::Value, UpstreamError> {
        let url = self.url(&request.path);
        let mut builder = match request.method {
            HttpMethod::Get => self.client.get(&url),
            HttpMethod::Post => self.client.post(&url),
        };
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await.map_err(|e| UpstreamError {
            status: e.status().map(|s| s.as_u16()),
            message: format!("HTTP request failed: {e}"),
        })?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            return Err(UpstreamError {
                status: Some(status.as_u16()),
                message: format!("HTTP {status}: {error_body}"),
            });
        }

        let bytes = response.bytes().await.map_err(|e| UpstreamError {
            status: Some(BAD_GATEWAY),
            message: format!("failed to read response body: {e}"),
        })?;
        if bytes.is_empty() {
            return Ok(serde_json::Value::Null);
        }
        serde_json::from_slice(&bytes).map_err(|e| UpstreamError {
            status: Some(BAD_GATEWAY),
            message: format!("failed to parse response: {e}"),
        })
    }
}
