//! HTTP plumbing for the estimation service.

use anyhow::{Context, Result};
use reqwest::blocking::Client;
use reqwest::header::RETRY_AFTER;
use std::time::Duration;

/// The parts of a response the client cares about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportResponse {
    pub status: u16,
    pub retry_after: Option<String>,
    pub body: String,
}

impl TransportResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Sends one estimation request. Errors are network-level failures only;
/// HTTP error statuses come back as a response.
pub trait EstimationTransport: Send + Sync {
    fn post(&self, payload: &serde_json::Value) -> Result<TransportResponse>;
}

pub struct HttpTransport {
    client: Client,
    endpoint: String,
}

impl HttpTransport {
    pub fn new(endpoint: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("hydrated/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            client,
            endpoint: endpoint.to_string(),
        })
    }
}

impl EstimationTransport for HttpTransport {
    fn post(&self, payload: &serde_json::Value) -> Result<TransportResponse> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(payload)
            .send()
            .with_context(|| format!("Request to {} failed", self.endpoint))?;

        let status = response.status().as_u16();
        let retry_after = response
            .headers()
            .get(RETRY_AFTER)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        let body = response.text().unwrap_or_default();

        Ok(TransportResponse {
            status,
            retry_after,
            body,
        })
    }
}
