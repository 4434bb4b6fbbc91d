//! HTTP client for the upstream `/api` endpoint.

use serde_json::Value;
use thiserror::Error;

/// Errors from a single upstream call.
#[derive(Debug, Error)]
pub enum UpstreamError {
    /// The upstream answered with a non-success status.
    #[error("Request failed with status code {0}")]
    Status(u16),

    /// Connection, protocol or body decoding failure.
    #[error("Upstream request failed: {0}")]
    Transport(#[from] reqwest::Error),
}

/// Calls `GET {base_url}/api` and returns the decoded JSON body.
#[derive(Debug, Clone)]
pub struct UpstreamClient {
    client: reqwest::Client,
    endpoint: String,
}

impl UpstreamClient {
    pub fn new(base_url: &str) -> Self {
        Self::with_client(reqwest::Client::new(), base_url)
    }

    pub fn with_client(client: reqwest::Client, base_url: &str) -> Self {
        Self {
            client,
            endpoint: format!("{}/api", base_url.trim_end_matches('/')),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub async fn fetch(&self) -> Result<Value, UpstreamError> {
        let response = self.client.get(&self.endpoint).send().await?;
        let status = response.status();
        if !status.is_success() {
            tracing::debug!(endpoint = %self.endpoint, status = %status, "Upstream returned error status");
            return Err(UpstreamError::Status(status.as_u16()));
        }
        Ok(response.json().await?)
    }
}
