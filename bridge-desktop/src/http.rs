//! Range-Fetch Client Implementation using Reqwest
//!
//! Single-attempt transport: the core's failure policy forbids transparent
//! retries, so every transport error surfaces on the first failure. Timeouts
//! are imposed here and reported as [`BridgeError::Timeout`].

use async_trait::async_trait;
use bridge_traits::{
    error::{BridgeError, Result},
    http::{ByteRange, RangeHttpClient, RangeResponse},
};
use bytes::Bytes;
use reqwest::Client;
use std::collections::HashMap;
use std::time::Duration;
use tracing::debug;

/// Reqwest-based range-fetch client.
///
/// Provides:
/// - Connection pooling via reqwest
/// - TLS (rustls) by default
/// - A total-request timeout treated as the transport boundary timeout
pub struct ReqwestRangeClient {
    client: Client,
    timeout: Duration,
}

impl ReqwestRangeClient {
    /// Create a new client with the default 30 second timeout.
    pub fn new() -> Result<Self> {
        Self::with_timeout(Duration::from_secs(30))
    }

    /// Create a new client with a custom total-request timeout.
    ///
    /// Hosts pass the streaming configuration's `request_timeout` here so
    /// the transport honors the configured boundary.
    pub fn with_timeout(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(10))
            .pool_max_idle_per_host(10)
            .user_agent("rill-streaming-core/0.1.0")
            .build()
            .map_err(|e| BridgeError::OperationFailed(format!("failed to build client: {}", e)))?;

        Ok(Self { client, timeout })
    }

    /// Total-request timeout this client imposes.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    fn transport_error(url: &str, e: reqwest::Error) -> BridgeError {
        if e.is_timeout() {
            BridgeError::Timeout(format!("request to {} timed out", url))
        } else if e.is_connect() {
            BridgeError::OperationFailed(format!("connection failed: {}", e))
        } else {
            BridgeError::OperationFailed(e.to_string())
        }
    }

    fn collect_headers(response: &reqwest::Response) -> HashMap<String, String> {
        response
            .headers()
            .iter()
            .filter_map(|(k, v)| v.to_str().ok().map(|s| (k.to_string(), s.to_string())))
            .collect()
    }
}

#[async_trait]
impl RangeHttpClient for ReqwestRangeClient {
    async fn fetch(&self, url: &str, range: Option<ByteRange>) -> Result<RangeResponse> {
        let mut request = self.client.get(url);
        if let Some(range) = range {
            request = request.header("Range", range.header_value());
        }

        debug!(url = %url, range = ?range, "Executing range fetch");

        let response = request
            .send()
            .await
            .map_err(|e| Self::transport_error(url, e))?;

        let status = response.status().as_u16();
        let headers = Self::collect_headers(&response);

        let body = response.bytes().await.map_err(|e| {
            if e.is_timeout() {
                BridgeError::Timeout(format!("body read from {} timed out", url))
            } else {
                BridgeError::OperationFailed(e.to_string())
            }
        })?;

        debug!(
            url = %url,
            status = status,
            bytes = body.len(),
            "Range fetch completed"
        );

        Ok(RangeResponse {
            status,
            headers,
            body,
        })
    }

    async fn head(&self, url: &str) -> Result<RangeResponse> {
        debug!(url = %url, "Executing head probe");

        let response = self
            .client
            .head(url)
            .send()
            .await
            .map_err(|e| Self::transport_error(url, e))?;

        let status = response.status().as_u16();
        let headers = Self::collect_headers(&response);

        debug!(url = %url, status = status, "Head probe completed");

        Ok(RangeResponse {
            status,
            headers,
            body: Bytes::new(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn client_construction() {
        let client = ReqwestRangeClient::new();
        assert!(client.is_ok());

        let client = ReqwestRangeClient::with_timeout(Duration::from_secs(5));
        assert!(client.is_ok());
    }

    #[tokio::test]
    async fn configured_timeout_is_retained() {
        let client = ReqwestRangeClient::with_timeout(Duration::from_secs(7)).unwrap();
        assert_eq!(client.timeout(), Duration::from_secs(7));

        let client = ReqwestRangeClient::new().unwrap();
        assert_eq!(client.timeout(), Duration::from_secs(30));
    }
}
