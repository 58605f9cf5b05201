//! HTTP Range-Fetch Boundary
//!
//! The core streams large audio files progressively by issuing byte-range
//! requests. This module defines the transport abstraction those requests go
//! through, plus the [`ByteRange`] and [`RangeResponse`] types shared with the
//! core.

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::{BridgeError, Result};

/// An inclusive byte interval, matching HTTP `Range` header semantics.
///
/// `start` and `end` are both part of the interval, so `ByteRange::new(0, 0)`
/// names exactly one byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ByteRange {
    pub start: u64,
    pub end: u64,
}

impl ByteRange {
    /// Create a new byte range.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::OperationFailed`] when `end < start`.
    pub fn new(start: u64, end: u64) -> Result<Self> {
        if end < start {
            return Err(BridgeError::OperationFailed(format!(
                "invalid byte range: {}-{}",
                start, end
            )));
        }
        Ok(Self { start, end })
    }

    /// Range covering the first `len` bytes of a resource.
    ///
    /// Returns `None` when `len` is zero (an empty prefix is not a valid
    /// HTTP range).
    pub fn prefix(len: u64) -> Option<Self> {
        if len == 0 {
            None
        } else {
            Some(Self {
                start: 0,
                end: len - 1,
            })
        }
    }

    /// Number of bytes covered by this range.
    pub fn len(&self) -> u64 {
        self.end - self.start + 1
    }

    /// An inclusive range is never empty.
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Value for the HTTP `Range` request header, e.g. `bytes=0-1023`.
    pub fn header_value(&self) -> String {
        format!("bytes={}-{}", self.start, self.end)
    }

    /// Exact-match cache key, e.g. `0-1023`.
    ///
    /// Two overlapping but differently bounded ranges produce distinct keys.
    pub fn key(&self) -> String {
        format!("{}-{}", self.start, self.end)
    }
}

/// Response from the range-fetch boundary.
#[derive(Debug, Clone)]
pub struct RangeResponse {
    pub status: u16,
    pub headers: HashMap<String, String>,
    pub body: Bytes,
}

impl RangeResponse {
    /// Check if response status is a full success (2xx).
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Check if the origin answered with partial content (206).
    pub fn is_partial(&self) -> bool {
        self.status == 206
    }

    /// Both full (200) and partial (206) responses carry retrievable content.
    /// They differ only for range-semantics bookkeeping.
    pub fn is_retrievable(&self) -> bool {
        self.is_success() || self.is_partial()
    }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// The resource's `Content-Type`, if reported.
    pub fn content_type(&self) -> Option<&str> {
        self.header("content-type")
    }

    /// Total size of the underlying resource in bytes.
    ///
    /// For a 206 response this is the total after the `/` in `Content-Range`
    /// (`bytes 0-1023/5000000`). For a full response it is `Content-Length`.
    /// Returns `None` when neither header yields a usable value.
    pub fn total_size(&self) -> Option<u64> {
        if self.is_partial() {
            if let Some(total) = self
                .header("content-range")
                .and_then(|v| v.rsplit('/').next())
                .and_then(|total| total.trim().parse::<u64>().ok())
            {
                return Some(total);
            }
        }
        self.header("content-length")
            .and_then(|v| v.trim().parse::<u64>().ok())
    }

    /// Whether the origin advertises byte-range support.
    ///
    /// A 206 status is itself proof of range support even when the
    /// `Accept-Ranges` header is missing.
    pub fn accepts_ranges(&self) -> bool {
        if self.is_partial() {
            return true;
        }
        self.header("accept-ranges")
            .map(|v| v.eq_ignore_ascii_case("bytes"))
            .unwrap_or(false)
    }
}

/// Async transport boundary for byte-range fetches.
///
/// Implementations are expected to:
/// - forward the `Range` header unchanged when one is supplied,
/// - impose a transport-level timeout and surface expiry as
///   [`BridgeError::Timeout`],
/// - perform no automatic retries (retry policy belongs to the caller).
#[async_trait]
pub trait RangeHttpClient: Send + Sync {
    /// Fetch a resource, optionally restricted to `range`.
    ///
    /// A `Some(range)` request asks the origin for partial content; the
    /// origin may still answer 200 with the full body when it does not
    /// support ranges. The caller inspects the response status to tell the
    /// two apart.
    ///
    /// # Errors
    ///
    /// Returns an error only when the transport itself fails (connection,
    /// TLS, timeout). Non-2xx statuses are returned as responses, not errors.
    async fn fetch(&self, url: &str, range: Option<ByteRange>) -> Result<RangeResponse>;

    /// Issue a `HEAD` request for the resource's shape.
    ///
    /// The response carries status and headers only (size, content type,
    /// `Accept-Ranges`); `body` is empty. Callers that need bytes follow up
    /// with [`RangeHttpClient::fetch`].
    ///
    /// # Errors
    ///
    /// Same contract as `fetch`: transport failures only.
    async fn head(&self, url: &str) -> Result<RangeResponse>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn byte_range_rejects_inverted_bounds() {
        assert!(ByteRange::new(10, 9).is_err());
        assert!(ByteRange::new(10, 10).is_ok());
    }

    #[test]
    fn byte_range_header_and_key() {
        let range = ByteRange::new(0, 1023).unwrap();
        assert_eq!(range.header_value(), "bytes=0-1023");
        assert_eq!(range.key(), "0-1023");
        assert_eq!(range.len(), 1024);
    }

    #[test]
    fn byte_range_prefix() {
        assert_eq!(ByteRange::prefix(0), None);
        let prefix = ByteRange::prefix(1024).unwrap();
        assert_eq!(prefix.start, 0);
        assert_eq!(prefix.end, 1023);
    }

    #[test]
    fn response_total_size_from_content_range() {
        let mut headers = HashMap::new();
        headers.insert(
            "Content-Range".to_string(),
            "bytes 0-1023/5000000".to_string(),
        );
        headers.insert("Content-Length".to_string(), "1024".to_string());
        let response = RangeResponse {
            status: 206,
            headers,
            body: Bytes::new(),
        };

        assert!(response.is_partial());
        assert!(response.is_retrievable());
        assert!(response.accepts_ranges());
        assert_eq!(response.total_size(), Some(5_000_000));
    }

    #[test]
    fn response_total_size_from_content_length() {
        let mut headers = HashMap::new();
        headers.insert("content-length".to_string(), "4096".to_string());
        headers.insert("accept-ranges".to_string(), "bytes".to_string());
        let response = RangeResponse {
            status: 200,
            headers,
            body: Bytes::new(),
        };

        assert!(response.is_success());
        assert!(!response.is_partial());
        assert!(response.accepts_ranges());
        assert_eq!(response.total_size(), Some(4096));
    }

    #[test]
    fn response_without_size_headers() {
        let response = RangeResponse {
            status: 200,
            headers: HashMap::new(),
            body: Bytes::from_static(b"abc"),
        };
        assert_eq!(response.total_size(), None);
        assert!(!response.accepts_ranges());
    }
}
