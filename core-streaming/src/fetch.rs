//! # Range Fetch Client
//!
//! Issues byte-range requests against a remote track and hands out
//! player-consumable streaming handles.
//!
//! Range requests let the coordinator begin playback after fetching only a
//! small prefix, and let a seek near the end of a long file avoid
//! downloading everything before it. When an origin does not honor ranges,
//! the client transparently falls back to fetching the resource in full and
//! callers must not assume partial semantics.

use crate::error::{Result, StreamError};
use crate::metadata::{AudioMetadata, TrackId};
use bridge_traits::http::{ByteRange, RangeHttpClient};
use bridge_traits::player::HandleId;
use bytes::Bytes;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, instrument, warn};

/// Addressable handle the presentation surface's audio element attaches to.
///
/// A handle is a scoped local allocation: it is registered with the client
/// on creation and must be released exactly once via
/// [`RangeFetchClient::release_handle`], which consumes it. Dropping an
/// unreleased handle logs a leak warning.
#[derive(Debug)]
pub struct StreamingHandle {
    id: HandleId,
    track: TrackId,
    url: String,
    released: bool,
}

impl StreamingHandle {
    /// Identifier of this handle's local allocation.
    pub fn id(&self) -> HandleId {
        self.id
    }

    /// Track this handle streams.
    pub fn track(&self) -> &TrackId {
        &self.track
    }

    /// URL the native playback primitive loads from.
    pub fn url(&self) -> &str {
        &self.url
    }
}

impl Drop for StreamingHandle {
    fn drop(&mut self) {
        if !self.released {
            warn!(handle = %self.id, track = %self.track, "Streaming handle dropped without release");
        }
    }
}

/// Request statistics, used by callers to reason about network behavior.
#[derive(Debug, Clone, Default)]
pub struct FetchStats {
    /// Total range/full requests issued.
    pub requests_issued: u64,
    /// Total payload bytes received.
    pub bytes_fetched: u64,
}

/// Client for byte-range fetches over the transport boundary.
///
/// Explicitly constructed and caller-owned (no process-wide default
/// instance); scope one to each coordinator.
pub struct RangeFetchClient {
    http: Arc<dyn RangeHttpClient>,
    live_handles: Mutex<HashSet<HandleId>>,
    handles_released: AtomicU64,
    requests_issued: AtomicU64,
    bytes_fetched: AtomicU64,
}

impl RangeFetchClient {
    /// Create a new fetch client over the given transport.
    pub fn new(http: Arc<dyn RangeHttpClient>) -> Self {
        Self {
            http,
            live_handles: Mutex::new(HashSet::new()),
            handles_released: AtomicU64::new(0),
            requests_issued: AtomicU64::new(0),
            bytes_fetched: AtomicU64::new(0),
        }
    }

    /// Fetch the bytes of `range` from `id`.
    ///
    /// When `metadata` says the origin does not support range requests, the
    /// whole resource is fetched instead and the full body returned.
    ///
    /// # Errors
    ///
    /// Returns [`StreamError::RangeFetch`] when the transport fails (status
    /// 0) or returns neither full nor partial success; the observed status
    /// is carried for diagnostics.
    #[instrument(skip(self, metadata), fields(track = %id))]
    pub async fn fetch_range(
        &self,
        id: &TrackId,
        range: ByteRange,
        metadata: &AudioMetadata,
    ) -> Result<Bytes> {
        if !metadata.supports_range_requests {
            debug!("Origin does not support ranges, fetching in full");
            return self.fetch_full(id).await;
        }

        let response = self.issue(id, Some(range)).await?;

        // A 206 must cover the span we asked for; bytes for an unrelated
        // range would corrupt the preload bookkeeping.
        if response.is_partial() {
            let reported_start = response
                .header("content-range")
                .and_then(|v| v.strip_prefix("bytes "))
                .and_then(|v| v.split('-').next())
                .and_then(|s| s.trim().parse::<u64>().ok());
            if let Some(start) = reported_start {
                if start != range.start {
                    return Err(StreamError::RangeFetch {
                        status: response.status,
                        message: format!(
                            "origin returned range starting at {} instead of {}",
                            start, range.start
                        ),
                    });
                }
            }
        }

        Ok(response.body)
    }

    /// Fetch the entire resource, the fallback when ranges are unsupported.
    #[instrument(skip(self), fields(track = %id))]
    pub async fn fetch_full(&self, id: &TrackId) -> Result<Bytes> {
        let response = self.issue(id, None).await?;
        Ok(response.body)
    }

    async fn issue(
        &self,
        id: &TrackId,
        range: Option<ByteRange>,
    ) -> Result<bridge_traits::http::RangeResponse> {
        self.requests_issued.fetch_add(1, Ordering::Relaxed);

        let response = self
            .http
            .fetch(id.as_str(), range)
            .await
            .map_err(|e| StreamError::RangeFetch {
                status: 0,
                message: e.to_string(),
            })?;

        if !response.is_retrievable() {
            return Err(StreamError::RangeFetch {
                status: response.status,
                message: format!("fetch for {} failed", id),
            });
        }

        self.bytes_fetched
            .fetch_add(response.body.len() as u64, Ordering::Relaxed);

        debug!(
            status = response.status,
            bytes = response.body.len(),
            partial = response.is_partial(),
            "Fetch completed"
        );

        Ok(response)
    }

    /// Produce a player-consumable streaming handle for `id`.
    ///
    /// The handle is registered as a live local allocation until released.
    pub fn create_streaming_handle(&self, id: &TrackId) -> StreamingHandle {
        let handle = StreamingHandle {
            id: HandleId::new(),
            track: id.clone(),
            url: id.as_str().to_string(),
            released: false,
        };
        self.live_handles.lock().insert(handle.id);
        debug!(handle = %handle.id, track = %id, "Streaming handle created");
        handle
    }

    /// Release a streaming handle, revoking its backing allocation.
    ///
    /// Consumes the handle, so each one is released at most once by
    /// construction.
    pub fn release_handle(&self, mut handle: StreamingHandle) {
        handle.released = true;
        self.live_handles.lock().remove(&handle.id);
        self.handles_released.fetch_add(1, Ordering::Relaxed);
        debug!(handle = %handle.id, track = %handle.track, "Streaming handle released");
    }

    /// Number of handles created but not yet released.
    pub fn live_handle_count(&self) -> usize {
        self.live_handles.lock().len()
    }

    /// Number of handles released over the client's lifetime.
    pub fn handles_released(&self) -> u64 {
        self.handles_released.load(Ordering::Relaxed)
    }

    /// Snapshot of request statistics.
    pub fn stats(&self) -> FetchStats {
        FetchStats {
            requests_issued: self.requests_issued.load(Ordering::Relaxed),
            bytes_fetched: self.bytes_fetched.load(Ordering::Relaxed),
        }
    }
}
