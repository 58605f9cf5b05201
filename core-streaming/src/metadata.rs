//! # Metadata Store
//!
//! Per-track cache of duration, total size, content type, and range-support.
//!
//! A probe starts with a `HEAD` request, whose headers give the resource
//! size, content type, and range support. Duration is rarely reported
//! directly, so the store determines it in three steps:
//!
//! 1. Fetch a small prefix of the byte stream and ask the [`DurationProbe`]
//!    to decode the true duration from the container headers.
//! 2. If the prefix cannot be fetched or decoded (prefix too short,
//!    undecodable format), estimate `total_size * 8 / assumed_bitrate`.
//! 3. If even the size is unavailable, duration is zero and the caller
//!    degrades gracefully.
//!
//! Entries are immutable once computed. The only eviction is an explicit
//! [`MetadataStore::clear`]; there is no TTL.

use crate::config::StreamingConfig;
use crate::error::{Result, StreamError};
use bridge_traits::http::{ByteRange, RangeHttpClient};
use bytes::Bytes;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument, warn};

/// Opaque identifier naming a remote audio resource.
///
/// The identifier doubles as the resource URL handed to the transport and as
/// the cache key everywhere in the core.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TrackId(String);

impl TrackId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for TrackId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for TrackId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl std::fmt::Display for TrackId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// Cached metadata for one track. Immutable once computed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioMetadata {
    /// Playable length. Zero when undeterminable.
    pub duration: Duration,
    /// Total resource size in bytes. Zero when the origin did not report it.
    pub total_size_bytes: u64,
    /// Reported content type.
    pub content_type: String,
    /// Whether the origin honors byte-range requests.
    pub supports_range_requests: bool,
    /// Whether `duration` came from the size/bitrate estimate rather than a
    /// structured decode. Estimates are best-effort, not authoritative.
    pub duration_is_estimate: bool,
}

/// Pluggable capability to extract a duration from a stream prefix.
///
/// The decode runs over in-memory bytes and is synchronous; network I/O
/// happens before it is invoked.
#[cfg_attr(test, mockall::automock)]
pub trait DurationProbe: Send + Sync {
    /// Decode the total stream duration from `prefix`.
    ///
    /// # Errors
    ///
    /// Returns [`StreamError::DurationUndecodable`] when the prefix does not
    /// contain enough of the container to determine duration. The caller
    /// recovers with an estimate; this error never propagates further.
    fn decode_duration(&self, prefix: &Bytes) -> Result<Duration>;
}

/// Duration probe backed by symphonia's format readers.
///
/// Probes the container headers in the prefix; works for formats that carry
/// duration up front (FLAC, WAV, most MP4/AAC). Formats that only reveal
/// duration after a full scan fall back to the estimate path.
#[cfg(feature = "decoder")]
pub struct SymphoniaDurationProbe;

#[cfg(feature = "decoder")]
impl DurationProbe for SymphoniaDurationProbe {
    fn decode_duration(&self, prefix: &Bytes) -> Result<Duration> {
        use symphonia::core::codecs::CODEC_TYPE_NULL;
        use symphonia::core::formats::FormatOptions;
        use symphonia::core::io::MediaSourceStream;
        use symphonia::core::meta::MetadataOptions;
        use symphonia::core::probe::Hint;

        let cursor = std::io::Cursor::new(prefix.to_vec());
        let stream = MediaSourceStream::new(Box::new(cursor), Default::default());

        let probed = symphonia::default::get_probe()
            .format(
                &Hint::new(),
                stream,
                &FormatOptions::default(),
                &MetadataOptions::default(),
            )
            .map_err(|e| StreamError::DurationUndecodable(e.to_string()))?;

        let track = probed
            .format
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or_else(|| {
                StreamError::DurationUndecodable("no decodable audio track in prefix".to_string())
            })?;

        let params = &track.codec_params;

        if let (Some(n_frames), Some(time_base)) = (params.n_frames, params.time_base) {
            let time = time_base.calc_time(n_frames);
            return Ok(Duration::from_secs_f64(time.seconds as f64 + time.frac));
        }

        if let (Some(n_frames), Some(sample_rate)) = (params.n_frames, params.sample_rate) {
            return Ok(Duration::from_secs_f64(n_frames as f64 / sample_rate as f64));
        }

        Err(StreamError::DurationUndecodable(
            "container does not report frame count in prefix".to_string(),
        ))
    }
}

/// Session-scoped metadata cache.
///
/// Explicitly constructed and caller-owned; scope one instance to each
/// coordinator so tests get isolated instances without cross-test leakage.
pub struct MetadataStore {
    http: Arc<dyn RangeHttpClient>,
    probe: Arc<dyn DurationProbe>,
    config: StreamingConfig,
    cache: Mutex<HashMap<TrackId, AudioMetadata>>,
    probes_issued: AtomicU64,
}

impl MetadataStore {
    /// Create a new store over the given transport and duration probe.
    pub fn new(
        http: Arc<dyn RangeHttpClient>,
        probe: Arc<dyn DurationProbe>,
        config: StreamingConfig,
    ) -> Self {
        Self {
            http,
            probe,
            config,
            cache: Mutex::new(HashMap::new()),
            probes_issued: AtomicU64::new(0),
        }
    }

    /// Fetch (or return cached) metadata for `id`.
    ///
    /// The first call runs exactly one probe sequence (a `HEAD` for the
    /// resource shape, then a prefix fetch for the duration decode); every
    /// later call in the session returns the cached entry with no network
    /// traffic and no re-validation.
    ///
    /// # Errors
    ///
    /// Returns [`StreamError::MetadataFetch`] when the `HEAD` probe fails
    /// at the transport or returns a non-retrievable status. Prefix fetch
    /// and decode failures inside duration determination are recovered
    /// locally and never surface.
    #[instrument(skip(self), fields(track = %id))]
    pub async fn get(&self, id: &TrackId) -> Result<AudioMetadata> {
        if let Some(cached) = self.cache.lock().get(id) {
            debug!("Metadata cache hit");
            return Ok(cached.clone());
        }

        let metadata = self.probe_remote(id).await?;
        self.cache.lock().insert(id.clone(), metadata.clone());
        Ok(metadata)
    }

    async fn probe_remote(&self, id: &TrackId) -> Result<AudioMetadata> {
        self.probes_issued.fetch_add(1, Ordering::Relaxed);

        let head = self
            .http
            .head(id.as_str())
            .await
            .map_err(|e| StreamError::MetadataFetch(e.to_string()))?;

        if !head.is_retrievable() {
            return Err(StreamError::MetadataFetch(format!(
                "probe for {} returned status {}",
                id, head.status
            )));
        }

        let total_size_bytes = head.total_size().unwrap_or(0);
        let content_type = head
            .content_type()
            .unwrap_or("application/octet-stream")
            .to_string();
        let supports_range_requests = head.accepts_ranges();

        let (duration, duration_is_estimate) = match self.fetch_prefix(id).await {
            Ok(prefix) => match self.probe.decode_duration(&prefix) {
                Ok(duration) => (duration, false),
                Err(e) => {
                    debug!(error = %e, "Prefix decode failed, falling back to bitrate estimate");
                    (self.estimate_duration(total_size_bytes), true)
                }
            },
            Err(e) => {
                debug!(error = %e, "Prefix fetch failed, falling back to bitrate estimate");
                (self.estimate_duration(total_size_bytes), true)
            }
        };

        if duration.is_zero() {
            warn!(track = %id, "Duration undeterminable, reporting zero");
        }

        debug!(
            track = %id,
            size = total_size_bytes,
            duration_secs = duration.as_secs_f64(),
            estimate = duration_is_estimate,
            ranges = supports_range_requests,
            "Metadata probed"
        );

        Ok(AudioMetadata {
            duration,
            total_size_bytes,
            content_type,
            supports_range_requests,
            duration_is_estimate,
        })
    }

    /// Fetch the prefix window the duration decode runs over.
    async fn fetch_prefix(&self, id: &TrackId) -> Result<Bytes> {
        // A probe prefix of zero is rejected by config validation, so the
        // range is always present.
        let range = ByteRange::prefix(self.config.probe_prefix_bytes);
        let response = self
            .http
            .fetch(id.as_str(), range)
            .await
            .map_err(|e| StreamError::MetadataFetch(e.to_string()))?;

        if !response.is_retrievable() {
            return Err(StreamError::MetadataFetch(format!(
                "prefix fetch for {} returned status {}",
                id, response.status
            )));
        }

        Ok(response.body)
    }

    fn estimate_duration(&self, total_size_bytes: u64) -> Duration {
        if total_size_bytes == 0 {
            return Duration::ZERO;
        }
        let seconds = (total_size_bytes as f64 * 8.0) / self.config.assumed_bitrate_bps as f64;
        Duration::from_secs_f64(seconds)
    }

    /// Number of probe requests issued so far (cache misses).
    pub fn probes_issued(&self) -> u64 {
        self.probes_issued.load(Ordering::Relaxed)
    }

    /// Number of cached entries.
    pub fn len(&self) -> usize {
        self.cache.lock().len()
    }

    /// Returns `true` when no entries are cached.
    pub fn is_empty(&self) -> bool {
        self.cache.lock().is_empty()
    }

    /// Drop every cached entry. The only eviction mechanism.
    pub fn clear(&self) {
        self.cache.lock().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_traits::http::RangeResponse;

    struct FixedResponseClient {
        response: RangeResponse,
    }

    #[async_trait::async_trait]
    impl RangeHttpClient for FixedResponseClient {
        async fn fetch(
            &self,
            _url: &str,
            _range: Option<ByteRange>,
        ) -> bridge_traits::Result<RangeResponse> {
            Ok(self.response.clone())
        }

        async fn head(&self, _url: &str) -> bridge_traits::Result<RangeResponse> {
            Ok(RangeResponse {
                body: Bytes::new(),
                ..self.response.clone()
            })
        }
    }

    /// Answers `head` and `fetch` with distinct responses.
    struct SplitClient {
        head: RangeResponse,
        fetch: RangeResponse,
    }

    #[async_trait::async_trait]
    impl RangeHttpClient for SplitClient {
        async fn fetch(
            &self,
            _url: &str,
            _range: Option<ByteRange>,
        ) -> bridge_traits::Result<RangeResponse> {
            Ok(self.fetch.clone())
        }

        async fn head(&self, _url: &str) -> bridge_traits::Result<RangeResponse> {
            Ok(self.head.clone())
        }
    }

    fn partial_response(total: u64, body: &'static [u8]) -> RangeResponse {
        let mut headers = HashMap::new();
        headers.insert(
            "Content-Range".to_string(),
            format!("bytes 0-{}/{}", body.len().max(1) - 1, total),
        );
        headers.insert("Content-Type".to_string(), "audio/mpeg".to_string());
        RangeResponse {
            status: 206,
            headers,
            body: Bytes::from_static(body),
        }
    }

    #[tokio::test]
    async fn decode_success_yields_exact_duration() {
        let mut probe = MockDurationProbe::new();
        probe
            .expect_decode_duration()
            .times(1)
            .returning(|_| Ok(Duration::from_secs(200)));

        let store = MetadataStore::new(
            Arc::new(FixedResponseClient {
                response: partial_response(5_000_000, b"prefix"),
            }),
            Arc::new(probe),
            StreamingConfig::default(),
        );

        let meta = store.get(&TrackId::from("a.mp3")).await.unwrap();
        assert_eq!(meta.duration, Duration::from_secs(200));
        assert!(!meta.duration_is_estimate);
        assert_eq!(meta.total_size_bytes, 5_000_000);
        assert_eq!(meta.content_type, "audio/mpeg");
        assert!(meta.supports_range_requests);
    }

    #[tokio::test]
    async fn decode_failure_falls_back_to_estimate() {
        let mut probe = MockDurationProbe::new();
        probe
            .expect_decode_duration()
            .returning(|_| Err(StreamError::DurationUndecodable("truncated".into())));

        let store = MetadataStore::new(
            Arc::new(FixedResponseClient {
                response: partial_response(1_600_000, b"prefix"),
            }),
            Arc::new(probe),
            StreamingConfig::default(),
        );

        let meta = store.get(&TrackId::from("b.mp3")).await.unwrap();
        // 1_600_000 bytes * 8 / 128_000 bps = 100 seconds
        assert_eq!(meta.duration, Duration::from_secs(100));
        assert!(meta.duration_is_estimate);
    }

    #[tokio::test]
    async fn missing_size_yields_zero_duration() {
        let mut probe = MockDurationProbe::new();
        probe
            .expect_decode_duration()
            .returning(|_| Err(StreamError::DurationUndecodable("truncated".into())));

        let response = RangeResponse {
            status: 200,
            headers: HashMap::new(),
            body: Bytes::new(),
        };
        let store = MetadataStore::new(
            Arc::new(FixedResponseClient { response }),
            Arc::new(probe),
            StreamingConfig::default(),
        );

        let meta = store.get(&TrackId::from("c.mp3")).await.unwrap();
        assert_eq!(meta.duration, Duration::ZERO);
        assert_eq!(meta.total_size_bytes, 0);
        assert!(!meta.supports_range_requests);
    }

    #[tokio::test]
    async fn second_get_hits_cache() {
        let mut probe = MockDurationProbe::new();
        probe
            .expect_decode_duration()
            .times(1)
            .returning(|_| Ok(Duration::from_secs(30)));

        let store = MetadataStore::new(
            Arc::new(FixedResponseClient {
                response: partial_response(1_000_000, b"prefix"),
            }),
            Arc::new(probe),
            StreamingConfig::default(),
        );

        let id = TrackId::from("d.mp3");
        let first = store.get(&id).await.unwrap();
        let second = store.get(&id).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(store.probes_issued(), 1);
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn clear_forces_reprobe() {
        let mut probe = MockDurationProbe::new();
        probe
            .expect_decode_duration()
            .times(2)
            .returning(|_| Ok(Duration::from_secs(30)));

        let store = MetadataStore::new(
            Arc::new(FixedResponseClient {
                response: partial_response(1_000_000, b"prefix"),
            }),
            Arc::new(probe),
            StreamingConfig::default(),
        );

        let id = TrackId::from("e.mp3");
        store.get(&id).await.unwrap();
        store.clear();
        assert!(store.is_empty());
        store.get(&id).await.unwrap();
        assert_eq!(store.probes_issued(), 2);
    }

    #[tokio::test]
    async fn non_retrievable_status_is_metadata_error() {
        let probe = MockDurationProbe::new();
        let response = RangeResponse {
            status: 404,
            headers: HashMap::new(),
            body: Bytes::new(),
        };
        let store = MetadataStore::new(
            Arc::new(FixedResponseClient { response }),
            Arc::new(probe),
            StreamingConfig::default(),
        );

        let err = store.get(&TrackId::from("missing.mp3")).await.unwrap_err();
        assert!(matches!(err, StreamError::MetadataFetch(_)));
        // Failures are not cached; the next call may retry.
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn discovery_fields_come_from_head() {
        let mut probe = MockDurationProbe::new();
        probe
            .expect_decode_duration()
            .times(1)
            .returning(|_| Ok(Duration::from_secs(10)));

        let mut head_headers = HashMap::new();
        head_headers.insert("Content-Length".to_string(), "2000000".to_string());
        head_headers.insert("Accept-Ranges".to_string(), "bytes".to_string());
        head_headers.insert("Content-Type".to_string(), "audio/flac".to_string());

        // The prefix fetch carries bytes but no useful headers; size,
        // content type, and range support must come from the head probe.
        let store = MetadataStore::new(
            Arc::new(SplitClient {
                head: RangeResponse {
                    status: 200,
                    headers: head_headers,
                    body: Bytes::new(),
                },
                fetch: RangeResponse {
                    status: 200,
                    headers: HashMap::new(),
                    body: Bytes::from_static(b"prefix"),
                },
            }),
            Arc::new(probe),
            StreamingConfig::default(),
        );

        let meta = store.get(&TrackId::from("f.mp3")).await.unwrap();
        assert_eq!(meta.total_size_bytes, 2_000_000);
        assert_eq!(meta.content_type, "audio/flac");
        assert!(meta.supports_range_requests);
        assert_eq!(meta.duration, Duration::from_secs(10));
    }

    #[tokio::test]
    async fn prefix_fetch_failure_falls_back_to_estimate() {
        // Decode must never run when the prefix fetch fails.
        let probe = MockDurationProbe::new();

        let mut head_headers = HashMap::new();
        head_headers.insert("Content-Length".to_string(), "1600000".to_string());
        head_headers.insert("Accept-Ranges".to_string(), "bytes".to_string());

        let store = MetadataStore::new(
            Arc::new(SplitClient {
                head: RangeResponse {
                    status: 200,
                    headers: head_headers,
                    body: Bytes::new(),
                },
                fetch: RangeResponse {
                    status: 503,
                    headers: HashMap::new(),
                    body: Bytes::new(),
                },
            }),
            Arc::new(probe),
            StreamingConfig::default(),
        );

        let meta = store.get(&TrackId::from("g.mp3")).await.unwrap();
        assert_eq!(meta.duration, Duration::from_secs(100));
        assert!(meta.duration_is_estimate);
        assert_eq!(meta.total_size_bytes, 1_600_000);
    }
}
