//! Shared test doubles for the coordinator integration tests.
//!
//! `ScriptedRangeClient` plays the role of the range-fetch boundary over an
//! in-memory catalog of tracks; `FakeAudioOutput` stands in for the native
//! playback primitive and records every call it receives.

use async_trait::async_trait;
use bridge_traits::error::{BridgeError, Result as BridgeResult};
use bridge_traits::http::{ByteRange, RangeHttpClient, RangeResponse};
use bridge_traits::player::{AudioOutput, PlayerEvent};
use bytes::Bytes;
use core_streaming::error::{Result, StreamError};
use core_streaming::metadata::DurationProbe;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::Duration;

// ============================================================================
// Scripted Range Client
// ============================================================================

/// Behavior of one remote track.
#[derive(Debug, Clone)]
pub struct TrackSpec {
    pub total_size: u64,
    pub supports_ranges: bool,
    pub content_type: String,
    /// Force every response to this status (e.g. 404, 503).
    pub status_override: Option<u16>,
    /// Simulated origin latency.
    pub delay: Option<Duration>,
}

impl TrackSpec {
    pub fn new(total_size: u64) -> Self {
        Self {
            total_size,
            supports_ranges: true,
            content_type: "audio/mpeg".to_string(),
            status_override: None,
            delay: None,
        }
    }

    pub fn without_ranges(mut self) -> Self {
        self.supports_ranges = false;
        self
    }

    pub fn failing(mut self, status: u16) -> Self {
        self.status_override = Some(status);
        self
    }

    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

/// In-memory origin serving a catalog of tracks with range semantics.
#[derive(Default)]
pub struct ScriptedRangeClient {
    tracks: HashMap<String, TrackSpec>,
    requests: Mutex<Vec<(String, Option<ByteRange>)>>,
    heads: Mutex<Vec<String>>,
}

impl ScriptedRangeClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_track(mut self, url: &str, spec: TrackSpec) -> Self {
        self.tracks.insert(url.to_string(), spec);
        self
    }

    /// Every `(url, range)` pair fetched so far, in order.
    pub fn requests(&self) -> Vec<(String, Option<ByteRange>)> {
        self.requests.lock().clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().len()
    }

    /// Number of head probes served so far.
    pub fn head_count(&self) -> usize {
        self.heads.lock().len()
    }

    fn spec_for(&self, url: &str) -> BridgeResult<TrackSpec> {
        self.tracks
            .get(url)
            .cloned()
            .ok_or_else(|| BridgeError::NotAvailable(format!("no track at {}", url)))
    }
}

#[async_trait]
impl RangeHttpClient for ScriptedRangeClient {
    async fn fetch(&self, url: &str, range: Option<ByteRange>) -> BridgeResult<RangeResponse> {
        self.requests.lock().push((url.to_string(), range));

        let spec = self.spec_for(url)?;

        if let Some(delay) = spec.delay {
            tokio::time::sleep(delay).await;
        }

        if let Some(status) = spec.status_override {
            return Ok(RangeResponse {
                status,
                headers: HashMap::new(),
                body: Bytes::new(),
            });
        }

        let mut headers = HashMap::new();
        headers.insert("Content-Type".to_string(), spec.content_type.clone());

        match range {
            Some(range) if spec.supports_ranges => {
                let last = spec.total_size.saturating_sub(1);
                let end = range.end.min(last);
                let len = end.saturating_sub(range.start) + 1;
                headers.insert(
                    "Content-Range".to_string(),
                    format!("bytes {}-{}/{}", range.start, end, spec.total_size),
                );
                headers.insert("Content-Length".to_string(), len.to_string());
                Ok(RangeResponse {
                    status: 206,
                    headers,
                    body: Bytes::from(vec![0u8; len as usize]),
                })
            }
            _ => {
                headers.insert("Content-Length".to_string(), spec.total_size.to_string());
                if spec.supports_ranges {
                    headers.insert("Accept-Ranges".to_string(), "bytes".to_string());
                }
                Ok(RangeResponse {
                    status: 200,
                    headers,
                    body: Bytes::from(vec![0u8; spec.total_size as usize]),
                })
            }
        }
    }

    async fn head(&self, url: &str) -> BridgeResult<RangeResponse> {
        self.heads.lock().push(url.to_string());

        let spec = self.spec_for(url)?;

        if let Some(delay) = spec.delay {
            tokio::time::sleep(delay).await;
        }

        if let Some(status) = spec.status_override {
            return Ok(RangeResponse {
                status,
                headers: HashMap::new(),
                body: Bytes::new(),
            });
        }

        let mut headers = HashMap::new();
        headers.insert("Content-Type".to_string(), spec.content_type.clone());
        headers.insert("Content-Length".to_string(), spec.total_size.to_string());
        if spec.supports_ranges {
            headers.insert("Accept-Ranges".to_string(), "bytes".to_string());
        }
        Ok(RangeResponse {
            status: 200,
            headers,
            body: Bytes::new(),
        })
    }
}

// ============================================================================
// Fixed Duration Probe
// ============================================================================

/// Probe that either reports a fixed decoded duration or always fails,
/// pushing the store onto its size/bitrate estimate path.
pub struct FixedDurationProbe {
    pub duration: Option<Duration>,
}

impl DurationProbe for FixedDurationProbe {
    fn decode_duration(&self, _prefix: &Bytes) -> Result<Duration> {
        self.duration
            .ok_or_else(|| StreamError::DurationUndecodable("scripted failure".to_string()))
    }
}

// ============================================================================
// Fake Audio Output
// ============================================================================

/// Records every call and replays queued engine events.
#[derive(Default)]
pub struct FakeAudioOutput {
    calls: Mutex<Vec<String>>,
    position: Mutex<Duration>,
    position_delay: Mutex<Option<Duration>>,
    events: Mutex<Vec<PlayerEvent>>,
    fail_play: Mutex<Option<String>>,
}

impl FakeAudioOutput {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    pub fn call_count(&self, name: &str) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|c| c.as_str() == name || c.starts_with(&format!("{}:", name)))
            .count()
    }

    pub fn set_reported_position(&self, position: Duration) {
        *self.position.lock() = position;
    }

    /// Make every position query sleep before answering.
    pub fn delay_position(&self, delay: Duration) {
        *self.position_delay.lock() = Some(delay);
    }

    pub fn push_event(&self, event: PlayerEvent) {
        self.events.lock().push(event);
    }

    pub fn fail_next_play(&self, message: &str) {
        *self.fail_play.lock() = Some(message.to_string());
    }
}

#[async_trait]
impl AudioOutput for FakeAudioOutput {
    async fn load(&self, url: &str) -> BridgeResult<()> {
        self.calls.lock().push(format!("load:{}", url));
        Ok(())
    }

    async fn play(&self) -> BridgeResult<()> {
        if let Some(message) = self.fail_play.lock().take() {
            return Err(BridgeError::OperationFailed(message));
        }
        self.calls.lock().push("play".to_string());
        Ok(())
    }

    async fn pause(&self) -> BridgeResult<()> {
        self.calls.lock().push("pause".to_string());
        Ok(())
    }

    async fn set_volume(&self, volume: f32) -> BridgeResult<()> {
        self.calls.lock().push(format!("set_volume:{}", volume));
        Ok(())
    }

    async fn position(&self) -> BridgeResult<Duration> {
        let delay = *self.position_delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        Ok(*self.position.lock())
    }

    async fn set_position(&self, position: Duration) -> BridgeResult<()> {
        self.calls
            .lock()
            .push(format!("set_position:{}", position.as_secs_f64()));
        *self.position.lock() = position;
        Ok(())
    }

    async fn poll_events(&self) -> Vec<PlayerEvent> {
        std::mem::take(&mut *self.events.lock())
    }

    async fn unload(&self) -> BridgeResult<()> {
        self.calls.lock().push("unload".to_string());
        Ok(())
    }
}
