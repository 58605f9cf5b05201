//! Drives the coordinator against an in-memory origin and a logging audio
//! output, printing state snapshots along the way.
//!
//! Run with `cargo run -p core-streaming --example playback_demo`.

use async_trait::async_trait;
use bridge_traits::error::{BridgeError, Result as BridgeResult};
use bridge_traits::http::{ByteRange, RangeHttpClient, RangeResponse};
use bridge_traits::player::{AudioOutput, PlayerEvent};
use bytes::Bytes;
use core_streaming::{
    DurationProbe, MetadataStore, PlaybackCoordinator, RangeFetchClient, RangePresenceTracker,
    StreamError, StreamingConfig, TrackId,
};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// In-memory origin with two fixed-size tracks.
struct DemoOrigin {
    sizes: HashMap<String, u64>,
}

#[async_trait]
impl RangeHttpClient for DemoOrigin {
    async fn fetch(&self, url: &str, range: Option<ByteRange>) -> BridgeResult<RangeResponse> {
        let total = *self
            .sizes
            .get(url)
            .ok_or_else(|| BridgeError::NotAvailable(format!("no track at {}", url)))?;

        let mut headers = HashMap::new();
        headers.insert("Content-Type".to_string(), "audio/mpeg".to_string());

        match range {
            Some(range) => {
                let end = range.end.min(total.saturating_sub(1));
                let len = end.saturating_sub(range.start) + 1;
                headers.insert(
                    "Content-Range".to_string(),
                    format!("bytes {}-{}/{}", range.start, end, total),
                );
                Ok(RangeResponse {
                    status: 206,
                    headers,
                    body: Bytes::from(vec![0u8; len as usize]),
                })
            }
            None => {
                headers.insert("Content-Length".to_string(), total.to_string());
                headers.insert("Accept-Ranges".to_string(), "bytes".to_string());
                Ok(RangeResponse {
                    status: 200,
                    headers,
                    body: Bytes::from(vec![0u8; total as usize]),
                })
            }
        }
    }

    async fn head(&self, url: &str) -> BridgeResult<RangeResponse> {
        let total = *self
            .sizes
            .get(url)
            .ok_or_else(|| BridgeError::NotAvailable(format!("no track at {}", url)))?;

        let mut headers = HashMap::new();
        headers.insert("Content-Type".to_string(), "audio/mpeg".to_string());
        headers.insert("Content-Length".to_string(), total.to_string());
        headers.insert("Accept-Ranges".to_string(), "bytes".to_string());
        Ok(RangeResponse {
            status: 200,
            headers,
            body: Bytes::new(),
        })
    }
}

/// Duration probe that never decodes, forcing the bitrate estimate path.
struct NoopProbe;

impl DurationProbe for NoopProbe {
    fn decode_duration(&self, _prefix: &Bytes) -> core_streaming::Result<Duration> {
        Err(StreamError::DurationUndecodable(
            "demo bytes carry no container".to_string(),
        ))
    }
}

/// Audio output that logs every call instead of making sound.
#[derive(Default)]
struct LoggingOutput {
    position: Mutex<Duration>,
}

#[async_trait]
impl AudioOutput for LoggingOutput {
    async fn load(&self, url: &str) -> BridgeResult<()> {
        info!(url, "engine: load");
        Ok(())
    }

    async fn play(&self) -> BridgeResult<()> {
        info!("engine: play");
        Ok(())
    }

    async fn pause(&self) -> BridgeResult<()> {
        info!("engine: pause");
        Ok(())
    }

    async fn set_volume(&self, volume: f32) -> BridgeResult<()> {
        info!(volume, "engine: set_volume");
        Ok(())
    }

    async fn position(&self) -> BridgeResult<Duration> {
        Ok(*self.position.lock())
    }

    async fn set_position(&self, position: Duration) -> BridgeResult<()> {
        info!(secs = position.as_secs_f64(), "engine: set_position");
        *self.position.lock() = position;
        Ok(())
    }

    async fn poll_events(&self) -> Vec<PlayerEvent> {
        Vec::new()
    }

    async fn unload(&self) -> BridgeResult<()> {
        info!("engine: unload");
        Ok(())
    }
}

#[tokio::main]
async fn main() -> core_streaming::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,core_streaming=debug".into()),
        )
        .init();

    let origin = Arc::new(DemoOrigin {
        sizes: HashMap::from([
            ("first.mp3".to_string(), 5_000_000),
            ("second.mp3".to_string(), 2_400_000),
        ]),
    });

    let config = StreamingConfig::default();
    let coordinator = PlaybackCoordinator::new(
        config.clone(),
        MetadataStore::new(origin.clone(), Arc::new(NoopProbe), config),
        RangeFetchClient::new(origin),
        RangePresenceTracker::new(),
        Arc::new(LoggingOutput::default()),
        vec![TrackId::from("first.mp3"), TrackId::from("second.mp3")],
    );

    coordinator.load_track(0).await?;
    info!(state = ?coordinator.snapshot(), "after load");

    coordinator.seek(Duration::from_secs(150)).await?;
    info!(state = ?coordinator.snapshot(), "after seek");

    coordinator.toggle_play_pause().await?;
    coordinator.toggle_play_pause().await?;

    coordinator.next().await?;
    info!(state = ?coordinator.snapshot(), "after next");

    let stats = coordinator.fetcher().stats();
    info!(
        requests = stats.requests_issued,
        bytes = stats.bytes_fetched,
        "network totals"
    );

    coordinator.shutdown().await;
    Ok(())
}
