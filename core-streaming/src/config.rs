//! # Streaming Configuration
//!
//! Configuration for preload windows, the duration probe, and the transport
//! timeout.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Streaming core configuration.
///
/// All byte windows are upper bounds; the core clamps them to the actual
/// resource size before issuing requests.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamingConfig {
    /// Prefix window fetched for the duration probe.
    ///
    /// Default: 1 MiB.
    #[serde(default = "default_probe_prefix_bytes")]
    pub probe_prefix_bytes: u64,

    /// Prefix preloaded when a track is loaded, so playback can begin
    /// without waiting for the rest of the file.
    ///
    /// Default: 1 MiB.
    #[serde(default = "default_initial_preload_bytes")]
    pub initial_preload_bytes: u64,

    /// Bytes preloaded before the seek target's approximate byte offset.
    ///
    /// Default: 512 KiB.
    #[serde(default = "default_seek_preload_before_bytes")]
    pub seek_preload_before_bytes: u64,

    /// Bytes preloaded after the seek target's approximate byte offset.
    ///
    /// Default: 1 MiB.
    #[serde(default = "default_seek_preload_after_bytes")]
    pub seek_preload_after_bytes: u64,

    /// Bitrate assumed when duration must be estimated from size.
    ///
    /// Default: 128 kbps.
    #[serde(default = "default_assumed_bitrate_bps")]
    pub assumed_bitrate_bps: u64,

    /// Maximum duration to wait for a transport response.
    ///
    /// Default: 30 seconds.
    #[serde(default = "default_request_timeout")]
    pub request_timeout: Duration,
}

impl Default for StreamingConfig {
    fn default() -> Self {
        Self {
            probe_prefix_bytes: default_probe_prefix_bytes(),
            initial_preload_bytes: default_initial_preload_bytes(),
            seek_preload_before_bytes: default_seek_preload_before_bytes(),
            seek_preload_after_bytes: default_seek_preload_after_bytes(),
            assumed_bitrate_bps: default_assumed_bitrate_bps(),
            request_timeout: default_request_timeout(),
        }
    }
}

impl StreamingConfig {
    /// Configuration for constrained networks.
    ///
    /// - Smaller probe and preload windows
    /// - Same assumed bitrate
    pub fn conservative() -> Self {
        Self {
            probe_prefix_bytes: 256 * 1024,
            initial_preload_bytes: 256 * 1024,
            seek_preload_before_bytes: 128 * 1024,
            seek_preload_after_bytes: 256 * 1024,
            ..Default::default()
        }
    }

    /// Configuration favoring uninterrupted playback over bandwidth.
    ///
    /// - Larger preload windows around track start and seek targets
    pub fn aggressive() -> Self {
        Self {
            initial_preload_bytes: 4 * 1024 * 1024,
            seek_preload_before_bytes: 1024 * 1024,
            seek_preload_after_bytes: 4 * 1024 * 1024,
            ..Default::default()
        }
    }

    /// Validate configuration values.
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.probe_prefix_bytes == 0 {
            return Err("probe_prefix_bytes must be > 0".to_string());
        }

        if self.initial_preload_bytes == 0 {
            return Err("initial_preload_bytes must be > 0".to_string());
        }

        if self.assumed_bitrate_bps == 0 {
            return Err("assumed_bitrate_bps must be > 0".to_string());
        }

        if self.request_timeout.is_zero() {
            return Err("request_timeout must be > 0".to_string());
        }

        Ok(())
    }
}

// ============================================================================
// Default Functions (for serde)
// ============================================================================

fn default_probe_prefix_bytes() -> u64 {
    1024 * 1024 // 1 MiB
}

fn default_initial_preload_bytes() -> u64 {
    1024 * 1024 // 1 MiB
}

fn default_seek_preload_before_bytes() -> u64 {
    512 * 1024 // 512 KiB
}

fn default_seek_preload_after_bytes() -> u64 {
    1024 * 1024 // 1 MiB
}

fn default_assumed_bitrate_bps() -> u64 {
    128_000 // 128 kbps
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(30)
}
