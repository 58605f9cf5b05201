//! Native Audio Playback Primitive
//!
//! The coordinator drives an [`AudioOutput`] rather than a platform audio
//! engine directly. Hosts implement this trait over whatever primitive they
//! have (a desktop audio sink, a media element, a test double). The contract
//! is deliberately small: load a handle URL, control playback, and expose an
//! event feed the coordinator drains on its progress tick.

use async_trait::async_trait;
use std::time::Duration;
use uuid::Uuid;

use crate::error::Result;

/// Unique identifier for a streaming handle created by the fetch client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandleId(Uuid);

impl HandleId {
    /// Generate a new handle identifier.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Borrow the underlying UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for HandleId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for HandleId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// Asynchronous notifications emitted by the playback primitive.
#[derive(Debug, Clone, PartialEq)]
pub enum PlayerEvent {
    /// The engine determined the true duration of the loaded resource.
    DurationKnown(Duration),
    /// Playback reached the natural end of the track.
    Ended,
    /// The engine reported a runtime failure (unsupported codec, device
    /// error, autoplay restriction).
    Error(String),
}

/// Platform audio playback boundary.
///
/// Ownership contract: every successful `load` must be balanced by exactly
/// one `unload`, on every exit path. The coordinator enforces this at
/// track-switch and teardown boundaries.
#[async_trait]
pub trait AudioOutput: Send + Sync {
    /// Attach the engine to a streamable handle URL.
    async fn load(&self, url: &str) -> Result<()>;

    /// Begin or resume playback of the loaded resource.
    async fn play(&self) -> Result<()>;

    /// Pause playback, keeping the loaded resource and position.
    async fn pause(&self) -> Result<()>;

    /// Set playback volume, normalized to `0.0..=1.0`. Idempotent.
    async fn set_volume(&self, volume: f32) -> Result<()>;

    /// Current playback cursor position.
    async fn position(&self) -> Result<Duration>;

    /// Move the playback cursor to an absolute position.
    async fn set_position(&self, position: Duration) -> Result<()>;

    /// Drain pending engine events since the last call.
    ///
    /// The coordinator polls this on its progress tick; implementations
    /// should buffer events internally between calls.
    async fn poll_events(&self) -> Vec<PlayerEvent>;

    /// Detach from the loaded resource and release the native allocation.
    async fn unload(&self) -> Result<()>;
}
