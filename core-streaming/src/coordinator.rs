//! # Playback Coordinator
//!
//! Owns the playback state machine and drives the metadata store, range
//! fetch client, and presence tracker in response to user actions and
//! passive playback progress.
//!
//! ## State machine
//!
//! ```text
//! Idle → Loading → Ready → Playing ⇄ Paused
//!            │                │
//!            └────→ Error ←───┘
//! ```
//!
//! `Loading` is re-entered whenever the current track index changes. `Error`
//! is reachable from `Loading`, `Playing`, and `Paused`; only a new track
//! switch or an explicit [`PlaybackCoordinator::retry`] recovers from it.
//!
//! ## Scheduling model
//!
//! Single-threaded, cooperative: suspension points are exactly the network
//! fetches and the native playback primitive's own async calls. Shared state
//! lives behind `parking_lot` mutexes that are never held across an
//! `.await`. In-flight fetches are not cancelled on a track switch; instead
//! every resumption compares its load generation against the current one and
//! discards stale responses, so a slow response from an abandoned track can
//! never corrupt current state.

use crate::config::StreamingConfig;
use crate::error::{Result, StreamError};
use crate::fetch::{RangeFetchClient, StreamingHandle};
use crate::metadata::{AudioMetadata, MetadataStore, TrackId};
use crate::preload::RangePresenceTracker;
use bridge_traits::http::ByteRange;
use bridge_traits::player::{AudioOutput, PlayerEvent};
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

// ============================================================================
// Observable State
// ============================================================================

/// Coarse lifecycle state of the coordinator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaybackStatus {
    /// No track loaded.
    Idle,
    /// Metadata fetch, handle creation, and initial preload in progress.
    Loading,
    /// Track loaded and ready; playback not started.
    Ready,
    /// Audio is audible.
    Playing,
    /// Playback suspended, position retained.
    Paused,
    /// A fetch or playback failure occurred; `last_error` has the message.
    Error,
}

impl PlaybackStatus {
    /// Returns `true` when a track is loaded and controllable.
    pub fn is_loaded(&self) -> bool {
        matches!(self, Self::Ready | Self::Playing | Self::Paused)
    }
}

/// Read-only snapshot of the coordinator's observable state.
///
/// This is the full outbound contract consumed by the presentation layer;
/// it re-renders from snapshots and forwards user intents back in.
#[derive(Debug, Clone, Serialize)]
pub struct PlaybackState {
    pub current_track_index: usize,
    pub is_playing: bool,
    /// Normalized volume in `[0.0, 1.0]`.
    pub volume: f32,
    /// Playback cursor. Updated optimistically on seek, passively on tick.
    pub seek_position: Duration,
    /// Duration of the current track; zero when undeterminable.
    pub duration: Duration,
    pub is_loading: bool,
    pub last_error: Option<String>,
    pub status: PlaybackStatus,
}

impl Default for PlaybackState {
    fn default() -> Self {
        Self {
            current_track_index: 0,
            is_playing: false,
            volume: 1.0,
            seek_position: Duration::ZERO,
            duration: Duration::ZERO,
            is_loading: false,
            last_error: None,
            status: PlaybackStatus::Idle,
        }
    }
}

// ============================================================================
// Coordinator
// ============================================================================

/// Drives progressive streaming playback over an ordered track list.
///
/// All collaborators are dependency-injected and scoped to this instance;
/// there is no process-wide default client or cache, so tests construct
/// isolated coordinators without cross-test leakage. The track list is
/// supplied by the caller and read-only to the core.
pub struct PlaybackCoordinator {
    config: StreamingConfig,
    metadata: MetadataStore,
    fetcher: RangeFetchClient,
    tracker: RangePresenceTracker,
    output: Arc<dyn AudioOutput>,
    tracks: Vec<TrackId>,
    state: Mutex<PlaybackState>,
    current_handle: Mutex<Option<StreamingHandle>>,
    /// Monotonic load generation; the stale-response guard.
    generation: AtomicU64,
}

impl PlaybackCoordinator {
    /// Create a coordinator over the given collaborators and track list.
    pub fn new(
        config: StreamingConfig,
        metadata: MetadataStore,
        fetcher: RangeFetchClient,
        tracker: RangePresenceTracker,
        output: Arc<dyn AudioOutput>,
        tracks: Vec<TrackId>,
    ) -> Self {
        Self {
            config,
            metadata,
            fetcher,
            tracker,
            output,
            tracks,
            state: Mutex::new(PlaybackState::default()),
            current_handle: Mutex::new(None),
            generation: AtomicU64::new(0),
        }
    }

    /// Snapshot of the observable state.
    pub fn snapshot(&self) -> PlaybackState {
        self.state.lock().clone()
    }

    /// Identifier of the current track, once one has been loaded.
    pub fn track_name(&self) -> Option<String> {
        let state = self.state.lock();
        if state.status == PlaybackStatus::Idle {
            return None;
        }
        self.tracks
            .get(state.current_track_index)
            .map(|id| id.to_string())
    }

    /// The range fetch client, for request statistics.
    pub fn fetcher(&self) -> &RangeFetchClient {
        &self.fetcher
    }

    /// The metadata store, for cache observability.
    pub fn metadata(&self) -> &MetadataStore {
        &self.metadata
    }

    // ========================================================================
    // Track Switching
    // ========================================================================

    /// Load the track at `index` and start playing it.
    ///
    /// Re-enters `Loading`, resets the seek position to zero, and releases
    /// the previous track's playback resource and streaming handle before
    /// the new one is created. A switch always carries play intent: on
    /// success the state machine passes through `Ready` into `Playing`.
    ///
    /// # Errors
    ///
    /// Metadata, preload, or playback failures surface in `last_error`,
    /// leave the machine in `Error` with `is_loading` cleared, and are
    /// returned. No automatic retry is attempted.
    #[instrument(skip(self))]
    pub async fn load_track(&self, index: usize) -> Result<()> {
        let id = self
            .tracks
            .get(index)
            .cloned()
            .ok_or(StreamError::TrackIndexOutOfBounds(index))?;
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;

        info!(track = %id, "Loading track");
        {
            let mut state = self.state.lock();
            state.current_track_index = index;
            state.is_playing = false;
            state.is_loading = true;
            state.seek_position = Duration::ZERO;
            state.duration = Duration::ZERO;
            state.last_error = None;
            state.status = PlaybackStatus::Loading;
        }

        // Ownership transfers atomically at the switch boundary: the old
        // handle is gone before the new one exists.
        self.release_current_handle().await;

        let metadata = match self.metadata.get(&id).await {
            Ok(metadata) => metadata,
            Err(e) => return self.fail_if_current(generation, e),
        };
        if self.superseded(generation) {
            return Ok(());
        }
        self.state.lock().duration = metadata.duration;

        let handle = self.fetcher.create_streaming_handle(&id);
        let url = handle.url().to_string();
        *self.current_handle.lock() = Some(handle);

        // Initial prefix window so playback can begin without the rest of
        // the file.
        if let Some(window) = self.initial_window(&metadata) {
            if let Err(e) = self.preload_window(&id, &metadata, window).await {
                return self.fail_if_current(generation, e);
            }
            if self.superseded(generation) {
                return Ok(());
            }
        }

        if let Err(e) = self.output.load(&url).await {
            return self.fail_if_current(generation, StreamError::Playback(e.to_string()));
        }
        if self.superseded(generation) {
            return Ok(());
        }

        let volume = self.state.lock().volume;
        if let Err(e) = self.output.set_volume(volume).await {
            warn!(error = %e, "Could not apply volume to new session");
        }

        self.state.lock().status = PlaybackStatus::Ready;

        if let Err(e) = self.output.play().await {
            return self.fail_if_current(generation, StreamError::Playback(e.to_string()));
        }
        if self.superseded(generation) {
            return Ok(());
        }

        {
            let mut state = self.state.lock();
            state.is_loading = false;
            state.is_playing = true;
            state.status = PlaybackStatus::Playing;
        }
        info!(track = %id, "Track playing");
        Ok(())
    }

    /// Advance to the next track (wrapping), with play intent.
    pub async fn next(&self) -> Result<()> {
        if self.tracks.is_empty() {
            return Err(StreamError::NoTrackLoaded);
        }
        let index = (self.state.lock().current_track_index + 1) % self.tracks.len();
        self.load_track(index).await
    }

    /// Step back to the previous track (wrapping), with play intent.
    pub async fn previous(&self) -> Result<()> {
        if self.tracks.is_empty() {
            return Err(StreamError::NoTrackLoaded);
        }
        let len = self.tracks.len();
        let index = (self.state.lock().current_track_index + len - 1) % len;
        self.load_track(index).await
    }

    /// Re-issue the load for the current index; the explicit recovery from
    /// `Error`.
    pub async fn retry(&self) -> Result<()> {
        if self.tracks.is_empty() {
            return Err(StreamError::NoTrackLoaded);
        }
        let index = self.state.lock().current_track_index;
        self.load_track(index).await
    }

    // ========================================================================
    // Playback Control
    // ========================================================================

    /// Toggle between playing and paused. No-op when nothing is loaded.
    pub async fn toggle_play_pause(&self) -> Result<()> {
        let status = self.state.lock().status;
        match status {
            PlaybackStatus::Playing => {
                if let Err(e) = self.output.pause().await {
                    let err = StreamError::Playback(e.to_string());
                    self.set_error(&err);
                    return Err(err);
                }
                let mut state = self.state.lock();
                state.is_playing = false;
                state.status = PlaybackStatus::Paused;
                debug!("Playback paused");
            }
            PlaybackStatus::Ready | PlaybackStatus::Paused => {
                if let Err(e) = self.output.play().await {
                    let err = StreamError::Playback(e.to_string());
                    self.set_error(&err);
                    return Err(err);
                }
                let mut state = self.state.lock();
                state.is_playing = true;
                state.status = PlaybackStatus::Playing;
                debug!("Playback resumed");
            }
            _ => {
                debug!("Toggle ignored, no track loaded");
            }
        }
        Ok(())
    }

    /// Seek to `target`, clamped to `[0, duration]`.
    ///
    /// The cursor in the observable state updates immediately for UI
    /// responsiveness; audible resume may lag until the preload window
    /// around the target is resident. The window (512 KiB before, 1 MiB
    /// after by default, in byte terms derived from the target's
    /// approximate offset) prevents a seek into unfetched territory from
    /// stalling indefinitely.
    #[instrument(skip(self))]
    pub async fn seek(&self, target: Duration) -> Result<()> {
        let generation = self.generation.load(Ordering::SeqCst);
        let (id, duration) = {
            let state = self.state.lock();
            if !state.status.is_loaded() {
                return Err(StreamError::NoTrackLoaded);
            }
            let id = self
                .tracks
                .get(state.current_track_index)
                .cloned()
                .ok_or(StreamError::NoTrackLoaded)?;
            (id, state.duration)
        };

        let clamped = target.min(duration);
        // Optimistic update, regardless of preload completion.
        self.state.lock().seek_position = clamped;

        // Cached after load, so this is a lookup, not a network call.
        let metadata = match self.metadata.get(&id).await {
            Ok(metadata) => metadata,
            Err(e) => return self.fail_if_current(generation, e),
        };
        if self.superseded(generation) {
            return Ok(());
        }

        if let Some(window) = self.seek_window(&metadata, clamped, duration) {
            if let Err(e) = self.preload_window(&id, &metadata, window).await {
                return self.fail_if_current(generation, e);
            }
            if self.superseded(generation) {
                return Ok(());
            }
        }

        if let Err(e) = self.output.set_position(clamped).await {
            return self.fail_if_current(generation, StreamError::Playback(e.to_string()));
        }
        Ok(())
    }

    /// Seek to a position given in seconds.
    ///
    /// Convenience entry point for presentation layers that work in float
    /// seconds; negative and non-finite targets clamp to zero, everything
    /// else behaves as [`PlaybackCoordinator::seek`].
    pub async fn seek_seconds(&self, seconds: f64) -> Result<()> {
        let clamped = if seconds.is_finite() && seconds > 0.0 {
            seconds
        } else {
            0.0
        };
        self.seek(Duration::from_secs_f64(clamped)).await
    }

    /// Set volume, clamped to `[0, 1]`. Applied immediately and
    /// idempotently; no state-machine transition.
    pub async fn set_volume(&self, volume: f32) -> Result<()> {
        let volume = volume.clamp(0.0, 1.0);
        let loaded = {
            let mut state = self.state.lock();
            state.volume = volume;
            state.status.is_loaded()
        };
        if loaded {
            self.output
                .set_volume(volume)
                .await
                .map_err(|e| StreamError::Playback(e.to_string()))?;
        }
        Ok(())
    }

    // ========================================================================
    // Passive Progress
    // ========================================================================

    /// Observe the native playback cursor and drain engine events.
    ///
    /// Call periodically (UI frame or timer cadence). While `Playing`, the
    /// cursor is reflected into `seek_position`. Engine events map to
    /// transitions: a known duration supersedes an estimate, end-of-track
    /// triggers the same transition as an explicit `next`, and an engine
    /// error forces `Error`.
    pub async fn tick(&self) -> Result<()> {
        for event in self.output.poll_events().await {
            match event {
                PlayerEvent::DurationKnown(duration) => {
                    let mut state = self.state.lock();
                    if state.status != PlaybackStatus::Idle {
                        debug!(secs = duration.as_secs_f64(), "Engine reported duration");
                        state.duration = duration;
                    }
                }
                PlayerEvent::Ended => {
                    info!("Track ended, advancing");
                    self.next().await?;
                }
                PlayerEvent::Error(message) => {
                    let err = StreamError::Playback(message);
                    self.set_error(&err);
                    return Err(err);
                }
            }
        }

        let playing = self.state.lock().status == PlaybackStatus::Playing;
        if playing {
            match self.output.position().await {
                Ok(position) => {
                    // A pause can interleave with the position query; only a
                    // still-playing track takes the cursor update.
                    let mut state = self.state.lock();
                    if state.status == PlaybackStatus::Playing {
                        state.seek_position = position;
                    }
                }
                Err(e) => warn!(error = %e, "Position query failed"),
            }
        }
        Ok(())
    }

    // ========================================================================
    // Teardown
    // ========================================================================

    /// Release the live playback resource and handle and return to `Idle`.
    ///
    /// Every handle created over the coordinator's lifetime has exactly one
    /// release, reachable on every exit path; teardown covers the last one.
    pub async fn shutdown(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        self.release_current_handle().await;
        let mut state = self.state.lock();
        let volume = state.volume;
        *state = PlaybackState {
            volume,
            ..PlaybackState::default()
        };
        info!("Coordinator shut down");
    }

    // ========================================================================
    // Internals
    // ========================================================================

    fn superseded(&self, generation: u64) -> bool {
        let stale = self.generation.load(Ordering::SeqCst) != generation;
        if stale {
            debug!("Discarding response for superseded load");
        }
        stale
    }

    /// Record a failure, unless a newer load owns the state by now.
    fn fail_if_current(&self, generation: u64, err: StreamError) -> Result<()> {
        if self.superseded(generation) {
            return Ok(());
        }
        self.set_error(&err);
        Err(err)
    }

    fn set_error(&self, err: &StreamError) {
        warn!(error = %err, "Entering error state");
        let mut state = self.state.lock();
        state.is_loading = false;
        state.is_playing = false;
        state.status = PlaybackStatus::Error;
        state.last_error = Some(err.to_string());
    }

    async fn release_current_handle(&self) {
        let handle = self.current_handle.lock().take();
        if let Some(handle) = handle {
            if let Err(e) = self.output.unload().await {
                warn!(error = %e, "Unload failed during handle release");
            }
            self.fetcher.release_handle(handle);
        }
    }

    /// Exact-match membership check, then fetch and mark.
    async fn preload_window(
        &self,
        id: &TrackId,
        metadata: &AudioMetadata,
        range: ByteRange,
    ) -> Result<()> {
        if self.tracker.has_preloaded(id, range) {
            debug!(range = %range.key(), "Preload window already resident");
            return Ok(());
        }
        self.fetcher.fetch_range(id, range, metadata).await?;
        self.tracker.mark_preloaded(id, range);
        Ok(())
    }

    fn initial_window(&self, metadata: &AudioMetadata) -> Option<ByteRange> {
        let mut len = self.config.initial_preload_bytes;
        if metadata.total_size_bytes > 0 {
            len = len.min(metadata.total_size_bytes);
        }
        ByteRange::prefix(len)
    }

    /// Byte window centered on the seek target's approximate offset.
    ///
    /// Degrades to `None` (no byte math, no NaN) when duration or size is
    /// unknown.
    fn seek_window(
        &self,
        metadata: &AudioMetadata,
        target: Duration,
        duration: Duration,
    ) -> Option<ByteRange> {
        if duration.is_zero() || metadata.total_size_bytes == 0 {
            return None;
        }
        let fraction = target.as_secs_f64() / duration.as_secs_f64();
        let offset = (fraction * metadata.total_size_bytes as f64) as u64;
        let last = metadata.total_size_bytes - 1;

        let start = offset.saturating_sub(self.config.seek_preload_before_bytes);
        let end = offset
            .saturating_add(self.config.seek_preload_after_bytes)
            .min(last);
        ByteRange::new(start.min(end), end).ok()
    }
}
