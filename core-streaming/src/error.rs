//! # Streaming Error Types
//!
//! Error types for the range-streaming playback core.

use thiserror::Error;

/// Errors that can occur during streaming playback operations.
#[derive(Error, Debug)]
pub enum StreamError {
    // ========================================================================
    // Metadata Errors
    // ========================================================================
    /// Metadata probe failed: non-success status or unreachable network.
    #[error("Metadata fetch failed: {0}")]
    MetadataFetch(String),

    /// Duration could not be decoded from the fetched prefix.
    ///
    /// Recovered locally by the size/bitrate estimate; never surfaced as a
    /// user-visible error.
    #[error("Duration not decodable from prefix: {0}")]
    DurationUndecodable(String),

    // ========================================================================
    // Range Fetch Errors
    // ========================================================================
    /// Transport returned neither full nor partial success.
    ///
    /// `status` carries the observed HTTP status for diagnostics; 0 means the
    /// transport failed before producing a response.
    #[error("Range fetch failed with status {status}: {message}")]
    RangeFetch { status: u16, message: String },

    /// Requested byte range is malformed.
    #[error("Invalid byte range: {0}")]
    InvalidRange(String),

    // ========================================================================
    // Playback Control Errors
    // ========================================================================
    /// Native playback primitive reported a runtime failure.
    #[error("Playback failed: {0}")]
    Playback(String),

    /// Attempted operation when no track is loaded.
    #[error("No track loaded")]
    NoTrackLoaded,

    /// Track index outside the supplied track list.
    #[error("Track index {0} out of bounds")]
    TrackIndexOutOfBounds(usize),
}

impl StreamError {
    /// Returns `true` if this error is due to network issues.
    pub fn is_network_error(&self) -> bool {
        matches!(
            self,
            StreamError::MetadataFetch(_) | StreamError::RangeFetch { .. }
        )
    }

    /// Returns `true` if this error is recovered locally and never reaches
    /// the coordinator's `last_error`.
    pub fn is_recoverable_locally(&self) -> bool {
        matches!(self, StreamError::DurationUndecodable(_))
    }
}

/// Result type for streaming operations.
pub type Result<T> = std::result::Result<T, StreamError>;
