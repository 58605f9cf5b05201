//! # Streaming Playback Core
//!
//! Progressive HTTP range-request streaming for large audio files.
//!
//! ## Overview
//!
//! This crate lets a client play a large remote file without downloading it
//! in full. It handles:
//! - Byte-range fetching with a full-fetch fallback for origins that do not
//!   honor ranges
//! - Session-scoped metadata caching with decode-or-estimate duration
//!   determination
//! - Duplicate-fetch suppression through a range presence cache
//! - The playback state machine: track switching, play/pause, seeking with
//!   a preload window around the target, volume, passive progress, and
//!   stale-response guarding
//!
//! The network and the native audio engine sit behind the `bridge-traits`
//! boundaries; hosts inject implementations.

pub mod config;
pub mod coordinator;
pub mod error;
pub mod fetch;
pub mod metadata;
pub mod preload;

pub use config::StreamingConfig;
pub use coordinator::{PlaybackCoordinator, PlaybackState, PlaybackStatus};
pub use error::{Result, StreamError};
pub use fetch::{FetchStats, RangeFetchClient, StreamingHandle};
pub use metadata::{AudioMetadata, DurationProbe, MetadataStore, TrackId};
pub use preload::RangePresenceTracker;

#[cfg(feature = "decoder")]
pub use metadata::SymphoniaDurationProbe;
