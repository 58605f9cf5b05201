//! # Bridge Traits
//!
//! Platform boundary abstractions for the streaming playback core.
//!
//! The core never talks to the network or to a native audio engine directly.
//! Instead it is handed implementations of the traits defined here:
//!
//! - [`http::RangeHttpClient`]: the network range-fetch boundary. Given a
//!   resource URL and an optional byte range, it returns a response whose
//!   status distinguishes full success, partial success, and failure.
//! - [`player::AudioOutput`]: the native audio playback primitive. Load a
//!   streamable handle URL, play/pause, volume, cursor position, and the
//!   event feed (duration known, end of playback, runtime error).
//!
//! Host applications provide concrete implementations that satisfy their
//! platform constraints (desktop, mobile, web).

pub mod error;
pub mod http;
pub mod player;

pub use error::{BridgeError, Result};
pub use http::{ByteRange, RangeHttpClient, RangeResponse};
pub use player::{AudioOutput, HandleId, PlayerEvent};
