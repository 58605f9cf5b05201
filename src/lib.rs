//! Workspace facade crate.
//!
//! This crate exists to expose shared feature flags that map to the individual
//! workspace crates (e.g., `core-streaming`, `bridge-desktop`). Host
//! applications can depend on `rill-workspace` and enable the documented
//! features without needing to wire each crate individually.

pub use bridge_traits;
pub use core_streaming;

#[cfg(feature = "native-http")]
pub use bridge_desktop;

/// Build the native HTTP range client from a streaming configuration.
///
/// Threads `config.request_timeout` into the transport so the configured
/// boundary timeout is the one the client enforces.
#[cfg(feature = "native-http")]
pub fn native_range_client(
    config: &core_streaming::StreamingConfig,
) -> bridge_traits::Result<bridge_desktop::ReqwestRangeClient> {
    bridge_desktop::ReqwestRangeClient::with_timeout(config.request_timeout)
}
