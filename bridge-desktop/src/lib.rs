//! Desktop bridge implementations.
//!
//! Native implementations of the `bridge-traits` boundaries for desktop
//! hosts. Currently this covers the HTTP range-fetch boundary; hosts supply
//! their own [`bridge_traits::player::AudioOutput`] wired to the platform
//! audio engine.

pub mod http;

pub use http::ReqwestRangeClient;
