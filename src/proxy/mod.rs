//! Upstream streaming

pub mod http_stream;

pub use http_stream::{StreamProxy, UpstreamRequest};
