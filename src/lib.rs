//! Catch-up (timeshift) request resolution and streaming proxy for Xtream
//! Codes providers.
//!
//! Clients request `/timeshift/{user}/{pass}/{epg_channel}/{YYYY-MM-DD:HH-MM}/{stream_id}.ts`
//! in UTC; the proxy resolves the provider stream, converts the start to the
//! provider's local time, picks the provider's URL dialect and relays the
//! recording.

pub mod config;
pub mod errors;
pub mod models;
pub mod proxy;
pub mod repositories;
pub mod timeshift;
pub mod utils;
pub mod web;
pub mod xtream;
