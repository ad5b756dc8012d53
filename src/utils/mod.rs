//! Shared helpers for time conversion and URL handling

pub mod time;
pub mod url;
