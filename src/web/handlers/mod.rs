//! HTTP request handlers
//!
//! Handlers stay thin: they authenticate, read settings and delegate to
//! the `timeshift` and `xtream` modules.

pub mod health;
pub mod xtream;
