//! Centralized error handling for the timeshift proxy
//!
//! This module unifies error types across the service and provides
//! consistent error reporting for both the catch-up pipeline and the
//! surrounding host integration.
//!
//! # Error Categories
//!
//! - **Application Errors**: startup failures (catalog snapshot, HTTP client)
//! - **Repository Errors**: catalog, EPG, user and settings lookups
//! - **Timeshift Errors**: the per-request catch-up taxonomy surfaced to clients
//!
//! # Usage
//!
//! ```rust
//! use xc_timeshift::errors::{TimeshiftError, TimeshiftResult};
//!
//! fn resolve(stream_id: &str) -> TimeshiftResult<u32> {
//!     stream_id.parse().map_err(|_| TimeshiftError::not_found(stream_id))
//! }
//! ```

pub mod types;

pub use types::*;

/// Convenience type alias for Results using AppError
pub type AppResult<T> = Result<T, AppError>;

/// Convenience type alias for Repository Results
pub type RepositoryResult<T> = Result<T, RepositoryError>;

/// Convenience type alias for catch-up request Results
pub type TimeshiftResult<T> = Result<T, TimeshiftError>;
