//! Error type definitions for the timeshift proxy
//!
//! This module defines all error types used throughout the service,
//! providing a hierarchical error system that makes debugging and error
//! handling more straightforward.

use axum::http::StatusCode;
use thiserror::Error;

/// Top-level application error type
///
/// Covers failures while wiring the service at startup: reading the catalog
/// snapshot and building the upstream HTTP client.
#[derive(Error, Debug)]
pub enum AppError {
    /// Repository layer errors
    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),

    /// HTTP client errors
    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Repository layer specific errors
#[derive(Error, Debug)]
pub enum RepositoryError {
    /// Backing file could not be read
    #[error("Failed to read {path}: {message}")]
    ReadFailed { path: String, message: String },

    /// Data serialization/deserialization failures
    #[error("Serialization failed: {0}")]
    SerializationFailed(#[from] serde_json::Error),

    /// Settings file could not be parsed
    #[error("Settings parse failed: {0}")]
    SettingsParse(#[from] toml::de::Error),

    /// Snapshot references a record that does not exist
    #[error("Record not found: {table} with {field} = {value}")]
    RecordNotFound {
        table: String,
        field: String,
        value: String,
    },
}

/// Catch-up request failures
///
/// Each variant maps onto exactly one client-facing HTTP status; see
/// [`TimeshiftError::status_code`]. The `kind` string is carried in the JSON
/// error body so clients can branch without parsing messages.
#[derive(Error, Debug, strum::IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum TimeshiftError {
    /// Unknown user, missing XC password or password mismatch
    #[error("Authentication failed for user '{username}'")]
    AuthFailed { username: String },

    /// Neither the provider nor the internal namespace knows the id
    #[error("No channel found for stream id {stream_id}")]
    NotFound { stream_id: String },

    /// First-priority stream is not an Xtream Codes stream
    #[error("Channel '{channel}' is served by a {account_type} account, not XC")]
    WrongAccountType {
        channel: String,
        account_type: String,
    },

    /// First-priority stream has no catch-up archive
    #[error("Channel '{channel}' does not support catch-up")]
    ArchiveUnsupported { channel: String },

    /// User level below the channel level
    #[error(
        "User '{username}' (level {user_level}) may not access channel '{channel}' (level {required_level})"
    )]
    AccessDenied {
        username: String,
        channel: String,
        user_level: i32,
        required_level: i32,
    },

    /// Provider answered with a non-success status
    #[error("Upstream responded with status {status}")]
    UpstreamError { status: u16, body: String },

    /// Provider could not be reached or stalled
    #[error("Upstream unavailable: {message}")]
    UpstreamUnavailable { message: String, timed_out: bool },

    /// Invalid settings at use time
    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    /// Catalog or settings lookup failed
    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),
}

impl TimeshiftError {
    pub fn not_found<S: ToString>(stream_id: S) -> Self {
        Self::NotFound {
            stream_id: stream_id.to_string(),
        }
    }

    pub fn auth_failed<S: Into<String>>(username: S) -> Self {
        Self::AuthFailed {
            username: username.into(),
        }
    }

    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::ConfigError {
            message: message.into(),
        }
    }

    /// Classify a reqwest failure as unavailable, keeping the timeout flag.
    ///
    /// The request URL is stripped from the message: provider URLs carry
    /// account credentials and this text reaches clients and logs.
    pub fn unavailable(error: reqwest::Error) -> Self {
        let timed_out = error.is_timeout();
        let error = error.without_url();
        let message = match std::error::Error::source(&error) {
            Some(source) => format!("{error}: {source}"),
            None => error.to_string(),
        };
        Self::UpstreamUnavailable { message, timed_out }
    }

    /// Channel named by an eligibility failure
    pub fn channel(&self) -> Option<&str> {
        match self {
            Self::WrongAccountType { channel, .. }
            | Self::ArchiveUnsupported { channel }
            | Self::AccessDenied { channel, .. } => Some(channel.as_str()),
            _ => None,
        }
    }

    /// Stable snake_case identifier for the variant
    pub fn kind(&self) -> &'static str {
        self.into()
    }

    /// HTTP status the client receives for this failure
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::AuthFailed { .. } => StatusCode::UNAUTHORIZED,
            Self::NotFound { .. } => StatusCode::NOT_FOUND,
            Self::WrongAccountType { .. } | Self::ArchiveUnsupported { .. } => {
                StatusCode::BAD_REQUEST
            }
            Self::AccessDenied { .. } => StatusCode::FORBIDDEN,
            Self::UpstreamError { status, .. } => {
                StatusCode::from_u16(*status).unwrap_or(StatusCode::BAD_GATEWAY)
            }
            Self::UpstreamUnavailable { timed_out, .. } => {
                if *timed_out {
                    StatusCode::GATEWAY_TIMEOUT
                } else {
                    StatusCode::BAD_GATEWAY
                }
            }
            Self::ConfigError { .. } | Self::Repository(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}
