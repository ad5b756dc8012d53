//! Request-scoped values of the catch-up pipeline

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use super::{Channel, M3uAccount, Stream};
use crate::utils::time::format_catchup_timestamp;

/// Fields extracted from an intercepted `/timeshift/...` path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatchupRequest {
    pub username: String,
    pub password: String,
    /// Client-side EPG channel number; never used for lookup
    pub epg_channel_number: String,
    /// Requested start, always UTC at minute precision
    pub requested_at: DateTime<Utc>,
    /// Provider-visible stream id, the only lookup key
    pub provider_stream_id: String,
    pub extension: String,
}

/// Namespace in which the requested id was found
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "snake_case")]
pub enum IdNamespace {
    Provider,
    Internal,
}

/// Resolved channel with its first-priority stream and upstream account
#[derive(Debug, Clone, PartialEq)]
pub struct StreamIdentity {
    /// Internal channel id
    pub internal_id: i64,
    /// Stream id sent to the provider
    pub provider_id: String,
    pub archive_enabled: bool,
    pub archive_retention_days: i64,
    pub matched_by: IdNamespace,
    pub channel: Channel,
    pub stream: Stream,
    pub account: M3uAccount,
}

/// Absolute window requested from the provider
#[derive(Debug, Clone, PartialEq)]
pub struct PlaybackWindow {
    pub start_local: DateTime<Tz>,
    pub duration_minutes: u32,
}

impl PlaybackWindow {
    /// Start formatted as `YYYY-MM-DD:HH-MM` in provider-local time
    pub fn timestamp(&self) -> String {
        format_catchup_timestamp(&self.start_local)
    }
}

/// Negotiable provider URL shapes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
pub enum Dialect {
    /// `streaming/timeshift.php` query form
    A,
    /// `/timeshift/...` path form
    B,
}
