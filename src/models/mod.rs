//! Catalog data model
//!
//! These records mirror what the host aggregation service keeps for
//! provider accounts, streams, channels, users and EPG programs. They are
//! loaded from a catalog snapshot and only ever read by the catch-up engine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

pub mod catchup;

pub use catchup::{CatchupRequest, Dialect, PlaybackWindow, StreamIdentity};

/// Kind of upstream account a stream was synced from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
pub enum AccountType {
    /// Xtream Codes provider, the only type with catch-up support
    #[serde(rename = "XC")]
    #[strum(serialize = "XC")]
    Xc,
    /// Plain M3U playlist
    #[serde(rename = "STD")]
    #[strum(serialize = "STD")]
    Std,
}

/// Upstream provider account
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct M3uAccount {
    pub id: i64,
    pub name: String,
    pub account_type: AccountType,
    pub server_url: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub user_agent: Option<String>,
}

impl M3uAccount {
    /// Server URL without trailing slashes
    pub fn base_url(&self) -> &str {
        self.server_url.trim_end_matches('/')
    }
}

/// Per-stream properties captured during provider sync
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StreamProperties {
    /// Provider-assigned stream id
    #[serde(
        default,
        deserialize_with = "deserialize_string_or_int_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub stream_id: Option<i64>,
    /// Catch-up archive flag, reported as 0/1, "0"/"1" or a boolean
    #[serde(default, deserialize_with = "deserialize_archive_flag")]
    pub tv_archive: bool,
    /// Archive retention in days
    #[serde(
        default,
        deserialize_with = "deserialize_string_or_int_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub tv_archive_duration: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub epg_channel_id: Option<String>,
}

/// A playable stream synced from an upstream account
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stream {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub url: Option<String>,
    pub m3u_account_id: i64,
    #[serde(default)]
    pub custom_properties: StreamProperties,
}

/// A channel as exposed to clients
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Channel {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub channel_number: Option<f64>,
    #[serde(default)]
    pub user_level: i32,
    #[serde(default)]
    pub tvg_id: Option<String>,
    #[serde(default)]
    pub category_id: Option<i64>,
    #[serde(default)]
    pub logo_url: Option<String>,
    /// Backing stream ids in priority order
    #[serde(default)]
    pub streams: Vec<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserProperties {
    #[serde(default)]
    pub xc_password: Option<String>,
}

/// A client user of the Xtream-compatible endpoints
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub username: String,
    #[serde(default)]
    pub user_level: i32,
    #[serde(default)]
    pub custom_properties: UserProperties,
}

impl User {
    /// Level at which channel visibility filters no longer apply
    pub const ADMIN_LEVEL: i32 = 10;

    pub fn is_admin(&self) -> bool {
        self.user_level >= Self::ADMIN_LEVEL
    }

    pub fn can_access(&self, channel: &Channel) -> bool {
        self.user_level >= channel.user_level
    }
}

/// EPG programme, times stored in UTC
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Program {
    pub id: i64,
    pub channel_id: i64,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
}

impl Program {
    /// Whether `instant` falls inside `[start, end)`
    pub fn covers(&self, instant: DateTime<Utc>) -> bool {
        self.start_time <= instant && instant < self.end_time
    }
}

fn deserialize_string_or_int_option<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::de::{self, Unexpected, Visitor};

    struct StringOrIntOptionVisitor;

    impl<'de> Visitor<'de> for StringOrIntOptionVisitor {
        type Value = Option<i64>;

        fn expecting(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
            formatter.write_str("a string, integer, or null")
        }

        fn visit_none<E>(self) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(None)
        }

        fn visit_unit<E>(self) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(None)
        }

        fn visit_some<D>(self, deserializer: D) -> Result<Self::Value, D::Error>
        where
            D: serde::Deserializer<'de>,
        {
            deserializer.deserialize_any(self)
        }

        fn visit_i64<E>(self, value: i64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(Some(value))
        }

        fn visit_u64<E>(self, value: u64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            i64::try_from(value)
                .map(Some)
                .map_err(|_| E::invalid_value(Unexpected::Unsigned(value), &self))
        }

        fn visit_str<E>(self, value: &str) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            let trimmed = value.trim();
            if trimmed.is_empty() {
                return Ok(None);
            }
            trimmed
                .parse()
                .map(Some)
                .map_err(|_| E::invalid_value(Unexpected::Str(value), &self))
        }
    }

    deserializer.deserialize_option(StringOrIntOptionVisitor)
}

fn deserialize_archive_flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::de::{self, Visitor};

    struct ArchiveFlagVisitor;

    impl<'de> Visitor<'de> for ArchiveFlagVisitor {
        type Value = bool;

        fn expecting(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
            formatter.write_str("0, 1, \"0\", \"1\", a boolean, or null")
        }

        fn visit_bool<E>(self, value: bool) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(value)
        }

        fn visit_i64<E>(self, value: i64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(value == 1)
        }

        fn visit_u64<E>(self, value: u64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(value == 1)
        }

        fn visit_str<E>(self, value: &str) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(value.trim() == "1")
        }

        fn visit_unit<E>(self) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(false)
        }

        fn visit_none<E>(self) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(false)
        }

        fn visit_some<D>(self, deserializer: D) -> Result<Self::Value, D::Error>
        where
            D: serde::Deserializer<'de>,
        {
            deserializer.deserialize_any(self)
        }
    }

    deserializer.deserialize_any(ArchiveFlagVisitor)
}
