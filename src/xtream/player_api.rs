//! `player_api.php` payloads
//!
//! Live stream listings advertise the provider's stream id and archive
//! flags so clients build catch-up URLs the interceptor can resolve. EPG
//! listings for archive channels reach back over the retention window and
//! flag programmes that can be replayed.
//!
//! Field types follow what Xtream clients expect: ids and unix timestamps
//! as strings, `now_playing` and `has_archive` as integers.

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::locate_channel;
use crate::config::PluginConfig;
use crate::errors::{TimeshiftError, TimeshiftResult};
use crate::models::{Channel, Program, StreamProperties, User};
use crate::repositories::{ChannelCatalog, EpgRepository};
use crate::timeshift::resolver::DEFAULT_ARCHIVE_RETENTION_DAYS;
use crate::utils::time::format_for_display;

/// Default entry count for `get_short_epg`
pub const DEFAULT_SHORT_EPG_LIMIT: usize = 4;

/// Query parameters accepted by `player_api.php`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PlayerApiQuery {
    pub username: Option<String>,
    pub password: Option<String>,
    pub action: Option<String>,
    pub category_id: Option<String>,
    pub stream_id: Option<String>,
    pub limit: Option<String>,
}

impl PlayerApiQuery {
    pub fn category(&self) -> Option<i64> {
        self.category_id.as_deref().and_then(|c| c.trim().parse().ok())
    }

    pub fn short_limit(&self) -> usize {
        self.limit
            .as_deref()
            .and_then(|l| l.trim().parse().ok())
            .unwrap_or(DEFAULT_SHORT_EPG_LIMIT)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserInfo {
    pub username: String,
    pub password: String,
    pub message: String,
    pub auth: u8,
    pub status: String,
    pub allowed_output_formats: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerInfo {
    pub server_protocol: String,
    pub timezone: String,
    pub timestamp_now: i64,
    pub time_now: String,
}

/// Response to a bare authenticated `player_api.php` call
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginResponse {
    pub user_info: UserInfo,
    pub server_info: ServerInfo,
}

impl LoginResponse {
    pub fn new(user: &User, password: &str, config: &PluginConfig, now: DateTime<Utc>) -> Self {
        Self {
            user_info: UserInfo {
                username: user.username.clone(),
                password: password.to_string(),
                message: String::new(),
                auth: 1,
                status: "Active".into(),
                allowed_output_formats: vec!["ts".into(), "m3u8".into()],
            },
            server_info: ServerInfo {
                server_protocol: "http".into(),
                timezone: config.provider_timezone.name().to_string(),
                timestamp_now: now.timestamp(),
                time_now: format_for_display(now, config.provider_timezone),
            },
        }
    }
}

/// One `get_live_streams` entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiveStreamEntry {
    pub num: i64,
    pub name: String,
    pub stream_type: String,
    pub stream_id: i64,
    pub stream_icon: String,
    pub epg_channel_id: Option<String>,
    pub category_id: Option<String>,
    pub tv_archive: u8,
    pub tv_archive_duration: i64,
    pub direct_source: String,
}

/// Channels visible to `user`, optionally within one category
///
/// With `enrich` the first-priority stream's archive flags and provider id
/// replace the internal values.
pub async fn live_streams(
    catalog: &dyn ChannelCatalog,
    user: &User,
    category_id: Option<i64>,
    enrich: bool,
) -> TimeshiftResult<Vec<LiveStreamEntry>> {
    let channels: Vec<Channel> = catalog
        .list_channels()
        .await?
        .into_iter()
        .filter(|c| user.is_admin() || user.can_access(c))
        .filter(|c| category_id.is_none() || c.category_id == category_id)
        .collect();

    let mut entries = Vec::with_capacity(channels.len());
    let mut archive_count = 0;
    for (index, channel) in channels.into_iter().enumerate() {
        let mut entry = LiveStreamEntry {
            num: channel
                .channel_number
                .map(|n| n as i64)
                .unwrap_or(index as i64 + 1),
            name: channel.name.clone(),
            stream_type: "live".into(),
            stream_id: channel.id,
            stream_icon: channel.logo_url.clone().unwrap_or_default(),
            epg_channel_id: channel.tvg_id.clone(),
            category_id: channel.category_id.map(|c| c.to_string()),
            tv_archive: 0,
            tv_archive_duration: 0,
            direct_source: String::new(),
        };

        if enrich {
            match catalog.ordered_streams(&channel).await?.into_iter().next() {
                Some(stream) => {
                    let props = &stream.custom_properties;
                    entry.tv_archive = u8::from(props.tv_archive);
                    entry.tv_archive_duration = props.tv_archive_duration.unwrap_or(0);
                    if let Some(provider_id) = props.stream_id {
                        entry.stream_id = provider_id;
                    }
                    if props.tv_archive {
                        archive_count += 1;
                    }
                }
                None => debug!("No streams for channel '{}' ({})", channel.name, channel.id),
            }
        }
        entries.push(entry);
    }

    if archive_count > 0 {
        info!(
            "Enhanced {}/{} channels with catch-up support",
            archive_count,
            entries.len()
        );
    }
    Ok(entries)
}

/// One EPG listing entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpgListing {
    pub id: String,
    pub epg_id: String,
    pub title: String,
    pub lang: String,
    pub start: String,
    pub end: String,
    pub description: String,
    pub channel_id: String,
    pub start_timestamp: String,
    pub stop_timestamp: String,
    pub stream_id: String,
    pub now_playing: u8,
    pub has_archive: u8,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EpgListings {
    pub epg_listings: Vec<EpgListing>,
}

/// Which EPG action was requested
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EpgRequest {
    /// `get_simple_data_table`
    Full,
    /// `get_short_epg` with a limit
    Short(usize),
}

/// Build EPG listings for the channel behind `stream_id`
pub async fn epg_listings(
    catalog: &dyn ChannelCatalog,
    epg: &dyn EpgRepository,
    user: &User,
    stream_id: &str,
    request: EpgRequest,
    config: &PluginConfig,
    now: DateTime<Utc>,
) -> TimeshiftResult<EpgListings> {
    let Some(found) = locate_channel(catalog, user, stream_id, config.enabled).await? else {
        warn!(
            "EPG: channel not found for stream_id={}, checked provider and internal ids",
            stream_id
        );
        return Err(TimeshiftError::not_found(stream_id));
    };
    let channel = found.into_channel();
    let props = catalog
        .ordered_streams(&channel)
        .await?
        .into_iter()
        .next()
        .map(|s| s.custom_properties)
        .unwrap_or_default();

    let builder = ListingBuilder {
        channel: &channel,
        props: &props,
        config,
        now,
    };

    if config.enabled && props.tv_archive && request == EpgRequest::Full {
        let retention = props
            .tv_archive_duration
            .unwrap_or(DEFAULT_ARCHIVE_RETENTION_DAYS);
        let programs = epg
            .programs_since(channel.id, now - Duration::days(retention))
            .await?;
        let listings: Vec<EpgListing> = programs
            .iter()
            .map(|p| builder.listing(p, Some(retention)))
            .collect();
        info!(
            "EPG: generated {} programmes for {} (past {} days)",
            listings.len(),
            channel.name,
            retention
        );
        return Ok(EpgListings {
            epg_listings: listings,
        });
    }

    let mut programs: Vec<Program> = Vec::new();
    if let Some(current) = epg.program_at(channel.id, now).await? {
        programs.push(current);
    }
    for program in epg.programs_since(channel.id, now).await? {
        if !programs.iter().any(|p| p.id == program.id) {
            programs.push(program);
        }
    }
    if let EpgRequest::Short(limit) = request {
        programs.truncate(limit);
    }

    Ok(EpgListings {
        epg_listings: programs.iter().map(|p| builder.listing(p, None)).collect(),
    })
}

struct ListingBuilder<'a> {
    channel: &'a Channel,
    props: &'a StreamProperties,
    config: &'a PluginConfig,
    now: DateTime<Utc>,
}

impl ListingBuilder<'_> {
    /// `retention` is set only for archive listings
    fn listing(&self, program: &Program, retention: Option<i64>) -> EpgListing {
        let tz = self.config.provider_timezone;
        let start = program.start_time;
        let end = program.end_time;
        let id = start.timestamp().to_string();

        let now_playing = u8::from(start <= self.now && end >= self.now);
        let has_archive = match retention {
            Some(days) if end < self.now && (self.now - end).num_days() <= days => 1,
            _ => 0,
        };

        EpgListing {
            epg_id: program.id.to_string(),
            title: BASE64.encode(program.title.as_bytes()),
            lang: self.config.epg_language.to_string(),
            start: format_for_display(start, tz),
            end: format_for_display(end, tz),
            description: BASE64.encode(program.description.as_deref().unwrap_or("").as_bytes()),
            channel_id: self
                .props
                .epg_channel_id
                .clone()
                .filter(|e| !e.is_empty())
                .unwrap_or_else(|| self.channel.id.to_string()),
            start_timestamp: id.clone(),
            stop_timestamp: end.timestamp().to_string(),
            stream_id: match (self.config.enabled, self.props.stream_id) {
                (true, Some(provider_id)) => provider_id.to_string(),
                _ => self.channel.id.to_string(),
            },
            now_playing,
            has_archive,
            id,
        }
    }
}
