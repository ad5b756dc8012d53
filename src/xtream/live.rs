//! Live playback by provider stream id
//!
//! `/live/{username}/{password}/{id}.{ext}` accepts the provider id that
//! `get_live_streams` advertised, falling back to internal channel ids.
//! The first-priority stream's URL is proxied with the account's
//! User-Agent.

use tracing::{debug, warn};

use super::{ChannelMatch, locate_channel};
use crate::errors::{TimeshiftError, TimeshiftResult};
use crate::models::{AccountType, Channel, M3uAccount, Stream, User};
use crate::repositories::ChannelCatalog;
use crate::timeshift::Diagnostics;

/// Resolved live playback target
#[derive(Debug, Clone, PartialEq)]
pub struct LiveTarget {
    pub channel: Channel,
    pub stream: Stream,
    pub url: String,
    pub account: Option<M3uAccount>,
}

impl LiveTarget {
    pub fn user_agent(&self) -> Option<String> {
        self.account.as_ref().and_then(|a| a.user_agent.clone())
    }
}

/// Strip a trailing `.ext` from a path segment
pub fn strip_extension(segment: &str) -> &str {
    match segment.rsplit_once('.') {
        Some((id, _)) if !id.is_empty() => id,
        _ => segment,
    }
}

/// Resolve `id` to a playable stream for `user`
pub async fn resolve_live_stream(
    catalog: &dyn ChannelCatalog,
    user: &User,
    id: &str,
    provider_ids: bool,
    diagnostics: &Diagnostics,
) -> TimeshiftResult<LiveTarget> {
    let Some(found) = locate_channel(catalog, user, id, provider_ids).await? else {
        warn!("Live: no channel for stream id {}", id);
        if diagnostics.is_verbose() {
            log_not_found_details(catalog, user, id, diagnostics).await?;
        }
        return Err(TimeshiftError::not_found(id));
    };

    if let ChannelMatch::Provider(channel) = &found {
        debug!("Live: provider id {} -> channel '{}' ({})", id, channel.name, channel.id);
    }
    let channel = found.into_channel();

    let Some(stream) = catalog.ordered_streams(&channel).await?.into_iter().next() else {
        warn!("Live: channel '{}' has no streams", channel.name);
        return Err(TimeshiftError::not_found(id));
    };
    let Some(url) = stream.url.clone().filter(|u| !u.trim().is_empty()) else {
        warn!("Live: stream {} of channel '{}' has no URL", stream.id, channel.name);
        return Err(TimeshiftError::not_found(id));
    };
    let account = catalog.get_account(stream.m3u_account_id).await?;

    diagnostics.step(
        "live",
        format!(
            "stream id {} -> channel '{}' via stream {}",
            id, channel.name, stream.id
        ),
    );

    Ok(LiveTarget {
        channel,
        stream,
        url,
        account,
    })
}

async fn log_not_found_details(
    catalog: &dyn ChannelCatalog,
    user: &User,
    id: &str,
    diagnostics: &Diagnostics,
) -> TimeshiftResult<()> {
    let xc_total = catalog
        .count_streams_by_account_type(AccountType::Xc)
        .await?;
    diagnostics.step("live", format!("{xc_total} XC streams in catalog"));

    let Ok(numeric) = id.trim().parse::<i64>() else {
        diagnostics.step("live", format!("id '{id}' is not numeric"));
        return Ok(());
    };

    for stream in catalog.find_streams_by_provider_id(numeric, None).await? {
        let account_type = catalog
            .get_account(stream.m3u_account_id)
            .await?
            .map(|a| a.account_type.to_string())
            .unwrap_or_else(|| "missing".into());
        let channels = catalog.channels_for_stream(stream.id).await?.len();
        diagnostics.step(
            "live",
            format!(
                "stream {} carries provider id {} under a {} account, attached to {} channels",
                stream.id, numeric, account_type, channels
            ),
        );
    }

    if let Some(channel) = catalog.get_channel(numeric).await? {
        diagnostics.step(
            "live",
            format!(
                "internal channel '{}' exists with level {}, user '{}' has level {}",
                channel.name, channel.user_level, user.username, user.user_level
            ),
        );
    }
    Ok(())
}
