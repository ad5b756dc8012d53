//! Xtream Codes compatible client surfaces
//!
//! Clients that learned provider stream ids from `get_live_streams` send the
//! same ids back for live playback, EPG listings and catch-up. The helpers
//! here resolve those ids the same way the catch-up resolver does:
//! provider namespace first, internal channel id second.

pub mod live;
pub mod player_api;
pub mod xmltv;

use crate::errors::TimeshiftResult;
use crate::models::{Channel, User};
use crate::repositories::ChannelCatalog;
use crate::timeshift::resolver::{find_channel_by_internal_id, find_channel_by_provider_id};

/// Where a client-supplied id was found
#[derive(Debug, Clone, PartialEq)]
pub enum ChannelMatch {
    Provider(Channel),
    Internal(Channel),
}

impl ChannelMatch {
    pub fn channel(&self) -> &Channel {
        match self {
            Self::Provider(c) | Self::Internal(c) => c,
        }
    }

    pub fn into_channel(self) -> Channel {
        match self {
            Self::Provider(c) | Self::Internal(c) => c,
        }
    }
}

/// Locate a channel for `id` on behalf of `user`
///
/// With `provider_ids` off only internal ids are considered. Internal hits
/// are subject to the user's level; admins see everything.
pub async fn locate_channel(
    catalog: &dyn ChannelCatalog,
    user: &User,
    id: &str,
    provider_ids: bool,
) -> TimeshiftResult<Option<ChannelMatch>> {
    if provider_ids
        && let Some((channel, _)) = find_channel_by_provider_id(catalog, id).await?
    {
        return Ok(Some(ChannelMatch::Provider(channel)));
    }

    Ok(find_channel_by_internal_id(catalog, id)
        .await?
        .filter(|channel| user.is_admin() || user.can_access(channel))
        .map(ChannelMatch::Internal))
}
