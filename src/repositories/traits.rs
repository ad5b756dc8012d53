//! Repository trait definitions
//!
//! These traits are the boundary between the catch-up engine and the host
//! that owns channels, EPG data, users and settings. The engine never talks
//! to storage directly, so any host can plug in by implementing them.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::config::RawPluginSettings;
use crate::errors::RepositoryResult;
use crate::models::{AccountType, Channel, M3uAccount, Program, Stream, User};

/// Read access to channels, their backing streams and upstream accounts
///
/// # Examples
///
/// ```rust,ignore
/// async fn first_stream<C: ChannelCatalog>(catalog: &C, channel: &Channel) -> RepositoryResult<Option<Stream>> {
///     Ok(catalog.ordered_streams(channel).await?.into_iter().next())
/// }
/// ```
#[async_trait]
pub trait ChannelCatalog: Send + Sync {
    /// Find streams whose provider-assigned id equals `provider_id`
    ///
    /// # Arguments
    ///
    /// * `provider_id` - Id as seen by the upstream provider
    /// * `account_type` - Restrict to streams of this account type, or any when `None`
    ///
    /// # Returns
    ///
    /// * `Ok(Vec<Stream>)` - Matching streams in catalog order (may be empty)
    /// * `Err(RepositoryError)` - Storage failure
    async fn find_streams_by_provider_id(
        &self,
        provider_id: i64,
        account_type: Option<AccountType>,
    ) -> RepositoryResult<Vec<Stream>>;

    /// Find a channel by its internal id
    async fn get_channel(&self, id: i64) -> RepositoryResult<Option<Channel>>;

    /// Find a stream by its internal id
    async fn get_stream(&self, id: i64) -> RepositoryResult<Option<Stream>>;

    /// Find an upstream account by id
    async fn get_account(&self, id: i64) -> RepositoryResult<Option<M3uAccount>>;

    /// Channels that list `stream_id` among their backing streams, in catalog order
    async fn channels_for_stream(&self, stream_id: i64) -> RepositoryResult<Vec<Channel>>;

    /// All channels in catalog order
    async fn list_channels(&self) -> RepositoryResult<Vec<Channel>>;

    /// Number of streams belonging to accounts of `account_type`
    async fn count_streams_by_account_type(
        &self,
        account_type: AccountType,
    ) -> RepositoryResult<usize>;

    /// Backing streams of `channel` in priority order
    ///
    /// Ids that no longer resolve to a stream are skipped.
    async fn ordered_streams(&self, channel: &Channel) -> RepositoryResult<Vec<Stream>> {
        let mut streams = Vec::with_capacity(channel.streams.len());
        for id in &channel.streams {
            if let Some(stream) = self.get_stream(*id).await? {
                streams.push(stream);
            }
        }
        Ok(streams)
    }
}

/// Read access to EPG programmes
#[async_trait]
pub trait EpgRepository: Send + Sync {
    /// Programme on `channel_id` covering `instant`, if any
    async fn program_at(
        &self,
        channel_id: i64,
        instant: DateTime<Utc>,
    ) -> RepositoryResult<Option<Program>>;

    /// Programmes on `channel_id` starting at or after `from`, ordered by start
    async fn programs_since(
        &self,
        channel_id: i64,
        from: DateTime<Utc>,
    ) -> RepositoryResult<Vec<Program>>;
}

/// Read access to client users
#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn find_by_username(&self, username: &str) -> RepositoryResult<Option<User>>;
}

/// Persisted plugin settings
///
/// Implementations are read on every request so operator edits apply
/// without a restart.
#[async_trait]
pub trait SettingsStore: Send + Sync {
    async fn load(&self) -> RepositoryResult<RawPluginSettings>;
}
