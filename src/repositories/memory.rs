//! In-memory catalog backed by a JSON snapshot
//!
//! The snapshot is what a host export looks like: accounts, streams,
//! channels (with ordered stream ids), users and EPG programmes. Lookups
//! keep snapshot order so results are deterministic.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use tracing::info;

use super::traits::{ChannelCatalog, EpgRepository, UserRepository};
use crate::errors::{RepositoryError, RepositoryResult};
use crate::models::{AccountType, Channel, M3uAccount, Program, Stream, User};

/// Serialized catalog contents
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CatalogSnapshot {
    #[serde(default)]
    pub accounts: Vec<M3uAccount>,
    #[serde(default)]
    pub streams: Vec<Stream>,
    #[serde(default)]
    pub channels: Vec<Channel>,
    #[serde(default)]
    pub users: Vec<User>,
    #[serde(default)]
    pub programs: Vec<Program>,
}

impl CatalogSnapshot {
    /// Check that every stream and channel reference resolves
    pub fn validate(&self) -> RepositoryResult<()> {
        for stream in &self.streams {
            if !self.accounts.iter().any(|a| a.id == stream.m3u_account_id) {
                return Err(RepositoryError::RecordNotFound {
                    table: "accounts".into(),
                    field: "id".into(),
                    value: stream.m3u_account_id.to_string(),
                });
            }
        }
        for channel in &self.channels {
            for stream_id in &channel.streams {
                if !self.streams.iter().any(|s| s.id == *stream_id) {
                    return Err(RepositoryError::RecordNotFound {
                        table: "streams".into(),
                        field: "id".into(),
                        value: stream_id.to_string(),
                    });
                }
            }
        }
        Ok(())
    }
}

/// Catalog, EPG and user repository over a shared snapshot
#[derive(Clone, Default)]
pub struct InMemoryCatalog {
    snapshot: Arc<CatalogSnapshot>,
}

impl InMemoryCatalog {
    pub fn new(snapshot: CatalogSnapshot) -> Self {
        Self {
            snapshot: Arc::new(snapshot),
        }
    }

    /// Load and validate a snapshot file; a missing file yields an empty catalog
    pub async fn load_from_file(path: &Path) -> RepositoryResult<Self> {
        if !path.exists() {
            info!("Catalog file {} not found, starting empty", path.display());
            return Ok(Self::default());
        }
        let contents =
            tokio::fs::read_to_string(path)
                .await
                .map_err(|e| RepositoryError::ReadFailed {
                    path: path.display().to_string(),
                    message: e.to_string(),
                })?;
        let snapshot: CatalogSnapshot = serde_json::from_str(&contents)?;
        snapshot.validate()?;
        info!(
            "Loaded catalog from {}: {} accounts, {} streams, {} channels, {} users, {} programs",
            path.display(),
            snapshot.accounts.len(),
            snapshot.streams.len(),
            snapshot.channels.len(),
            snapshot.users.len(),
            snapshot.programs.len()
        );
        Ok(Self::new(snapshot))
    }

}

#[async_trait]
impl ChannelCatalog for InMemoryCatalog {
    async fn find_streams_by_provider_id(
        &self,
        provider_id: i64,
        account_type: Option<AccountType>,
    ) -> RepositoryResult<Vec<Stream>> {
        let snapshot = &self.snapshot;
        let matches = snapshot
            .streams
            .iter()
            .filter(|s| s.custom_properties.stream_id == Some(provider_id))
            .filter(|s| match account_type {
                Some(wanted) => snapshot
                    .accounts
                    .iter()
                    .any(|a| a.id == s.m3u_account_id && a.account_type == wanted),
                None => true,
            })
            .cloned()
            .collect();
        Ok(matches)
    }

    async fn get_channel(&self, id: i64) -> RepositoryResult<Option<Channel>> {
        let snapshot = &self.snapshot;
        Ok(snapshot.channels.iter().find(|c| c.id == id).cloned())
    }

    async fn get_stream(&self, id: i64) -> RepositoryResult<Option<Stream>> {
        let snapshot = &self.snapshot;
        Ok(snapshot.streams.iter().find(|s| s.id == id).cloned())
    }

    async fn get_account(&self, id: i64) -> RepositoryResult<Option<M3uAccount>> {
        let snapshot = &self.snapshot;
        Ok(snapshot.accounts.iter().find(|a| a.id == id).cloned())
    }

    async fn channels_for_stream(&self, stream_id: i64) -> RepositoryResult<Vec<Channel>> {
        let snapshot = &self.snapshot;
        Ok(snapshot
            .channels
            .iter()
            .filter(|c| c.streams.contains(&stream_id))
            .cloned()
            .collect())
    }

    async fn list_channels(&self) -> RepositoryResult<Vec<Channel>> {
        Ok(self.snapshot.channels.clone())
    }

    async fn count_streams_by_account_type(
        &self,
        account_type: AccountType,
    ) -> RepositoryResult<usize> {
        let snapshot = &self.snapshot;
        Ok(snapshot
            .streams
            .iter()
            .filter(|s| {
                snapshot
                    .accounts
                    .iter()
                    .any(|a| a.id == s.m3u_account_id && a.account_type == account_type)
            })
            .count())
    }
}

#[async_trait]
impl EpgRepository for InMemoryCatalog {
    async fn program_at(
        &self,
        channel_id: i64,
        instant: DateTime<Utc>,
    ) -> RepositoryResult<Option<Program>> {
        let snapshot = &self.snapshot;
        Ok(snapshot
            .programs
            .iter()
            .filter(|p| p.channel_id == channel_id && p.covers(instant))
            .min_by_key(|p| p.start_time)
            .cloned())
    }

    async fn programs_since(
        &self,
        channel_id: i64,
        from: DateTime<Utc>,
    ) -> RepositoryResult<Vec<Program>> {
        let snapshot = &self.snapshot;
        let mut programs: Vec<Program> = snapshot
            .programs
            .iter()
            .filter(|p| p.channel_id == channel_id && p.start_time >= from)
            .cloned()
            .collect();
        programs.sort_by_key(|p| p.start_time);
        Ok(programs)
    }
}

#[async_trait]
impl UserRepository for InMemoryCatalog {
    async fn find_by_username(&self, username: &str) -> RepositoryResult<Option<User>> {
        let snapshot = &self.snapshot;
        Ok(snapshot.users.iter().find(|u| u.username == username).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn snapshot() -> CatalogSnapshot {
        serde_json::from_value(json!({
            "accounts": [
                {"id": 1, "name": "xc", "account_type": "XC", "server_url": "http://xc.example"},
                {"id": 2, "name": "m3u", "account_type": "STD", "server_url": "http://m3u.example"}
            ],
            "streams": [
                {"id": 10, "name": "BBC XC", "m3u_account_id": 1,
                 "custom_properties": {"stream_id": "22371", "tv_archive": 1}},
                {"id": 11, "name": "BBC STD", "m3u_account_id": 2,
                 "custom_properties": {"stream_id": 22371}}
            ],
            "channels": [
                {"id": 100, "name": "BBC One", "streams": [10, 11]},
                {"id": 101, "name": "BBC One HD", "streams": [10]}
            ],
            "users": [
                {"id": 1, "username": "john", "custom_properties": {"xc_password": "secret123"}}
            ],
            "programs": [
                {"id": 2, "channel_id": 100, "title": "Later",
                 "start_time": "2025-01-15T15:15:00Z", "end_time": "2025-01-15T16:00:00Z"},
                {"id": 1, "channel_id": 100, "title": "News",
                 "start_time": "2025-01-15T14:30:00Z", "end_time": "2025-01-15T15:15:00Z"}
            ]
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn test_provider_lookup_filters_account_type() {
        let catalog = InMemoryCatalog::new(snapshot());
        let xc = catalog
            .find_streams_by_provider_id(22371, Some(AccountType::Xc))
            .await
            .unwrap();
        assert_eq!(xc.len(), 1);
        assert_eq!(xc[0].id, 10);

        let any = catalog.find_streams_by_provider_id(22371, None).await.unwrap();
        assert_eq!(any.len(), 2);
    }

    #[tokio::test]
    async fn test_channels_for_stream_keeps_order() {
        let catalog = InMemoryCatalog::new(snapshot());
        let channels = catalog.channels_for_stream(10).await.unwrap();
        let ids: Vec<i64> = channels.iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![100, 101]);
    }

    #[tokio::test]
    async fn test_ordered_streams() {
        let catalog = InMemoryCatalog::new(snapshot());
        let channel = catalog.get_channel(100).await.unwrap().unwrap();
        let streams = catalog.ordered_streams(&channel).await.unwrap();
        assert_eq!(streams.iter().map(|s| s.id).collect::<Vec<_>>(), vec![10, 11]);
    }

    #[tokio::test]
    async fn test_program_lookup() {
        let catalog = InMemoryCatalog::new(snapshot());
        let at = "2025-01-15T14:30:00Z".parse().unwrap();
        let program = catalog.program_at(100, at).await.unwrap().unwrap();
        assert_eq!(program.title, "News");

        let since = catalog.programs_since(100, at).await.unwrap();
        assert_eq!(since.iter().map(|p| p.id).collect::<Vec<_>>(), vec![1, 2]);

        let none = catalog
            .program_at(100, "2025-01-15T18:00:00Z".parse().unwrap())
            .await
            .unwrap();
        assert!(none.is_none());
    }

    #[tokio::test]
    async fn test_count_streams_by_account_type() {
        let catalog = InMemoryCatalog::new(snapshot());
        assert_eq!(
            catalog
                .count_streams_by_account_type(AccountType::Xc)
                .await
                .unwrap(),
            1
        );
    }

    #[tokio::test]
    async fn test_load_rejects_dangling_references() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("catalog.json");
        let mut broken = snapshot();
        broken.channels[0].streams.push(999);
        std::fs::write(&path, serde_json::to_string(&broken).unwrap()).unwrap();
        let err = InMemoryCatalog::load_from_file(&path).await.err().unwrap();
        assert!(matches!(err, RepositoryError::RecordNotFound { .. }));
    }

    #[tokio::test]
    async fn test_load_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let catalog = InMemoryCatalog::load_from_file(&dir.path().join("none.json"))
            .await
            .unwrap();
        assert!(catalog.list_channels().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("catalog.json");
        std::fs::write(&path, serde_json::to_string(&snapshot()).unwrap()).unwrap();
        let catalog = InMemoryCatalog::load_from_file(&path).await.unwrap();
        let user = catalog.find_by_username("john").await.unwrap().unwrap();
        assert_eq!(user.custom_properties.xc_password.as_deref(), Some("secret123"));
    }
}
