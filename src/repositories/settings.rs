//! Plugin settings stores

use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

use super::traits::SettingsStore;
use crate::config::RawPluginSettings;
use crate::errors::{RepositoryError, RepositoryResult};

/// Settings persisted as a TOML file, re-read on every load
#[derive(Debug, Clone)]
pub struct FileSettingsStore {
    path: PathBuf,
}

impl FileSettingsStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }
}

#[async_trait]
impl SettingsStore for FileSettingsStore {
    async fn load(&self) -> RepositoryResult<RawPluginSettings> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(contents) => Ok(toml::from_str(&contents)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(
                    "Settings file {} not found, using defaults",
                    self.path.display()
                );
                Ok(RawPluginSettings::default())
            }
            Err(e) => Err(RepositoryError::ReadFailed {
                path: self.path.display().to_string(),
                message: e.to_string(),
            }),
        }
    }
}

/// Settings held in memory, replaceable at runtime
#[derive(Debug, Clone, Default)]
pub struct StaticSettingsStore {
    settings: Arc<RwLock<RawPluginSettings>>,
}

impl StaticSettingsStore {
    pub fn new(settings: RawPluginSettings) -> Self {
        Self {
            settings: Arc::new(RwLock::new(settings)),
        }
    }

    pub async fn set(&self, settings: RawPluginSettings) {
        *self.settings.write().await = settings;
    }
}

#[async_trait]
impl SettingsStore for StaticSettingsStore {
    async fn load(&self) -> RepositoryResult<RawPluginSettings> {
        Ok(self.settings.read().await.clone())
    }
}
