//! Catch-up (timeshift) request handling
//!
//! A catch-up request flows through five stages:
//!
//! 1. [`interceptor`] recognises the `/timeshift/...` path shape
//! 2. [`resolver`] authenticates the user and resolves the provider stream id
//!    to an eligible channel, stream and XC account
//! 3. [`window`] converts the UTC start to provider-local time and derives the
//!    duration from the EPG
//! 4. [`dialect`] builds the provider URL, negotiating A/B per account
//! 5. [`crate::proxy::StreamProxy`] relays the provider response
//!
//! # Usage
//!
//! ```rust,ignore
//! let service = TimeshiftService::new(catalog.clone(), catalog.clone(), catalog, settings, proxy);
//! let config = service.load_config().await?;
//! let response = service.handle(request, &headers, &config).await?;
//! ```

pub mod diagnostics;
pub mod dialect;
pub mod interceptor;
pub mod resolver;
pub mod window;

use std::sync::Arc;

use axum::body::Body;
use axum::http::{HeaderMap, Response};
use tracing::{info, warn};

pub use diagnostics::Diagnostics;
pub use dialect::{DialectCache, DialectNegotiator, UrlParts};
pub use interceptor::match_catchup_path;

use crate::config::{Config, PluginConfig};
use crate::errors::{AppResult, TimeshiftResult};
use crate::models::CatchupRequest;
use crate::proxy::{StreamProxy, UpstreamRequest};
use crate::repositories::{
    ChannelCatalog, EpgRepository, FileSettingsStore, InMemoryCatalog, SettingsStore,
    UserRepository,
};
use crate::utils::time::format_catchup_timestamp;

/// Catch-up pipeline over the host's repositories
#[derive(Clone)]
pub struct TimeshiftService {
    catalog: Arc<dyn ChannelCatalog>,
    epg: Arc<dyn EpgRepository>,
    users: Arc<dyn UserRepository>,
    settings: Arc<dyn SettingsStore>,
    negotiator: DialectNegotiator,
    proxy: StreamProxy,
}

impl TimeshiftService {
    pub fn new(
        catalog: Arc<dyn ChannelCatalog>,
        epg: Arc<dyn EpgRepository>,
        users: Arc<dyn UserRepository>,
        settings: Arc<dyn SettingsStore>,
        proxy: StreamProxy,
    ) -> Self {
        Self {
            catalog,
            epg,
            users,
            settings,
            negotiator: DialectNegotiator::new(DialectCache::new()),
            proxy,
        }
    }

    /// Wire the standalone service from its config file: the JSON catalog
    /// snapshot, the TOML settings file and the upstream client.
    pub async fn from_config(config: &Config) -> AppResult<Self> {
        let catalog =
            Arc::new(InMemoryCatalog::load_from_file(&config.storage.catalog_path).await?);
        let settings = Arc::new(FileSettingsStore::new(config.storage.settings_path.clone()));
        info!(
            "Plugin settings read per request from {}",
            config.storage.settings_path.display()
        );

        let proxy = StreamProxy::new(&config.upstream)?;
        info!(
            "Upstream client ready: connect_timeout={:?}, idle_read_timeout={:?}, chunk_size={}",
            config.upstream.connect_timeout,
            config.upstream.idle_read_timeout,
            config.upstream.effective_chunk_size()
        );

        Ok(Self::new(
            catalog.clone(),
            catalog.clone(),
            catalog,
            settings,
            proxy,
        ))
    }

    pub fn catalog(&self) -> &dyn ChannelCatalog {
        self.catalog.as_ref()
    }

    pub fn epg(&self) -> &dyn EpgRepository {
        self.epg.as_ref()
    }

    pub fn users(&self) -> &dyn UserRepository {
        self.users.as_ref()
    }

    pub fn proxy(&self) -> &StreamProxy {
        &self.proxy
    }

    pub fn dialect_cache(&self) -> &DialectCache {
        self.negotiator.cache()
    }

    /// Read and validate the current plugin settings
    pub async fn load_config(&self) -> TimeshiftResult<PluginConfig> {
        let raw = self.settings.load().await?;
        PluginConfig::from_raw(&raw)
    }

    /// Serve one catch-up request
    ///
    /// Failures are logged once here; the caller only renders them.
    pub async fn handle(
        &self,
        request: CatchupRequest,
        headers: &HeaderMap,
        config: &PluginConfig,
    ) -> TimeshiftResult<Response<Body>> {
        let diagnostics = Diagnostics::new(config.debug_mode);
        let mut channel = None;
        let result = self
            .run(&request, headers, config, &diagnostics, &mut channel)
            .await;
        if let Err(e) = &result {
            let channel = channel.as_deref().or(e.channel()).unwrap_or("unresolved");
            warn!(
                stream_id = %request.provider_stream_id,
                error_kind = e.kind(),
                "Timeshift failed for channel '{}' (stream {}) at {} UTC: {}",
                channel,
                request.provider_stream_id,
                format_catchup_timestamp(&request.requested_at),
                e
            );
        }
        result
    }

    async fn run(
        &self,
        request: &CatchupRequest,
        headers: &HeaderMap,
        config: &PluginConfig,
        diagnostics: &Diagnostics,
        channel: &mut Option<String>,
    ) -> TimeshiftResult<Response<Body>> {
        diagnostics.step(
            "request",
            format!(
                "user '{}' stream {} at {} UTC (epg channel {} ignored)",
                request.username,
                request.provider_stream_id,
                format_catchup_timestamp(&request.requested_at),
                request.epg_channel_number
            ),
        );

        let user =
            resolver::authenticate(self.users(), &request.username, &request.password).await?;
        let identity = resolver::resolve_identity(
            self.catalog(),
            &user,
            &request.provider_stream_id,
            diagnostics,
        )
        .await?;
        *channel = Some(identity.channel.name.clone());

        let window = window::compute_window(
            self.epg(),
            identity.internal_id,
            request.requested_at,
            config.provider_timezone,
            diagnostics,
        )
        .await;

        let timestamp = window.timestamp();
        let parts = UrlParts::new(&identity.account, &identity.provider_id, &timestamp, &window);
        let upstream_request =
            UpstreamRequest::from_client_headers(headers, identity.account.user_agent.clone());

        let response = self
            .negotiator
            .open(
                &self.proxy,
                config,
                &identity.account,
                &parts,
                &upstream_request,
                diagnostics,
            )
            .await?;

        self.proxy.relay(response)
    }
}
