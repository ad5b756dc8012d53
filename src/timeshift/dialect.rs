//! Provider URL dialects and per-account negotiation
//!
//! Dialect A: `{server}/streaming/timeshift.php?username=..&password=..&stream=..&start=..&duration=..`
//! Dialect B: `{server}/timeshift/{username}/{password}/{duration}/{start}/{stream}.ts`
//!
//! In `auto` mode an account starts unknown and is tried with A, falling
//! back to B once on HTTP 400. The outcome is remembered per account for
//! the life of the process. Explicit `A`, `B` and `custom` settings bypass
//! the cache entirely.

use std::collections::HashMap;
use std::sync::{Arc, LazyLock};

use regex::Regex;
use reqwest::StatusCode;
use tokio::sync::Mutex;
use tracing::info;

use super::diagnostics::Diagnostics;
use crate::config::{PluginConfig, UrlDialect};
use crate::errors::{TimeshiftError, TimeshiftResult};
use crate::models::{Dialect, M3uAccount, PlaybackWindow};
use crate::proxy::{StreamProxy, UpstreamRequest};
use crate::utils::url::UrlUtils;

static PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{([A-Za-z_]+)\}").expect("placeholder pattern is valid"));

/// Values substituted into a provider URL
#[derive(Debug, Clone, Copy)]
pub struct UrlParts<'a> {
    pub server_url: &'a str,
    pub username: &'a str,
    pub password: &'a str,
    pub stream_id: &'a str,
    pub timestamp: &'a str,
    pub duration: u32,
}

impl<'a> UrlParts<'a> {
    pub fn new(
        account: &'a M3uAccount,
        provider_id: &'a str,
        timestamp: &'a str,
        window: &PlaybackWindow,
    ) -> Self {
        Self {
            server_url: account.base_url(),
            username: &account.username,
            password: &account.password,
            stream_id: provider_id,
            timestamp,
            duration: window.duration_minutes,
        }
    }
}

/// Build the URL for a fixed dialect
pub fn build_url(dialect: Dialect, parts: &UrlParts<'_>) -> String {
    let server = parts.server_url.trim_end_matches('/');
    match dialect {
        Dialect::A => format!(
            "{}/streaming/timeshift.php?username={}&password={}&stream={}&start={}&duration={}",
            server, parts.username, parts.password, parts.stream_id, parts.timestamp, parts.duration
        ),
        Dialect::B => format!(
            "{}/timeshift/{}/{}/{}/{}/{}.ts",
            server, parts.username, parts.password, parts.duration, parts.timestamp, parts.stream_id
        ),
    }
}

/// Substitute placeholders into a custom template.
///
/// Unknown placeholders are a configuration error.
pub fn render_custom(template: &str, parts: &UrlParts<'_>) -> TimeshiftResult<String> {
    if let Some(unknown) = PLACEHOLDER
        .captures_iter(template)
        .map(|c| c[1].to_string())
        .find(|name| lookup_placeholder(name, parts).is_none())
    {
        return Err(TimeshiftError::config(format!(
            "Unknown placeholder {{{unknown}}} in custom_template"
        )));
    }

    Ok(PLACEHOLDER
        .replace_all(template, |caps: &regex::Captures<'_>| {
            lookup_placeholder(&caps[1], parts).unwrap_or_default()
        })
        .into_owned())
}

fn lookup_placeholder(name: &str, parts: &UrlParts<'_>) -> Option<String> {
    match name {
        "server_url" => Some(parts.server_url.trim_end_matches('/').to_string()),
        "username" => Some(parts.username.to_string()),
        "password" => Some(parts.password.to_string()),
        "stream_id" => Some(parts.stream_id.to_string()),
        "timestamp" => Some(parts.timestamp.to_string()),
        "duration" => Some(parts.duration.to_string()),
        _ => None,
    }
}

/// Process-local memo of the dialect that works for each account
#[derive(Clone, Default)]
pub struct DialectCache {
    inner: Arc<Mutex<HashMap<i64, Dialect>>>,
}

impl DialectCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, account_id: i64) -> Option<Dialect> {
        self.inner.lock().await.get(&account_id).copied()
    }

    /// Last write wins
    pub async fn record(&self, account_id: i64, dialect: Dialect) {
        self.inner.lock().await.insert(account_id, dialect);
    }

    pub async fn len(&self) -> usize {
        self.inner.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.lock().await.is_empty()
    }
}

/// Which URLs a request will try
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UrlPlan {
    /// Configured dialect or cached B; no fallback, no cache update
    Fixed { url: String, label: String },
    /// Auto mode: A first, B once on 400
    Negotiate { primary: String, fallback: String },
}

/// Decide the URLs for one request
pub fn plan_urls(
    config: &PluginConfig,
    cached: Option<Dialect>,
    parts: &UrlParts<'_>,
) -> TimeshiftResult<UrlPlan> {
    match config.url_dialect {
        UrlDialect::A => Ok(UrlPlan::Fixed {
            url: build_url(Dialect::A, parts),
            label: "A (configured)".into(),
        }),
        UrlDialect::B => Ok(UrlPlan::Fixed {
            url: build_url(Dialect::B, parts),
            label: "B (configured)".into(),
        }),
        UrlDialect::Custom => {
            let template = config.custom_template.as_deref().ok_or_else(|| {
                TimeshiftError::config("URL dialect 'custom' requires a custom_template")
            })?;
            Ok(UrlPlan::Fixed {
                url: render_custom(template, parts)?,
                label: "custom".into(),
            })
        }
        UrlDialect::Auto => match cached {
            Some(Dialect::B) => Ok(UrlPlan::Fixed {
                url: build_url(Dialect::B, parts),
                label: "B (cached)".into(),
            }),
            _ => Ok(UrlPlan::Negotiate {
                primary: build_url(Dialect::A, parts),
                fallback: build_url(Dialect::B, parts),
            }),
        },
    }
}

/// Runs a [`UrlPlan`] against the provider
#[derive(Clone)]
pub struct DialectNegotiator {
    cache: DialectCache,
}

impl DialectNegotiator {
    pub fn new(cache: DialectCache) -> Self {
        Self { cache }
    }

    pub fn cache(&self) -> &DialectCache {
        &self.cache
    }

    /// Open the upstream stream for `account`, negotiating the dialect when
    /// the settings ask for auto detection.
    ///
    /// Returns a response with a success status; anything else is an error.
    pub async fn open(
        &self,
        proxy: &StreamProxy,
        config: &PluginConfig,
        account: &M3uAccount,
        parts: &UrlParts<'_>,
        request: &UpstreamRequest,
        diagnostics: &Diagnostics,
    ) -> TimeshiftResult<reqwest::Response> {
        let cached = match config.url_dialect {
            UrlDialect::Auto => self.cache.get(account.id).await,
            _ => None,
        };

        match plan_urls(config, cached, parts)? {
            UrlPlan::Fixed { url, label } => {
                diagnostics.step(
                    "dialect",
                    format!(
                        "using {} for account {}: {}",
                        label,
                        account.id,
                        UrlUtils::obfuscate_credentials(&url)
                    ),
                );
                let response = proxy.open(&url, request).await?;
                diagnostics.step("upstream", format!("status {}", response.status().as_u16()));
                if !response.status().is_success() {
                    return Err(proxy.upstream_error(response).await);
                }
                Ok(response)
            }
            UrlPlan::Negotiate { primary, fallback } => {
                diagnostics.step(
                    "dialect",
                    format!(
                        "trying A for account {}: {}",
                        account.id,
                        UrlUtils::obfuscate_credentials(&primary)
                    ),
                );
                let response = proxy.open(&primary, request).await?;
                let status = response.status();
                diagnostics.step("upstream", format!("dialect A status {}", status.as_u16()));

                if status != StatusCode::BAD_REQUEST {
                    self.cache.record(account.id, Dialect::A).await;
                    if !status.is_success() {
                        return Err(proxy.upstream_error(response).await);
                    }
                    return Ok(response);
                }

                drop(response);
                info!("Dialect A returned 400 for account {}, trying dialect B", account.id);
                diagnostics.step(
                    "dialect",
                    format!(
                        "falling back to B: {}",
                        UrlUtils::obfuscate_credentials(&fallback)
                    ),
                );
                let response = proxy.open(&fallback, request).await?;
                let status = response.status();
                diagnostics.step("upstream", format!("dialect B status {}", status.as_u16()));
                if !status.is_success() {
                    return Err(proxy.upstream_error(response).await);
                }
                self.cache.record(account.id, Dialect::B).await;
                info!("Dialect B works for account {}, caching preference", account.id);
                Ok(response)
            }
        }
    }
}
