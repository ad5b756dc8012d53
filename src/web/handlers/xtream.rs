//! Xtream Codes compatible endpoints
//!
//! `player_api.php`, `xmltv.php` and `/live/...` authenticate with the
//! user's XC password and read the plugin settings per request.

use std::convert::Infallible;

use axum::{
    Json,
    body::Body,
    extract::{Path, Query, State},
    http::{HeaderMap, Response, StatusCode, header},
    response::IntoResponse,
};
use bytes::Bytes;
use chrono::{Duration, Utc};
use futures::stream;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::errors::{TimeshiftError, TimeshiftResult};
use crate::models::User;
use crate::proxy::UpstreamRequest;
use crate::timeshift::Diagnostics;
use crate::timeshift::resolver::{DEFAULT_ARCHIVE_RETENTION_DAYS, authenticate};
use crate::web::AppState;
use crate::xtream::live::{resolve_live_stream, strip_extension};
use crate::xtream::player_api::{
    EpgRequest, LoginResponse, PlayerApiQuery, epg_listings, live_streams,
};
use crate::xtream::xmltv::{render_xmltv, rewrite_stream};

async fn authenticate_query(
    state: &AppState,
    username: Option<&str>,
    password: Option<&str>,
) -> TimeshiftResult<User> {
    match (username, password) {
        (Some(username), Some(password)) => {
            authenticate(state.timeshift.users(), username, password).await
        }
        _ => Err(TimeshiftError::auth_failed(username.unwrap_or_default())),
    }
}

/// `GET /player_api.php`
pub async fn player_api(
    State(state): State<AppState>,
    Query(query): Query<PlayerApiQuery>,
) -> Response<Body> {
    match player_api_inner(&state, &query).await {
        Ok(response) => response,
        Err(e) => {
            warn!(
                "player_api action={} failed: {}",
                query.action.as_deref().unwrap_or("login"),
                e
            );
            e.into_response()
        }
    }
}

async fn player_api_inner(
    state: &AppState,
    query: &PlayerApiQuery,
) -> TimeshiftResult<Response<Body>> {
    let user =
        authenticate_query(state, query.username.as_deref(), query.password.as_deref()).await?;
    let config = state.timeshift.load_config().await?;
    let catalog = state.timeshift.catalog();

    let response = match query.action.as_deref() {
        None | Some("") => Json(LoginResponse::new(
            &user,
            query.password.as_deref().unwrap_or_default(),
            &config,
            Utc::now(),
        ))
        .into_response(),
        Some("get_live_streams") => {
            Json(live_streams(catalog, &user, query.category(), config.enabled).await?)
                .into_response()
        }
        Some(action @ ("get_simple_data_table" | "get_short_epg")) => {
            let stream_id = query
                .stream_id
                .as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .ok_or_else(|| TimeshiftError::not_found(""))?;
            let request = if action == "get_short_epg" {
                EpgRequest::Short(query.short_limit())
            } else {
                EpgRequest::Full
            };
            Json(
                epg_listings(
                    catalog,
                    state.timeshift.epg(),
                    &user,
                    stream_id,
                    request,
                    &config,
                    Utc::now(),
                )
                .await?,
            )
            .into_response()
        }
        Some(other) => {
            debug!("Unsupported player_api action '{}'", other);
            Json(serde_json::json!([])).into_response()
        }
    };
    Ok(response)
}

/// `GET /live/{username}/{password}/{stream}`
pub async fn live_stream(
    State(state): State<AppState>,
    Path((username, password, stream)): Path<(String, String, String)>,
    headers: HeaderMap,
) -> Response<Body> {
    match live_stream_inner(&state, &username, &password, &stream, &headers).await {
        Ok(response) => response,
        Err(e) => {
            warn!("Live stream {} failed: {}", stream, e);
            e.into_response()
        }
    }
}

async fn live_stream_inner(
    state: &AppState,
    username: &str,
    password: &str,
    stream: &str,
    headers: &HeaderMap,
) -> TimeshiftResult<Response<Body>> {
    let user = authenticate(state.timeshift.users(), username, password).await?;
    let config = state.timeshift.load_config().await?;
    let diagnostics = Diagnostics::new(config.debug_mode);

    let target = resolve_live_stream(
        state.timeshift.catalog(),
        &user,
        strip_extension(stream),
        config.enabled,
        &diagnostics,
    )
    .await?;

    let request = UpstreamRequest::from_client_headers(headers, target.user_agent());
    state.timeshift.proxy().proxy(&target.url, &request).await
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct XmltvQuery {
    pub username: Option<String>,
    pub password: Option<String>,
}

/// `GET /xmltv.php`
pub async fn xmltv(
    State(state): State<AppState>,
    Query(query): Query<XmltvQuery>,
) -> Response<Body> {
    match xmltv_inner(&state, &query).await {
        Ok(response) => response,
        Err(e) => {
            warn!("XMLTV export failed: {}", e);
            e.into_response()
        }
    }
}

async fn xmltv_inner(state: &AppState, query: &XmltvQuery) -> TimeshiftResult<Response<Body>> {
    let user =
        authenticate_query(state, query.username.as_deref(), query.password.as_deref()).await?;
    let config = state.timeshift.load_config().await?;

    let since = Utc::now() - Duration::days(DEFAULT_ARCHIVE_RETENTION_DAYS);
    let fragments = render_xmltv(
        state.timeshift.catalog(),
        state.timeshift.epg(),
        &user,
        since,
    )
    .await?;
    let chunks = stream::iter(
        fragments
            .into_iter()
            .map(|fragment| Ok::<Bytes, Infallible>(Bytes::from(fragment))),
    );

    let body = if config.enabled {
        Body::from_stream(rewrite_stream(chunks, config.provider_timezone))
    } else {
        Body::from_stream(chunks)
    };

    Ok((
        StatusCode::OK,
        [(header::CONTENT_TYPE, "application/xml; charset=utf-8")],
        body,
    )
        .into_response())
}
