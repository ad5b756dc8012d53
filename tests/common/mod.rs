//! Shared harness: an in-process mock provider and a fully wired app

#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::{
    Router,
    body::Body,
    extract::{Request, State},
    http::{HeaderMap, Method, Response, StatusCode, header},
    response::IntoResponse,
};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use tokio::sync::Notify;
use serde_json::{Value, json};
use tower::ServiceExt;

use xc_timeshift::{
    config::{Config, RawPluginSettings},
    proxy::StreamProxy,
    repositories::{CatalogSnapshot, InMemoryCatalog, StaticSettingsStore},
    timeshift::TimeshiftService,
    web::{AppState, create_app},
};

pub const CATCHUP_PATH: &str = "/timeshift/john/secret123/155/2025-01-15:14-30/22371.ts";

/// One request as seen by the provider
#[derive(Debug, Clone)]
pub struct Recorded {
    pub uri: String,
    pub range: Option<String>,
    pub user_agent: Option<String>,
}

#[derive(Clone)]
struct MockState {
    requests: Arc<Mutex<Vec<Recorded>>>,
    dialect_a_status: StatusCode,
    dialect_b_status: StatusCode,
}

/// Provider answering both dialects, custom templates and live URLs
pub struct MockProvider {
    pub base_url: String,
    requests: Arc<Mutex<Vec<Recorded>>>,
}

impl MockProvider {
    pub async fn start() -> Self {
        Self::start_with(StatusCode::OK, StatusCode::OK).await
    }

    pub async fn start_with(dialect_a_status: StatusCode, dialect_b_status: StatusCode) -> Self {
        let requests = Arc::new(Mutex::new(Vec::new()));
        let state = MockState {
            requests: requests.clone(),
            dialect_a_status,
            dialect_b_status,
        };
        let app = Router::new().fallback(provider).with_state(state);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url: format!("http://{addr}"),
            requests,
        }
    }

    pub fn requests(&self) -> Vec<Recorded> {
        self.requests.lock().unwrap().clone()
    }

    pub fn uris(&self) -> Vec<String> {
        self.requests().into_iter().map(|r| r.uri).collect()
    }
}

async fn provider(State(state): State<MockState>, request: Request) -> Response<Body> {
    let uri = request
        .uri()
        .path_and_query()
        .map(|p| p.to_string())
        .unwrap_or_default();
    let headers = request.headers();
    let range = header_string(headers, header::RANGE);
    state.requests.lock().unwrap().push(Recorded {
        uri: uri.clone(),
        range: range.clone(),
        user_agent: header_string(headers, header::USER_AGENT),
    });

    let (status, body) = if uri.starts_with("/streaming/timeshift.php") {
        (state.dialect_a_status, "A-MEDIA")
    } else if uri.starts_with("/timeshift/") {
        (state.dialect_b_status, "B-MEDIA")
    } else if uri.starts_with("/catchup/") {
        (StatusCode::OK, "CUSTOM-MEDIA")
    } else if uri.starts_with("/live/") {
        (StatusCode::OK, "LIVE-MEDIA")
    } else {
        (StatusCode::NOT_FOUND, "missing")
    };

    if !status.is_success() {
        return (status, "provider rejected request").into_response();
    }

    match range {
        Some(range) if range.starts_with("bytes=1000-") => Response::builder()
            .status(StatusCode::PARTIAL_CONTENT)
            .header(header::CONTENT_TYPE, "video/mp2t")
            .header(header::CONTENT_RANGE, "bytes 1000-1006/5000")
            .header(header::ACCEPT_RANGES, "bytes")
            .body(Body::from(body))
            .unwrap(),
        _ => Response::builder()
            .status(StatusCode::OK)
            .header(header::CONTENT_TYPE, "video/mp2t")
            .body(Body::from(body))
            .unwrap(),
    }
}

/// Base URL of a local port nothing listens on
pub fn closed_base_url() -> String {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    format!("http://{}", listener.local_addr().unwrap())
}

/// Provider that accepts connections and never answers
pub struct SilentProvider {
    pub base_url: String,
}

impl SilentProvider {
    pub async fn start() -> Self {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                held.push(socket);
            }
        });
        Self {
            base_url: format!("http://{addr}"),
        }
    }
}

/// Provider streaming an endless transport stream on every path
pub struct EndlessProvider {
    pub base_url: String,
    /// Notified once the provider drops its response body
    pub closed: Arc<Notify>,
}

struct NotifyOnDrop(Arc<Notify>);

impl Drop for NotifyOnDrop {
    fn drop(&mut self) {
        self.0.notify_one();
    }
}

impl EndlessProvider {
    pub async fn start() -> Self {
        let closed = Arc::new(Notify::new());
        let app = Router::new()
            .fallback(endless_body)
            .with_state(closed.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url: format!("http://{addr}"),
            closed,
        }
    }
}

async fn endless_body(State(closed): State<Arc<Notify>>) -> Response<Body> {
    let guard = NotifyOnDrop(closed);
    let stream = async_stream::stream! {
        let _guard = guard;
        loop {
            yield Ok::<Bytes, std::io::Error>(Bytes::from_static(&[0x47; 188]));
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    };
    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "video/mp2t")
        .body(Body::from_stream(stream))
        .unwrap()
}

fn header_string(headers: &HeaderMap, name: header::HeaderName) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(String::from)
}

/// Catalog with one archive channel on an XC account pointing at `base_url`
pub fn snapshot(base_url: &str, programs: Value) -> CatalogSnapshot {
    serde_json::from_value(json!({
        "accounts": [
            {"id": 1, "name": "provider", "account_type": "XC", "server_url": format!("{base_url}/"),
             "username": "acc_user", "password": "acc_pass", "user_agent": "TiviMate/4.7"},
            {"id": 2, "name": "playlist", "account_type": "STD", "server_url": "http://m3u.example"}
        ],
        "streams": [
            {"id": 10, "name": "BBC One HD", "m3u_account_id": 1,
             "url": format!("{base_url}/live/acc_user/acc_pass/22371.ts"),
             "custom_properties": {"stream_id": "22371", "tv_archive": 1, "tv_archive_duration": 7,
                                   "epg_channel_id": "bbc1.uk"}},
            {"id": 11, "name": "Local News", "m3u_account_id": 2,
             "url": "http://m3u.example/news.ts",
             "custom_properties": {"stream_id": 900, "tv_archive": 1}}
        ],
        "channels": [
            {"id": 100, "name": "BBC One", "channel_number": 1.0, "tvg_id": "bbc1.uk",
             "category_id": 1, "streams": [10]},
            {"id": 101, "name": "Local News", "channel_number": 2.0, "category_id": 2, "streams": [11]}
        ],
        "users": [
            {"id": 1, "username": "john", "user_level": 1,
             "custom_properties": {"xc_password": "secret123"}}
        ],
        "programs": programs
    }))
    .unwrap()
}

/// The single programme the catch-up scenario relies on
pub fn scenario_programs() -> Value {
    json!([
        {"id": 1, "channel_id": 100, "title": "Morning News",
         "start_time": "2025-01-15T14:30:00Z", "end_time": "2025-01-15T15:15:00Z"}
    ])
}

pub fn programme(id: i64, channel_id: i64, title: &str, start: DateTime<Utc>, end: DateTime<Utc>) -> Value {
    json!({"id": id, "channel_id": channel_id, "title": title,
           "start_time": start.to_rfc3339(), "end_time": end.to_rfc3339()})
}

pub fn settings(timezone: &str, url_dialect: &str) -> RawPluginSettings {
    RawPluginSettings {
        timezone: timezone.to_string(),
        url_dialect: url_dialect.to_string(),
        ..RawPluginSettings::default()
    }
}

pub struct TestApp {
    pub app: Router,
    pub service: Arc<TimeshiftService>,
    pub settings: StaticSettingsStore,
}

pub fn build_app(snapshot: CatalogSnapshot, settings: RawPluginSettings) -> TestApp {
    build_app_with(snapshot, settings, Config::default())
}

pub fn build_app_with(
    snapshot: CatalogSnapshot,
    settings: RawPluginSettings,
    config: Config,
) -> TestApp {
    let catalog = Arc::new(InMemoryCatalog::new(snapshot));
    let settings_store = StaticSettingsStore::new(settings);
    let proxy = StreamProxy::new(&config.upstream).unwrap();
    let service = Arc::new(TimeshiftService::new(
        catalog.clone(),
        catalog.clone(),
        catalog,
        Arc::new(settings_store.clone()),
        proxy,
    ));
    let app = create_app(AppState::new(config, service.clone()));
    TestApp {
        app,
        service,
        settings: settings_store,
    }
}

pub async fn get(app: &Router, uri: &str) -> (StatusCode, HeaderMap, Vec<u8>) {
    send(app, Method::GET, uri, &[]).await
}

pub async fn send(
    app: &Router,
    method: Method,
    uri: &str,
    headers: &[(&str, &str)],
) -> (StatusCode, HeaderMap, Vec<u8>) {
    let mut builder = axum::http::Request::builder().method(method).uri(uri);
    for (name, value) in headers {
        builder = builder.header(*name, *value);
    }
    let response = app
        .clone()
        .oneshot(builder.body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap()
        .to_vec();
    (status, headers, body)
}

pub fn json_body(body: &[u8]) -> Value {
    serde_json::from_slice(body).unwrap_or(Value::Null)
}
