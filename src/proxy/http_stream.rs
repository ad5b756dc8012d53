//! Upstream HTTP stream proxy
//!
//! Shared by catch-up and live playback:
//!   - One pooled client with a connect timeout and no total timeout, so
//!     long recordings stay open.
//!   - `Range` is forwarded verbatim for seeking; status, `Content-Type`,
//!     `Content-Range`, `Content-Length` and `Accept-Ranges` are relayed.
//!   - The body is relayed in bounded chunks; a provider that goes silent for
//!     longer than the idle timeout terminates the stream.
//!   - Dropping the client body drops the upstream response, which releases
//!     the provider connection.

use std::time::Duration;

use axum::body::Body;
use axum::http::{HeaderMap, HeaderValue, Response, StatusCode, header};
use bytes::{Bytes, BytesMut};
use futures::{Stream, StreamExt};
use reqwest::Client;
use tracing::{debug, error, info, warn};

use crate::config::UpstreamConfig;
use crate::errors::{AppResult, TimeshiftError, TimeshiftResult};
use crate::utils::url::UrlUtils;

/// Content type assumed when the provider omits one
pub const DEFAULT_CONTENT_TYPE: &str = "video/mp2t";

/// Response headers copied from the provider besides `Content-Type`
const RELAYED_HEADERS: [header::HeaderName; 3] = [
    header::CONTENT_LENGTH,
    header::CONTENT_RANGE,
    header::ACCEPT_RANGES,
];

/// Per-request upstream parameters
#[derive(Debug, Clone, Default)]
pub struct UpstreamRequest {
    /// Client `Range` header, forwarded as-is
    pub range: Option<HeaderValue>,
    /// Account User-Agent, overrides the configured default
    pub user_agent: Option<String>,
}

impl UpstreamRequest {
    pub fn from_client_headers(headers: &HeaderMap, user_agent: Option<String>) -> Self {
        Self {
            range: headers.get(header::RANGE).cloned(),
            user_agent,
        }
    }
}

#[derive(Clone)]
pub struct StreamProxy {
    client: Client,
    idle_read_timeout: Duration,
    chunk_size: usize,
    error_body_preview: usize,
}

impl StreamProxy {
    pub fn new(config: &UpstreamConfig) -> AppResult<Self> {
        let client = Client::builder()
            .user_agent(config.user_agent.clone())
            .connect_timeout(config.connect_timeout)
            .pool_max_idle_per_host(8)
            .build()?;
        Ok(Self {
            client,
            idle_read_timeout: config.idle_read_timeout,
            chunk_size: config.effective_chunk_size(),
            error_body_preview: config.error_body_preview_bytes,
        })
    }

    /// Issue the upstream GET and wait for response headers.
    ///
    /// Any HTTP status is returned as-is; only transport failures and an
    /// idle provider are errors here.
    pub async fn open(
        &self,
        url: &str,
        request: &UpstreamRequest,
    ) -> TimeshiftResult<reqwest::Response> {
        let safe_url = UrlUtils::obfuscate_credentials(url);
        debug!("Opening upstream {}", safe_url);

        let mut builder = self.client.get(url);
        if let Some(ua) = request.user_agent.as_deref().filter(|ua| !ua.trim().is_empty()) {
            builder = builder.header(header::USER_AGENT, ua);
        }
        if let Some(range) = &request.range {
            debug!("Forwarding Range header: {:?}", range);
            builder = builder.header(header::RANGE, range.clone());
        }

        match tokio::time::timeout(self.idle_read_timeout, builder.send()).await {
            Ok(Ok(response)) => Ok(response),
            Ok(Err(e)) => {
                let err = TimeshiftError::unavailable(e);
                error!("Failed to connect to upstream {}: {}", safe_url, err);
                Err(err)
            }
            Err(_) => {
                error!(
                    "Upstream {} sent no response within {:?}",
                    safe_url, self.idle_read_timeout
                );
                Err(TimeshiftError::UpstreamUnavailable {
                    message: format!("no response within {:?}", self.idle_read_timeout),
                    timed_out: true,
                })
            }
        }
    }

    /// Consume a non-success response into an [`TimeshiftError::UpstreamError`]
    /// carrying a short body preview for operators.
    pub async fn upstream_error(&self, response: reqwest::Response) -> TimeshiftError {
        let status = response.status();
        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("unknown")
            .to_string();
        let body = self.read_preview(response).await;
        error!(
            "Provider error: status={}, content-type={}, body={}",
            status.as_u16(),
            content_type,
            if body.is_empty() { "empty" } else { body.as_str() }
        );
        TimeshiftError::UpstreamError {
            status: status.as_u16(),
            body,
        }
    }

    async fn read_preview(&self, response: reqwest::Response) -> String {
        let limit = self.error_body_preview;
        let mut buf = BytesMut::new();
        let mut stream = response.bytes_stream();
        while buf.len() < limit {
            match tokio::time::timeout(self.idle_read_timeout, stream.next()).await {
                Ok(Some(Ok(chunk))) => buf.extend_from_slice(&chunk),
                _ => break,
            }
        }
        String::from_utf8_lossy(&buf).chars().take(limit).collect()
    }

    /// Fetch `url` and relay it, mapping non-success statuses to errors.
    pub async fn proxy(
        &self,
        url: &str,
        request: &UpstreamRequest,
    ) -> TimeshiftResult<Response<Body>> {
        let response = self.open(url, request).await?;
        if !response.status().is_success() {
            return Err(self.upstream_error(response).await);
        }
        self.relay(response)
    }

    /// Turn a successful upstream response into the client response
    pub fn relay(&self, upstream: reqwest::Response) -> TimeshiftResult<Response<Body>> {
        let status = StatusCode::from_u16(upstream.status().as_u16()).unwrap_or(StatusCode::OK);
        let upstream_headers = upstream.headers().clone();
        let content_type = upstream_headers
            .get(header::CONTENT_TYPE)
            .cloned()
            .unwrap_or_else(|| HeaderValue::from_static(DEFAULT_CONTENT_TYPE));

        let mut builder = Response::builder()
            .status(status)
            .header(header::CONTENT_TYPE, content_type.clone())
            .header(header::CACHE_CONTROL, "no-cache")
            .header(header::ACCESS_CONTROL_ALLOW_ORIGIN, "*")
            .header(header::ACCESS_CONTROL_ALLOW_METHODS, "GET, OPTIONS, HEAD")
            .header(
                header::ACCESS_CONTROL_ALLOW_HEADERS,
                "Content-Type, Range, Accept",
            )
            .header(header::ACCESS_CONTROL_EXPOSE_HEADERS, "*");

        for name in RELAYED_HEADERS {
            if let Some(value) = upstream_headers.get(&name) {
                builder = builder.header(name, value.clone());
            }
        }

        let body = Body::from_stream(relay_chunks(
            upstream
                .bytes_stream()
                .map(|chunk| chunk.map_err(reqwest::Error::without_url)),
            self.idle_read_timeout,
            self.chunk_size,
        ));

        let response = builder.body(body).map_err(|e| {
            error!("Failed building response object: {}", e);
            TimeshiftError::UpstreamUnavailable {
                message: format!("invalid upstream response headers: {e}"),
                timed_out: false,
            }
        })?;

        info!(
            "Streaming started (status={}, content-type={:?})",
            status.as_u16(),
            content_type
        );
        Ok(response)
    }
}

/// Re-slice an upstream byte stream into chunks of at most `chunk_size`
/// bytes, ending with an error if no chunk arrives within `idle`.
pub fn relay_chunks<S, E>(
    upstream: S,
    idle: Duration,
    chunk_size: usize,
) -> impl Stream<Item = Result<Bytes, std::io::Error>> + Send + 'static
where
    S: Stream<Item = Result<Bytes, E>> + Send + 'static,
    E: std::fmt::Display + Send + 'static,
{
    let chunk_size = chunk_size.max(1);
    async_stream::stream! {
        let mut upstream = Box::pin(upstream);
        loop {
            match tokio::time::timeout(idle, upstream.next()).await {
                Ok(Some(Ok(mut bytes))) => {
                    while bytes.len() > chunk_size {
                        yield Ok::<Bytes, std::io::Error>(bytes.split_to(chunk_size));
                    }
                    if !bytes.is_empty() {
                        yield Ok(bytes);
                    }
                }
                Ok(Some(Err(e))) => {
                    warn!("Upstream body error: {}", e);
                    yield Err(std::io::Error::other(e.to_string()));
                    break;
                }
                Ok(None) => {
                    debug!("Upstream body finished");
                    break;
                }
                Err(_) => {
                    warn!("Upstream stalled for {:?}, closing stream", idle);
                    yield Err(std::io::Error::new(
                        std::io::ErrorKind::TimedOut,
                        "upstream idle timeout",
                    ));
                    break;
                }
            }
        }
    }
}
