//! HTTP middleware
//!
//! This module provides the catch-up interceptor and request logging.
//!
//! The interceptor wraps the whole host router so `/timeshift/...` paths
//! are claimed before any route or fallback sees them. Every other request
//! passes through untouched.

use axum::{
    extract::{Request, State},
    http::{Method, Uri},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::time::Instant;
use tracing::{debug, info, warn};

use super::AppState;
use crate::timeshift::match_catchup_path;
use crate::utils::url::UrlUtils;

/// Catch-up interceptor
///
/// Only GET and HEAD requests with the catch-up path shape are considered.
/// Settings are read after a match so unrelated traffic never touches the
/// settings store; when the feature is disabled the request continues to
/// normal dispatch.
pub async fn intercept_timeshift(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    if !matches!(*request.method(), Method::GET | Method::HEAD) {
        return next.run(request).await;
    }
    let Some(catchup) = match_catchup_path(request.uri().path()) else {
        return next.run(request).await;
    };

    let config = match state.timeshift.load_config().await {
        Ok(config) => config,
        Err(e) => {
            warn!("Timeshift settings invalid, rejecting catch-up request: {}", e);
            return e.into_response();
        }
    };

    if !config.enabled {
        debug!("Timeshift disabled, passing catch-up path to normal dispatch");
        return next.run(request).await;
    }

    let headers = request.headers().clone();
    drop(request);
    match state.timeshift.handle(catchup, &headers, &config).await {
        Ok(response) => response,
        Err(e) => e.into_response(),
    }
}

/// Request logging middleware
///
/// Logs all incoming requests with timing information. Credentials in
/// Xtream paths and query strings are masked.
pub async fn request_logging_middleware(
    method: Method,
    uri: Uri,
    request: Request,
    next: Next,
) -> Response {
    let start = Instant::now();

    // Generate request ID for tracing
    let request_id = uuid::Uuid::new_v4().to_string();
    let safe_uri = UrlUtils::obfuscate_credentials(&uri.to_string());

    info!(
        method = %method,
        uri = %safe_uri,
        request_id = %request_id,
        "HTTP request started"
    );

    let response = next.run(request).await;
    let status = response.status().as_u16();
    let duration = start.elapsed();

    if status >= 400 {
        warn!(
            method = %method,
            uri = %safe_uri,
            status = status,
            request_id = %request_id,
            duration_ms = duration.as_millis(),
            "HTTP request completed with error"
        );
    } else {
        info!(
            method = %method,
            uri = %safe_uri,
            status = status,
            request_id = %request_id,
            duration_ms = duration.as_millis(),
            "HTTP request completed"
        );
    }

    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{Router, body::Body, http::StatusCode, routing::get};
    use tower::ServiceExt;
    use tracing_test::traced_test;

    #[traced_test]
    #[tokio::test]
    async fn test_request_log_masks_credentials() {
        let app = Router::new()
            .route("/live/{u}/{p}/{id}", get(|| async { "ok" }))
            .layer(axum::middleware::from_fn(request_logging_middleware));

        let response = app
            .oneshot(
                axum::http::Request::builder()
                    .uri("/live/john/hunter2/1.ts")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(logs_contain("/live/****/****/1.ts"));
        assert!(!logs_contain("hunter2"));
    }
}
