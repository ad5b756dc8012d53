//! Web layer module
//!
//! This module provides the HTTP interface of the timeshift proxy.
//!
//! # Architecture
//!
//! - **Host router**: health, live playback, `player_api.php`, `xmltv.php`
//!   and a JSON 404 fallback
//! - **Interceptor**: wraps the host router and claims catch-up paths
//!   before routing, see [`middleware::intercept_timeshift`]
//! - **Request logging**: outermost layer, credentials masked
//!
//! # Usage
//!
//! ```rust,ignore
//! let state = AppState::new(config.clone(), Arc::new(service));
//! let server = WebServer::new(&config, state)?;
//! server.serve_with_signal(ready_tx).await?;
//! ```

use anyhow::Result;
use axum::{Router, routing::get};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::CorsLayer;

use crate::config::Config;
use crate::timeshift::TimeshiftService;

pub mod handlers;
pub mod middleware;
pub mod responses;

pub use responses::ApiResponse;

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub timeshift: Arc<TimeshiftService>,
    /// Application start time for uptime calculation
    pub start_time: chrono::DateTime<chrono::Utc>,
}

impl AppState {
    pub fn new(config: Config, timeshift: Arc<TimeshiftService>) -> Self {
        Self {
            config,
            timeshift,
            start_time: chrono::Utc::now(),
        }
    }
}

/// Web server configuration and setup
pub struct WebServer {
    app: Router,
    addr: SocketAddr,
}

impl WebServer {
    pub fn new(config: &Config, state: AppState) -> Result<Self> {
        let addr: SocketAddr = format!("{}:{}", config.web.host, config.web.port).parse()?;
        Ok(Self {
            app: create_app(state),
            addr,
        })
    }

    /// Serve with a notification when the server is actually listening or fails to bind
    pub async fn serve_with_signal(
        self,
        ready_signal: tokio::sync::oneshot::Sender<Result<()>>,
    ) -> Result<()> {
        self.serve_with_cancellation(ready_signal, None).await
    }

    /// Serve with cancellation support and ready notification
    pub async fn serve_with_cancellation(
        self,
        ready_signal: tokio::sync::oneshot::Sender<Result<()>>,
        cancellation_token: Option<tokio_util::sync::CancellationToken>,
    ) -> Result<()> {
        match tokio::net::TcpListener::bind(&self.addr).await {
            Ok(listener) => {
                // Signal that we're now actually listening on the port
                let _ = ready_signal.send(Ok(()));

                let shutdown = async move {
                    match cancellation_token {
                        Some(token) => {
                            token.cancelled().await;
                            tracing::info!(
                                "Web server received cancellation signal, shutting down gracefully"
                            );
                        }
                        None => shutdown_signal().await,
                    }
                };

                axum::serve(listener, self.app)
                    .with_graceful_shutdown(shutdown)
                    .await?;
                Ok(())
            }
            Err(bind_error) => {
                let bind_err_msg = format!("Failed to bind to {}: {}", self.addr, bind_error);
                let _ = ready_signal.send(Err(anyhow::anyhow!("{}", bind_err_msg)));
                Err(anyhow::anyhow!("{}", bind_err_msg))
            }
        }
    }

    /// Get the host address
    pub fn host(&self) -> String {
        self.addr.ip().to_string()
    }

    /// Get the port number
    pub fn port(&self) -> u16 {
        self.addr.port()
    }
}

/// Host routes without the interceptor
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health::health_check))
        .route(
            "/live/{username}/{password}/{stream}",
            get(handlers::xtream::live_stream),
        )
        .route("/player_api.php", get(handlers::xtream::player_api))
        .route("/xmltv.php", get(handlers::xtream::xmltv))
        .fallback(responses::not_found)
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Full application: request logging around the interceptor around the host router
pub fn create_app(state: AppState) -> Router {
    let host = create_router(state.clone());
    Router::new()
        .fallback_service(host)
        .layer(axum::middleware::from_fn_with_state(
            state,
            middleware::intercept_timeshift,
        ))
        .layer(axum::middleware::from_fn(
            middleware::request_logging_middleware,
        ))
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};
        match (signal(SignalKind::terminate()), signal(SignalKind::interrupt())) {
            (Ok(mut sigterm), Ok(mut sigint)) => {
                tokio::select! {
                    _ = sigterm.recv() => {
                        tracing::info!("Received SIGTERM, shutting down gracefully");
                    }
                    _ = sigint.recv() => {
                        tracing::info!("Received SIGINT (Ctrl+C), shutting down gracefully");
                    }
                }
            }
            (Err(e), _) | (_, Err(e)) => {
                tracing::error!("Failed to install signal handlers: {}", e);
                std::future::pending::<()>().await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        match tokio::signal::ctrl_c().await {
            Ok(()) => tracing::info!("Received Ctrl+C, shutting down gracefully"),
            Err(e) => {
                tracing::error!("Failed to install Ctrl+C handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    }
}
