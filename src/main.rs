use anyhow::Result;
use clap::Parser;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use xc_timeshift::{
    config::Config,
    timeshift::TimeshiftService,
    web::{AppState, WebServer},
};

#[derive(Parser)]
#[command(name = "xc-timeshift")]
#[command(version)]
#[command(about = "Catch-up (timeshift) proxy for Xtream Codes providers")]
#[command(long_about = None)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    /// Listening IP address
    #[arg(short = 'H', long, value_name = "IP")]
    host: Option<String>,

    /// Listening port
    #[arg(short, long, value_name = "PORT")]
    port: Option<u16>,

    /// Catalog snapshot path (overrides config file)
    #[arg(long, value_name = "PATH")]
    catalog: Option<String>,

    /// Log level
    #[arg(short = 'v', long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging with specified level
    let log_filter = if cli.log_level == "trace" {
        format!("xc_timeshift={},tower_http=trace", cli.log_level)
    } else {
        format!("xc_timeshift={}", cli.log_level)
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| log_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting xc-timeshift v{}", env!("CARGO_PKG_VERSION"));

    let mut config = Config::load_from_file(&cli.config)?;
    info!("Configuration loaded from: {}", cli.config);

    if let Some(host) = cli.host {
        config.web.host = host;
    }
    if let Some(port) = cli.port {
        config.web.port = port;
    }
    if let Some(catalog) = cli.catalog {
        config.storage.catalog_path = catalog.into();
    }

    let service = TimeshiftService::from_config(&config).await?;

    let state = AppState::new(config.clone(), Arc::new(service));
    let web_server = WebServer::new(&config, state)?;
    info!(
        "Starting web server on {}:{}",
        web_server.host(),
        web_server.port()
    );

    let (server_ready_tx, server_ready_rx) = tokio::sync::oneshot::channel();
    let server_handle = tokio::spawn(async move {
        if let Err(e) = web_server.serve_with_signal(server_ready_tx).await {
            tracing::error!("Web server failed: {}", e);
        }
    });

    match server_ready_rx.await {
        Ok(Ok(())) => info!("Web server is now listening"),
        Ok(Err(bind_error)) => {
            tracing::error!("Web server failed to start: {}", bind_error);
            return Err(bind_error);
        }
        Err(_) => {
            return Err(anyhow::anyhow!(
                "Web server task ended before signalling readiness"
            ));
        }
    }

    server_handle.await?;
    info!("Shutdown complete");
    Ok(())
}
