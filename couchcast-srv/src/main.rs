//! Couchcast - main entry point
//!
//! Starts the HTTP server, wires the Chromecast receiver client into the
//! session manager, and releases the receiver on shutdown.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use couchcast_common::config::{CliOverrides, Config};
use couchcast_srv::api::{self, AppState};
use couchcast_srv::receiver::chromecast::ChromecastClient;
use couchcast_srv::SessionManager;

/// Command-line arguments for couchcast-srv
#[derive(Parser, Debug)]
#[command(name = "couchcast-srv")]
#[command(about = "Media library browser and cast controller")]
#[command(version)]
struct Args {
    /// Port to listen on
    #[arg(short, long, env = "COUCHCAST_PORT")]
    port: Option<u16>,

    /// Root folder containing media files
    #[arg(short, long, env = "COUCHCAST_LIBRARY_ROOT")]
    library_root: Option<PathBuf>,

    /// Base URL receivers use to stream media from this host
    #[arg(short = 'u', long, env = "COUCHCAST_STREAM_BASE_URL")]
    stream_base_url: Option<String>,

    /// Path to the ffmpeg binary used for thumbnails
    #[arg(long, env = "COUCHCAST_FFMPEG")]
    ffmpeg: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "couchcast_srv=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Couchcast v{}", env!("CARGO_PKG_VERSION"));

    let args = Args::parse();
    let config = Config::resolve(CliOverrides {
        port: args.port,
        library_root: args.library_root,
        stream_base_url: args.stream_base_url,
        ffmpeg_path: args.ffmpeg,
    })
    .context("Failed to resolve configuration")?;

    info!("Library root: {}", config.library_root.display());
    info!("Stream base URL: {}", config.stream_base_url);

    let client = Arc::new(ChromecastClient::new(Duration::from_secs(
        config.discovery_timeout_secs,
    )));
    let session = Arc::new(SessionManager::new(
        client,
        config.stream_base_url.clone(),
        Duration::from_secs(config.connect_timeout_secs),
    ));

    let state = AppState {
        session: Arc::clone(&session),
        library_root: config.library_root.clone(),
        ffmpeg_path: config.ffmpeg_path.clone(),
    };
    let app = api::create_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    info!("Starting HTTP server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    // Release the receiver so it does not keep streaming a dead URL
    if let Err(e) = session.disconnect().await {
        info!("Disconnect on shutdown failed: {}", e);
    }

    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
