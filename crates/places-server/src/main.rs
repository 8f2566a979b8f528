//! # places-server
//!
//! HTTP server for places POI membership tracking.
//!
//! This binary provides:
//! - REST API for nearby lookups, region events and membership reads
//! - OpenAPI document at `/api/openapi.json`
//! - Structured logging to file and stdout
//!
//! ## Running
//!
//! ```bash
//! # Development
//! cargo run --package places-server
//!
//! # With an explicit configuration file
//! PLACES_CONFIG=./config.toml ./places-server
//! ```

#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use places_core::{
    default_data_dir, AppConfig, ChannelSink, HttpQueryService, JsonFileStore, KeyValueStore,
    PlacesService, PlacesServiceOptions,
};
use places_server::{api, logging, state::SharedState};
use tokio::net::TcpListener;
use tokio::sync::broadcast::error::RecvError;
use tower::ServiceBuilder;
use tower_http::compression::CompressionLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

/// Environment variable naming an explicit configuration file.
const CONFIG_PATH_ENV: &str = "PLACES_CONFIG";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = load_config()?;
    logging::init(config.server.production)?;

    info!(version = env!("CARGO_PKG_VERSION"), "Starting places-server");

    let data_dir = match &config.server.data_dir {
        Some(dir) => dir.clone(),
        None => default_data_dir().context("no data directory available")?,
    };
    let store: Box<dyn KeyValueStore> = Box::new(
        JsonFileStore::in_dir(&data_dir)
            .with_context(|| format!("failed to open data store in {}", data_dir.display()))?,
    );
    info!(data_dir = %data_dir.display(), "Opened Places data store");

    let query = HttpQueryService::new().context("failed to build query service client")?;
    let sink = Arc::new(ChannelSink::default());
    spawn_notification_logger(&sink);

    let service = PlacesService::new(
        store,
        Arc::new(query),
        sink,
        PlacesServiceOptions {
            config: Some(config.places.clone()),
            privacy: config.privacy,
            ..PlacesServiceOptions::default()
        },
    )
    .context("failed to initialize Places service")?;

    let app = api::create_router(SharedState::new(service)).layer(
        ServiceBuilder::new()
            .layer(TraceLayer::new_for_http())
            .layer(CompressionLayer::new()),
    );

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;

    info!("Listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("places-server stopped");
    Ok(())
}

fn load_config() -> anyhow::Result<AppConfig> {
    match std::env::var_os(CONFIG_PATH_ENV) {
        Some(path) => {
            let path = PathBuf::from(path);
            AppConfig::load_from(&path)
                .with_context(|| format!("failed to load configuration from {}", path.display()))
        }
        None => AppConfig::load().context("failed to load configuration"),
    }
}

/// Log every published notification at debug level.
fn spawn_notification_logger(sink: &ChannelSink) {
    let mut events = sink.subscribe();
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(notification) => {
                    tracing::debug!(notification = notification.name(), "Places notification");
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Notification logger fell behind");
                }
                Err(RecvError::Closed) => break,
            }
        }
    });
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
