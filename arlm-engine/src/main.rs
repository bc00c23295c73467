//! AR landmarks engine - main entry point
//!
//! `arlm-engine serve` (the default) runs the coordinator behind the HTTP
//! API. `fetch` and `nearby` are one-shot catalog diagnostics.

use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, Result};
use arlm_common::GeoPoint;
use arlm_engine::config::{EngineConfig, API_KEY_ENV_VAR, BACKEND_URL_ENV_VAR, CONFIG_ENV_VAR};
use arlm_engine::services::proximity_index::{self, format_distance};
use arlm_engine::services::{CatalogClient, ModelHandle};
use arlm_engine::{build_engine, build_router, EngineParts};
use clap::{Parser, Subcommand};
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Command-line arguments for arlm-engine
#[derive(Parser, Debug)]
#[command(name = "arlm-engine")]
#[command(about = "Landmark recognition engine for AR clients")]
#[command(version)]
struct Args {
    /// Path to the TOML config file
    #[arg(short, long, env = CONFIG_ENV_VAR)]
    config: Option<PathBuf>,

    /// Catalog backend URL (overrides the config file)
    #[arg(long, env = BACKEND_URL_ENV_VAR)]
    backend_url: Option<String>,

    /// Catalog API key (overrides the config file)
    #[arg(long, env = API_KEY_ENV_VAR, hide_env_values = true)]
    api_key: Option<String>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP API (default)
    Serve {
        /// Address to listen on (overrides [server] bind)
        #[arg(long)]
        bind: Option<SocketAddr>,
    },
    /// Fetch the catalog once and print a summary
    Fetch,
    /// Fetch the catalog and list landmarks near a location
    Nearby {
        #[arg(long, allow_hyphen_values = true)]
        lat: f64,
        #[arg(long, allow_hyphen_values = true)]
        lon: f64,
        /// Search radius in meters (overrides [geo] radius_m)
        #[arg(long)]
        radius: Option<f64>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = EngineConfig::load(args.config.as_deref()).context("Failed to load configuration")?;
    if let Some(url) = args.backend_url {
        config.backend.base_url = Some(url);
    }
    if let Some(key) = args.api_key {
        config.backend.api_key = Some(key);
    }

    // RUST_LOG wins over the config file
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.logging.level.clone().into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    match args.command.unwrap_or(Command::Serve { bind: None }) {
        Command::Serve { bind } => serve(config, bind).await,
        Command::Fetch => fetch(config).await,
        Command::Nearby { lat, lon, radius } => nearby(config, GeoPoint::new(lat, lon), radius).await,
    }
}

async fn serve(config: EngineConfig, bind: Option<SocketAddr>) -> Result<()> {
    let addr: SocketAddr = match bind {
        Some(addr) => addr,
        None => config
            .server
            .bind
            .parse()
            .with_context(|| format!("Invalid [server] bind address: {}", config.server.bind))?,
    };

    // No on-device model ships with the server build; visual mode stays
    // silent and geo mode carries the session.
    let parts = EngineParts::from_config(&config, ModelHandle::Unavailable)
        .context("Failed to initialize catalog client")?;
    let (state, coordinator_task) = build_engine(&config, parts);
    info!(vision_available = state.vision_available, "Engine initialized");

    let coordinator = state.coordinator.clone();
    let shutdown = state.shutdown.clone();
    let app = build_router(state);

    info!("Starting HTTP server on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown))
        .await
        .context("Server error")?;

    if let Err(e) = coordinator.shutdown().await {
        warn!(error = %e, "Coordinator already stopped");
    }
    if let Err(e) = coordinator_task.await {
        error!(error = %e, "Coordinator task failed");
    }

    info!("Server shutdown complete");
    Ok(())
}

fn catalog_client(config: &EngineConfig) -> Result<CatalogClient> {
    let (base_url, api_key) = config.backend_credentials()?;
    CatalogClient::connect(base_url, api_key, config.retry.clone()).context("Failed to create catalog client")
}

async fn fetch(config: EngineConfig) -> Result<()> {
    let client = catalog_client(&config)?;
    let snapshot = client
        .fetch_snapshot(&CancellationToken::new())
        .await
        .context("Catalog fetch failed")?;

    println!(
        "{} landmarks, {} categories (fetched {})",
        snapshot.len(),
        snapshot.categories().len(),
        snapshot.fetched_at().to_rfc3339()
    );
    for category in snapshot.categories() {
        let count = snapshot
            .landmarks()
            .filter(|l| l.category_id.as_deref() == Some(category.id.as_str()))
            .count();
        println!(
            "  {} {:<30} {:>4}",
            category.icon.as_deref().unwrap_or("📍"),
            category.name,
            count
        );
    }
    Ok(())
}

async fn nearby(config: EngineConfig, location: GeoPoint, radius: Option<f64>) -> Result<()> {
    anyhow::ensure!(location.is_valid(), "Coordinates out of range");

    let client = catalog_client(&config)?;
    let snapshot = client
        .fetch_snapshot(&CancellationToken::new())
        .await
        .context("Catalog fetch failed")?;

    let radius_m = radius.unwrap_or(config.geo.radius_m);
    let entries = proximity_index::nearby(location, snapshot.landmarks(), radius_m);
    println!("{} landmarks within {}", entries.len(), format_distance(radius_m));
    for entry in entries {
        println!(
            "  {:>8}  {}",
            format_distance(entry.distance_m),
            entry.landmark.name
        );
    }
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal(shutdown: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("Failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
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

    shutdown.cancel();
}
