//! emma-dash - dashboard snapshot server
//!
//! Serves cached status, revenue and fusion snapshots over HTTP, refreshing
//! them at startup and on a fixed interval.

use anyhow::{Context, Result};
use clap::Parser;
use emma_common::config::{self, RootLayout};
use emma_common::time::secs_to_duration;
use emma_dash::{build_router, AppState, RefreshScheduler};
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "emma-dash", version, about = "Serve dashboard snapshots")]
struct Args {
    /// Root folder holding data/
    #[arg(long, env = "EMMA_ROOT_FOLDER")]
    root_folder: Option<PathBuf>,

    /// TOML configuration file
    #[arg(long, env = "EMMA_CONFIG")]
    config: Option<PathBuf>,

    /// Listen address (overrides [dashboard] host)
    #[arg(long)]
    host: Option<String>,

    /// Listen port (overrides [dashboard] port)
    #[arg(long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config_path = config::resolve_config_path(args.config.as_deref());
    let toml_config = config::load_toml_config(config_path.as_deref())
        .context("Failed to load configuration")?;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&toml_config.logging.level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!(
        "Starting emma-dash v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    let root_folder = config::resolve_root_folder(args.root_folder.as_deref(), &toml_config);
    let layout = RootLayout::new(root_folder);
    layout
        .ensure_directories()
        .context("Failed to initialize root folder")?;
    info!("Root folder: {}", layout.root().display());

    let dashboard = &toml_config.dashboard;
    let ttl = secs_to_duration(dashboard.snapshot_ttl_secs);
    let state = AppState::with_default_sources(layout, ttl, &dashboard.report_suffix);
    info!(
        ttl_secs = ttl.as_secs(),
        suffix = %dashboard.report_suffix,
        "Snapshot cache ready"
    );

    let cancel = CancellationToken::new();
    let scheduler = RefreshScheduler::new(
        state.cache.clone(),
        secs_to_duration(dashboard.refresh_interval_secs),
    )
    .spawn(cancel.clone());

    let app = build_router(state);

    let host = args.host.unwrap_or_else(|| dashboard.host.clone());
    let port = args.port.unwrap_or(dashboard.port);
    let addr = format!("{}:{}", host, port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;
    info!("emma-dash listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    let shutdown = cancel.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!("Failed to listen for shutdown signal: {}", e);
            }
            info!("Shutdown requested");
            shutdown.cancel();
        })
        .await?;

    cancel.cancel();
    if let Err(e) = scheduler.await {
        warn!("Refresh scheduler ended abnormally: {}", e);
    }

    Ok(())
}
