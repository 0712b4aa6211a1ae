//! sentinel-scan - Ordnance photo scanner
//!
//! Serves a single-page UI that uploads a photograph, sends it to the
//! multimodal inference service, and shows the structured hazard assessment.

use anyhow::{Context, Result};
use clap::Parser;
use sentinel_common::config::{self, Overrides};
use sentinel_common::EventBus;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

use sentinel_scan::services::{GeminiClient, GeminiConfig};
use sentinel_scan::AppState;

/// Command-line arguments
///
/// Flags take precedence over their environment variables, which take
/// precedence over the TOML config file.
#[derive(Parser, Debug)]
#[command(name = "sentinel-scan", version, about = "Ordnance photo scanner")]
struct Args {
    /// TOML config file (default: <config dir>/sentinel/config.toml)
    #[arg(long, env = "SENTINEL_CONFIG")]
    config: Option<PathBuf>,

    /// Inference service API key
    #[arg(long, env = "SENTINEL_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Inference model identifier
    #[arg(long, env = "SENTINEL_MODEL")]
    model: Option<String>,

    /// Inference service base URL
    #[arg(long, env = "SENTINEL_BASE_URL")]
    base_url: Option<String>,

    /// HTTP listen address
    #[arg(long, env = "SENTINEL_BIND")]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Config is read before tracing so its log level can seed the filter
    let toml_config = config::load_config(args.config.as_deref())?;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&toml_config.logging.level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!(
        "Starting Sentinel Ordnance Scanner (sentinel-scan) v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    match config::locate_config(args.config.as_deref()) {
        Some(path) => info!("Config file: {}", path.display()),
        None => info!("No config file found; using defaults and environment"),
    }

    let overrides = Overrides {
        api_key: args.api_key,
        model: args.model,
        base_url: args.base_url,
        bind_address: args.bind,
    };
    let settings = config::resolve_settings(&overrides, &toml_config)?;

    let client = GeminiClient::new(GeminiConfig::from(&settings))
        .context("Failed to create inference client")?;
    info!("Inference model: {}", client.model());

    let event_bus = EventBus::new(100);
    let state = AppState::new(Arc::new(client), event_bus);
    let app = sentinel_scan::build_router(state);

    let listener = tokio::net::TcpListener::bind(&settings.bind_address)
        .await
        .with_context(|| format!("Failed to bind {}", settings.bind_address))?;
    info!("Listening on http://{}", settings.bind_address);
    info!("Health check: http://{}/health", settings.bind_address);

    axum::serve(listener, app).await?;

    Ok(())
}
