//! # Parlor Server
//!
//! Realtime TCP relay server for multiplayer lobbies.
//!
//! ## Usage
//!
//! ```bash
//! # Run with default settings
//! parlor
//!
//! # Run with environment variables
//! PARLOR_PORT=1337 PARLOR_HOST=:: parlor
//! ```
//!
//! Configuration is read from `parlor.toml`, `/etc/parlor/parlor.toml`, or
//! `~/.config/parlor/parlor.toml` when present.

mod config;
mod listener;
mod metrics;
mod relay;

use anyhow::Result;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "parlor=debug,parlor_core=debug,parlor_protocol=debug".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = config::Config::load()?;

    tracing::info!("Starting Parlor relay on {}:{}", config.host, config.port);

    // Initialize metrics
    metrics::init_metrics();

    // Start the server
    listener::run_server(config).await?;

    Ok(())
}
