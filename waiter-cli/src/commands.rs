//! CLI command implementations

use std::path::PathBuf;

use anyhow::{Context, bail};
use clap::Subcommand;
use tracing::info;
use waiter_core::{DeliveryMode, WaiterConfig, probe};

/// Available CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Start the gateway server
    Server {
        /// Host to bind to
        #[arg(long)]
        host: Option<String>,
        /// Port to bind to
        #[arg(short, long)]
        port: Option<u16>,
        /// Hand file transfers to the reverse proxy via X-Accel-Redirect
        #[arg(long)]
        offload: bool,
        /// Root directory all token paths are relative to
        #[arg(long)]
        base_path: Option<PathBuf>,
    },
    /// Check that the media mounts are present
    Status,
}

/// Handle the CLI command
///
/// # Errors
/// Returns appropriate error based on the command that fails
pub async fn handle_command(command: Commands) -> anyhow::Result<()> {
    match command {
        Commands::Server {
            host,
            port,
            offload,
            base_path,
        } => start_server(host, port, offload, base_path).await,
        Commands::Status => check_status().await,
    }
}

/// Start the gateway with environment configuration and flag overrides
async fn start_server(
    host: Option<String>,
    port: Option<u16>,
    offload: bool,
    base_path: Option<PathBuf>,
) -> anyhow::Result<()> {
    let mut config = WaiterConfig::from_env();

    if let Some(host) = host {
        config.server.host = host;
    }
    if let Some(port) = port {
        config.server.port = port;
    }
    if offload {
        config.server.delivery_mode = DeliveryMode::Offload;
    }
    if let Some(base_path) = base_path {
        config.media.base_path = base_path;
    }

    config.validate().context("Invalid configuration")?;

    info!(
        "Serving media from {} in {} mode",
        config.media.base_path.display(),
        config.server.delivery_mode
    );

    waiter_web::run_server(config)
        .await
        .map_err(|e| anyhow::anyhow!("Server failed: {e}"))
}

/// Probe the media mounts, print the result and fail when unhealthy
async fn check_status() -> anyhow::Result<()> {
    let config = WaiterConfig::from_env();
    let health = probe(&config.media.mount_points()).await;

    println!("{}", serde_json::to_string(&health)?);

    if !health.ok {
        bail!(
            "Media mounts missing under {}",
            config.media.base_path.display()
        );
    }
    Ok(())
}
