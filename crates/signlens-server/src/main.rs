use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use signlens_server::{AppBootstrap, BootstrapOptions, create_router, logging};
use tokio::net::TcpListener;
use tracing::{error, info};

/// Streaming sign-language interpretation server.
#[derive(Parser)]
#[command(name = "signlens")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to config.toml (default: ~/.config/signlens/config.toml)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Address to listen on, e.g. 0.0.0.0:3001
    #[arg(long)]
    bind: Option<String>,

    /// Directory holding vocabulary.json and stored sessions
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Emit logs as JSON lines
    #[arg(long)]
    log_json: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(cli.log_json)?;

    let bootstrap = AppBootstrap::initialize(BootstrapOptions {
        config_path: cli.config,
        bind: cli.bind,
        data_dir: cli.data_dir,
    })
    .await?;

    let bind = bootstrap.config.server.bind.clone();
    let app = create_router(bootstrap.app_state.clone(), &bootstrap.config.server.ws_path);
    let listener = TcpListener::bind(&bind)
        .await
        .with_context(|| format!("Failed to bind {bind}"))?;
    info!(
        "Signlens listening on http://{} (websocket {})",
        bind, bootstrap.config.server.ws_path
    );

    let served = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await;
    bootstrap.shutdown().await;
    served.context("Server error")
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
