use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use message_relay::{app, config, store::RestConnector, AppState};

#[derive(Parser)]
#[command(name = "message-relay")]
#[command(about = "Authenticated relay between the messages front-end and the hosted store")]
#[command(version)]
struct Args {
    #[arg(long, help = "Listen port (overrides RELAY_PORT / PORT)")]
    port: Option<u16>,

    #[arg(long, help = "Load environment from this file instead of ./.env")]
    env_file: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Environment must be loaded before the config singleton is first touched
    match &args.env_file {
        Some(path) => {
            dotenvy::from_path(path).with_context(|| format!("failed to load {}", path.display()))?;
        }
        None => {
            let _ = dotenvy::dotenv();
        }
    }

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let mut config = config::config().clone();
    if let Some(port) = args.port {
        config.api.port = port;
    }
    config.validate().context("invalid configuration")?;
    tracing::info!("Starting message relay in {:?} mode", config.environment);

    let connector = RestConnector::from_config(&config.store).context("failed to create store client")?;
    let port = config.api.port;
    let app = app(AppState::new(config, connector));

    let bind_addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", bind_addr))?;

    tracing::info!("Backend server running at http://localhost:{}", port);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutting down");
}
