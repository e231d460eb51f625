//! Caravan engagement service entry point.

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use caravan_server::{ServerConfig, build_app};

#[derive(Parser)]
#[command(
    name = "caravan-server",
    about = "Engagement scoring service for Caravan trips",
    version
)]
struct Cli {
    /// Path to caravan.toml
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Listen address override
    #[arg(short, long)]
    listen: Option<SocketAddr>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::registry().with(filter).with(fmt::layer()).init();

    let mut config = match &cli.config {
        Some(path) => ServerConfig::load(path)?,
        None => ServerConfig::default(),
    };
    if let Some(listen) = cli.listen {
        config.listen_addr = listen;
    }

    let app = build_app(&config);
    let listener = tokio::net::TcpListener::bind(config.listen_addr).await?;
    tracing::info!(addr = %config.listen_addr, "Caravan engagement service listening");
    axum::serve(listener, app).await?;
    Ok(())
}
