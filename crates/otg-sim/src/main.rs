//! OTG controller simulator
//!
//! Serves the controller API on a local socket so `otg-harness` (or any
//! OTG-style client) can run scenarios without traffic generator hardware.

use std::net::SocketAddr;
use std::sync::Arc;

use clap::Parser;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use otg_sim::{SimController, server};

/// Simulated traffic generator controller.
#[derive(Parser, Debug)]
#[command(name = "otg-sim", about = "Simulated OTG controller with back-to-back ports")]
struct Cli {
    /// Listen address.
    #[arg(long, default_value = "127.0.0.1:8443")]
    listen: SocketAddr,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let app = server::router(Arc::new(SimController::new())).layer(TraceLayer::new_for_http());

    tracing::info!("otg-sim listening on {}", cli.listen);
    let listener = tokio::net::TcpListener::bind(cli.listen).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
