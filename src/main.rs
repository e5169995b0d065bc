//! Relay gateway binary.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client Request      ┌─────────┐    ┌─────────┐    ┌──────────────┐
//!     ───────────────────▶│ listener│───▶│  http   │───▶│ route table  │
//!                         │ (local  │    │dispatch │    │ (local ip,   │
//!                         │  addr)  │    └────┬────┘    │  port) →     │
//!                         └─────────┘         │         │  upstream    │
//!                                             │         └──────────────┘
//!                              ┌──────────────┴──────────────┐
//!                              ▼                             ▼
//!                       ┌─────────────┐              ┌───────────────┐
//!                       │   unary     │              │ duplex relay  │
//!                       │  forwarder  │              │ (two pumps,   │
//!                       └─────────────┘              │  one token)   │
//!                                                    └───────────────┘
//! ```

use std::path::PathBuf;

use clap::Parser;

use relay_gateway::config::{load_config, GatewayConfig};
use relay_gateway::lifecycle::{signals, startup, Shutdown};
use relay_gateway::observability::logging;
use relay_gateway::HttpServer;

#[derive(Parser)]
#[command(name = "relay-gateway")]
#[command(about = "Static-route reverse proxy with WebSocket relaying", long_about = None)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Validate the configuration and exit.
    #[arg(long)]
    check: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => GatewayConfig::default(),
    };

    logging::init(&config.observability);

    if cli.config.is_none() {
        tracing::warn!("No configuration file given, serving with an empty route table");
    }

    if cli.check {
        println!("configuration ok: {} route(s)", config.routes.len());
        return Ok(());
    }

    tracing::info!(
        routes = config.routes.len(),
        listeners = config.listener.bind_addresses.len(),
        connect_timeout_secs = config.timeouts.connect_secs,
        "Configuration loaded"
    );

    // Build the table before any port opens.
    let server = HttpServer::new(config)?;
    let listeners = startup::bind_listeners(&server.config().listener).await?;

    let shutdown = Shutdown::new();
    tokio::spawn(signals::shutdown_on_signal(shutdown.clone()));

    server.run(listeners, &shutdown).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
