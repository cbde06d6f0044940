//! Stats Proxy
//!
//! A caching reverse proxy built with Tokio and Axum that shields a public
//! sports-statistics API from direct browser traffic.
//!
//! # Architecture Overview
//!
//! ```text
//!                    ┌──────────────────────────────────────────────────────────┐
//!                    │                      STATS PROXY                          │
//!                    │                                                           │
//!  Client Request    │  ┌──────────┐   ┌──────────┐   ┌──────────┐               │
//!  ──────────────────┼─▶│   http   │──▶│ security │──▶│  proxy   │               │
//!                    │  │  server  │   │cors/limit│   │ pipeline │               │
//!                    │  └──────────┘   └──────────┘   └────┬─────┘               │
//!                    │                                     │                     │
//!                    │                      fresh? ┌───────▼──────┐              │
//!                    │                  ◀──────────│  ttl cache   │              │
//!                    │                             └───────┬──────┘              │
//!                    │                               miss  ▼                     │
//!                    │  ┌──────────┐   ┌──────────┐  ┌──────────┐               │
//!  Client Response   │  │ response │◀──│ fetcher  │◀─│scheduler │               │
//!  ◀─────────────────┼──│ headers  │   │ retries  │  │ C slots  │──────────────┼──▶ Upstream
//!                    │  └──────────┘   └──────────┘  └──────────┘               │     API
//!                    │                                                           │
//!                    │  config · observability · resilience · lifecycle          │
//!                    └──────────────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;

use stats_proxy::config::load_config;
use stats_proxy::lifecycle::{spawn_signal_listener, Shutdown};
use stats_proxy::observability::{logging, metrics};
use stats_proxy::HttpServer;

#[derive(Parser)]
#[command(name = "stats-proxy")]
#[command(about = "Caching reverse proxy for a sports-statistics API", long_about = None)]
struct Cli {
    /// Path to a TOML config file.
    #[arg(short, long, env = "PROXY_CONFIG")]
    config: Option<PathBuf>,

    /// Override the listener bind address.
    #[arg(short, long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = load_config(cli.config.as_deref())?;
    if let Some(bind) = cli.bind {
        config.listener.bind_address = bind;
    }

    logging::init_logging(&config.observability.log_level);
    tracing::info!("stats-proxy v{} starting", env!("CARGO_PKG_VERSION"));

    tracing::info!(
        bind_address = %config.listener.bind_address,
        upstream = %config.upstream.base_url,
        max_concurrent = config.scheduler.max_concurrent,
        spacing_ms = config.scheduler.spacing_ms,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(e) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                error = %e,
                "Failed to parse metrics address"
            ),
        }
    }

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Shutdown::new();
    spawn_signal_listener(&shutdown);

    let server = HttpServer::new(config)?;
    server.run(listener, shutdown.subscribe()).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
