//! Upstream guard service.
//!
//! # Architecture Overview
//!
//! ```text
//!                       ┌──────────────────────────────────────────────┐
//!                       │                upstream-guard                │
//!                       │                                              │
//!   GET /with-circuit-  │  ┌──────────┐   ┌──────────┐   ┌──────────┐  │
//!   breaker  ───────────┼─▶│ handlers │──▶│ circuit  │──▶│ upstream │──┼──▶ GET /api
//!                       │  └──────────┘   │ breaker  │   │  client  │  │
//!   GET /no-circuit-    │       │         └────┬─────┘   └──────────┘  │
//!   breaker  ───────────┼───────┼──────────────┼────────────▲          │
//!                       │       │              ▼                       │
//!   GET /circuit-       │       │         ┌──────────┐                 │
//!   breaker-status/ ────┼───────┴────────▶│  stats   │                 │
//!   custom              │                 └──────────┘                 │
//!                       │                                              │
//!                       │  mock upstream (GET /api), dashboard (GET /) │
//!                       └──────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;

use clap::Parser;

use upstream_guard::config::load_config;
use upstream_guard::lifecycle::{signals, startup, Shutdown};
use upstream_guard::observability::logging;

#[derive(Parser)]
#[command(name = "upstream-guard")]
#[command(about = "Circuit breaker guarding an upstream HTTP dependency", long_about = None)]
struct Cli {
    /// TOML configuration file. Defaults and environment variables apply without one.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;

    logging::init_logging(&config.observability);
    tracing::info!("upstream-guard v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        bind_address = %config.listener.bind_address,
        upstream = %config.upstream.base_url,
        threshold = config.breaker.threshold,
        cooldown_ms = config.breaker.cooldown_ms,
        timeout_ms = config.breaker.timeout_ms,
        mock_upstream = config.mock_upstream.enabled,
        "Configuration loaded"
    );

    let shutdown = Shutdown::new();
    signals::spawn_signal_listener(shutdown.clone());
    startup::run(config, &shutdown).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
