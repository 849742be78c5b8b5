//! Binance API proxy service.
//!
//! # Architecture Overview
//!
//! ```text
//!                              ┌──────────────────────────────────────────────┐
//!                              │               BN API PROXY                   │
//!     Client Request           │  ┌─────────┐    ┌──────────┐   ┌──────────┐  │
//!     ─────────────────────────┼─▶│  http   │───▶│ routing  │──▶│  proxy   │  │
//!                              │  │ server  │    │  table   │   │dispatcher│  │
//!                              │  └────┬────┘    └──────────┘   └────┬─────┘  │
//!                              │       │ /health                     │        │
//!                              │       ▼                             ▼        │
//!                              │  ┌─────────┐                   ┌──────────┐  │
//!                              │  │liveness │                   │ request  │  │
//!                              │  └─────────┘                   │ rewriter │  │
//!                              │                                └────┬─────┘  │
//!     Client Response          │  ┌─────────┐                        │        │   spot / futures
//!     ◀────────────────────────┼──│response │◀───────────────────────┴────────┼──── upstream
//!                              │  │ relay   │                                 │
//!                              │  └─────────┘                                 │
//!                              └──────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;

use clap::Parser;

use bn_api_proxy::config::{load_config, ConfigOverrides};
use bn_api_proxy::lifecycle::{self, Shutdown};
use bn_api_proxy::observability::init_logging;

#[derive(Debug, Parser)]
#[command(version, about, long_about = None)]
struct Args {
    /// Optional TOML config file
    #[arg(short, long, env = "BN_PROXY_CONFIG")]
    config: Option<PathBuf>,

    /// Listen port
    #[arg(long, env = "PORT")]
    port: Option<u16>,

    /// Spot upstream base URL
    #[arg(long, env = "BN_SPOT_API_BASE_URL")]
    spot_base_url: Option<String>,

    /// Futures upstream base URL
    #[arg(long, env = "BN_FUTURES_API_BASE_URL")]
    futures_base_url: Option<String>,

    /// Upstream call timeout in seconds
    #[arg(long, env = "UPSTREAM_TIMEOUT_SECS")]
    upstream_timeout_secs: Option<u64>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL")]
    log_level: Option<String>,
}

impl Args {
    fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            port: self.port,
            spot_base_url: self.spot_base_url.clone(),
            futures_base_url: self.futures_base_url.clone(),
            upstream_timeout_secs: self.upstream_timeout_secs,
            log_level: self.log_level.clone(),
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // A missing .env is fine; the process environment still applies.
    let dotenv = dotenvy::dotenv();

    let args = Args::parse();
    let config = load_config(args.config.as_deref(), args.overrides())?;

    init_logging(&config.observability);

    if let Ok(path) = dotenv {
        tracing::debug!(path = %path.display(), "Loaded .env");
    }
    tracing::info!("bn-api-proxy v{} starting", env!("CARGO_PKG_VERSION"));

    let shutdown = Shutdown::new();
    lifecycle::start(config, shutdown.subscribe()).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
