//! Startup orchestration.
//!
//! # Responsibilities
//! - Start optional background services (metrics exporter)
//! - Build the HTTP server from the validated config
//! - Bind the listener and begin accepting traffic
//!
//! # Design Decisions
//! - Fail fast: a bad route table or an unbindable port is fatal
//! - Listener binds last (traffic only when ready)

use std::io;

use tokio::net::TcpListener;
use tokio::sync::broadcast;

use crate::config::GatewayConfig;
use crate::http::health::HEALTH_PATH;
use crate::http::server::{HttpServer, ServerError};
use crate::observability::metrics;

#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error(transparent)]
    Server(#[from] ServerError),

    #[error("failed to bind {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: io::Error,
    },

    #[error("server error: {0}")]
    Serve(#[from] io::Error),
}

/// Bring the gateway up and serve until shutdown.
pub async fn start(
    config: GatewayConfig,
    shutdown: broadcast::Receiver<()>,
) -> Result<(), StartupError> {
    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let address = config.listener.bind_address();
    let server = HttpServer::new(config)?;

    let listener = TcpListener::bind(&address)
        .await
        .map_err(|source| StartupError::Bind {
            address: address.clone(),
            source,
        })?;
    let local_addr = listener.local_addr()?;

    tracing::info!(address = %local_addr, "BN API proxy service listening");
    for route in &server.config().routes {
        tracing::info!(
            route = %route.name,
            prefix = %route.path_prefix,
            upstream = %route.upstream,
            "Upstream base URL"
        );
    }
    tracing::info!(
        "Health check: http://localhost:{}{}",
        local_addr.port(),
        HEALTH_PATH
    );

    server.run(listener, shutdown).await?;
    Ok(())
}
