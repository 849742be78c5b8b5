//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with all handlers
//! - Wire up middleware (tracing, request ID, security headers, CORS, body limit)
//! - Answer `/health` locally
//! - Dispatch everything else through the route table
//! - Serve until a shutdown signal arrives

use std::sync::Arc;
use std::time::Instant;

use axum::{
    body::{Body, Bytes},
    extract::{DefaultBodyLimit, FromRequest, State},
    http::{Request, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::{
    cors::CorsLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

use crate::config::GatewayConfig;
use crate::http::health::{health_check, HEALTH_PATH};
use crate::http::proxy::ProxyDispatcher;
use crate::http::request::InboundRequest;
use crate::http::response::GatewayError;
use crate::lifecycle::signals::shutdown_signal;
use crate::observability::metrics;
use crate::routing::{RouteError, RouteTable};
use crate::security::headers::with_security_headers;

/// Errors raised while assembling the server.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error(transparent)]
    Route(#[from] RouteError),

    #[error("failed to build upstream TLS client: {0}")]
    Tls(#[from] rustls::Error),
}

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub routes: Arc<RouteTable>,
    pub dispatcher: Arc<ProxyDispatcher>,
    pub max_body_bytes: usize,
}

/// HTTP server for the gateway.
pub struct HttpServer {
    router: Router,
    config: GatewayConfig,
}

impl HttpServer {
    /// Create a new HTTP server with the given configuration.
    pub fn new(config: GatewayConfig) -> Result<Self, ServerError> {
        let state = AppState {
            routes: Arc::new(RouteTable::from_config(&config.routes)?),
            dispatcher: Arc::new(ProxyDispatcher::new(&config.timeouts)?),
            max_body_bytes: config.security.max_body_bytes,
        };

        let router = Self::build_router(&config, state);
        Ok(Self { router, config })
    }

    /// Build the Axum router with all middleware layers.
    fn build_router(config: &GatewayConfig, state: AppState) -> Router {
        let mut router = Router::new()
            .route(HEALTH_PATH, get(health_check).fallback(gateway_handler))
            .fallback(gateway_handler)
            .with_state(state)
            .layer(DefaultBodyLimit::max(config.security.max_body_bytes));

        if config.security.headers {
            router = with_security_headers(router);
        }
        if config.security.cors {
            router = router.layer(CorsLayer::permissive());
        }

        router
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(
                TraceLayer::new_for_http()
                    .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                    .on_response(DefaultOnResponse::new().level(Level::INFO)),
            )
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
    }

    /// The fully layered router, for in-process use.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Run the server, accepting connections on the given listener.
    ///
    /// Returns once Ctrl+C/SIGTERM arrives or `shutdown` fires, after
    /// in-flight requests have drained.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        let shutdown_requested = async move {
            match shutdown.recv().await {
                // Nobody can trigger us any more; wait for an OS signal instead.
                Err(broadcast::error::RecvError::Closed) => std::future::pending().await,
                _ => tracing::info!("Shutdown requested"),
            }
        };

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                tokio::select! {
                    _ = shutdown_signal() => {}
                    _ = shutdown_requested => {}
                }
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }
}

/// Looks up the route and forwards, or answers 404.
async fn gateway_handler(State(state): State<AppState>, request: Request<Body>) -> Response {
    let start_time = Instant::now();
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown")
        .to_string();

    let path = request.uri().path().to_string();
    let method = request.method().clone();

    tracing::debug!(
        request_id = %request_id,
        method = %method,
        path = %path,
        "Request received"
    );

    let Some(route) = state.routes.match_path(&path) else {
        tracing::warn!(request_id = %request_id, path = %path, "No route matched");
        metrics::record_request("none", method.as_str(), 404, start_time);
        return GatewayError::RouteNotFound.into_response();
    };

    let result = match buffer(request, state.max_body_bytes).await {
        Ok(inbound) => state.dispatcher.dispatch(route, inbound, &request_id).await,
        Err(e) => Err(e),
    };

    let response = result.unwrap_or_else(|e| {
        if e.status() == StatusCode::INTERNAL_SERVER_ERROR {
            metrics::record_upstream_error(&route.name, e.kind());
        } else {
            tracing::warn!(request_id = %request_id, route = %route.name, error = %e, "Request rejected");
        }
        e.into_response()
    });

    metrics::record_request(
        &route.name,
        method.as_str(),
        response.status().as_u16(),
        start_time,
    );
    response
}

/// Buffer the body so the rewriter can inspect it.
async fn buffer(request: Request<Body>, limit: usize) -> Result<InboundRequest, GatewayError> {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let headers = request.headers().clone();

    // Bytes honours the DefaultBodyLimit set on the router.
    let body = Bytes::from_request(request, &()).await.map_err(|rejection| {
        if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
            GatewayError::PayloadTooLarge { limit }
        } else {
            GatewayError::BodyRead(rejection.body_text())
        }
    })?;

    Ok(InboundRequest {
        method,
        uri,
        headers,
        body,
    })
}
