//! Response handling and transformation.
//!
//! # Responsibilities
//! - Relay the upstream response (status, headers, streamed body) to the client
//! - Map gateway failures to fixed JSON error responses
//!
//! # Design Decisions
//! - Streaming responses avoid buffering entire body
//! - Hop-by-hop headers stripped automatically
//! - Error bodies are always `{"error": ..., "message": ...}`, never a backtrace

use std::error::Error as StdError;
use std::io;

use axum::{
    body::Body,
    http::{Response as HttpResponse, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use hyper::body::Incoming;
use hyper_util::client::legacy;
use serde::{Deserialize, Serialize};

use crate::http::query::UnsupportedValueShape;
use crate::http::request::RewriteError;
use crate::security::headers::strip_hop_by_hop;

/// Message returned for paths no route claims.
pub const NOT_FOUND_MESSAGE: &str =
    "Use /api/v3/* for spot/margin API or /fapi/v1/* for futures API";

/// JSON body of every gateway-generated error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    pub message: String,
}

/// Failures contained within a single request.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("no route matches the request path")]
    RouteNotFound,

    #[error("{0}")]
    UpstreamUnreachable(String),

    #[error("{0}")]
    UpstreamTimeout(String),

    #[error("{0}")]
    InvalidTarget(String),

    #[error(transparent)]
    UnsupportedValueShape(#[from] UnsupportedValueShape),

    #[error("request body exceeds {limit} bytes")]
    PayloadTooLarge { limit: usize },

    #[error("failed to read request body: {0}")]
    BodyRead(String),
}

impl GatewayError {
    /// Classify a failed upstream call.
    pub fn from_upstream(err: &legacy::Error) -> Self {
        let message = error_chain(err);
        if is_timeout(err) {
            GatewayError::UpstreamTimeout(message)
        } else {
            GatewayError::UpstreamUnreachable(message)
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            GatewayError::RouteNotFound => StatusCode::NOT_FOUND,
            GatewayError::UpstreamUnreachable(_)
            | GatewayError::UpstreamTimeout(_)
            | GatewayError::InvalidTarget(_) => StatusCode::INTERNAL_SERVER_ERROR,
            GatewayError::UnsupportedValueShape(_) => StatusCode::BAD_REQUEST,
            GatewayError::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            GatewayError::BodyRead(_) => StatusCode::BAD_REQUEST,
        }
    }

    /// Short label used for the `kind` metric label.
    pub fn kind(&self) -> &'static str {
        match self {
            GatewayError::RouteNotFound => "route_not_found",
            GatewayError::UpstreamUnreachable(_) => "upstream_unreachable",
            GatewayError::UpstreamTimeout(_) => "upstream_timeout",
            GatewayError::InvalidTarget(_) => "invalid_target",
            GatewayError::UnsupportedValueShape(_) => "unsupported_value_shape",
            GatewayError::PayloadTooLarge { .. } => "payload_too_large",
            GatewayError::BodyRead(_) => "body_read",
        }
    }

    pub fn body(&self) -> ErrorBody {
        let (error, message) = match self {
            GatewayError::RouteNotFound => ("Not Found", NOT_FOUND_MESSAGE.to_string()),
            GatewayError::UpstreamUnreachable(_)
            | GatewayError::UpstreamTimeout(_)
            | GatewayError::InvalidTarget(_) => ("Proxy error", self.to_string()),
            GatewayError::UnsupportedValueShape(_) => ("Unsupported body", self.to_string()),
            GatewayError::PayloadTooLarge { .. } => ("Payload Too Large", self.to_string()),
            GatewayError::BodyRead(_) => ("Bad Request", self.to_string()),
        };
        ErrorBody {
            error: error.to_string(),
            message,
        }
    }
}

impl From<RewriteError> for GatewayError {
    fn from(err: RewriteError) -> Self {
        match err {
            RewriteError::UnsupportedValueShape(e) => GatewayError::UnsupportedValueShape(e),
            e @ RewriteError::InvalidTarget { .. } => GatewayError::InvalidTarget(e.to_string()),
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        (self.status(), Json(self.body())).into_response()
    }
}

/// True when any error in the chain is an I/O timeout (e.g. connect timeout).
fn is_timeout(err: &(dyn StdError + 'static)) -> bool {
    let mut current = Some(err);
    while let Some(e) = current {
        if e
            .downcast_ref::<io::Error>()
            .is_some_and(|inner| inner.kind() == io::ErrorKind::TimedOut)
        {
            return true;
        }
        current = e.source();
    }
    false
}

/// `err` followed by each of its sources, joined with `": "`.
fn error_chain(err: &(dyn StdError + 'static)) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        let text = cause.to_string();
        if !message.contains(&text) {
            message.push_str(": ");
            message.push_str(&text);
        }
        source = cause.source();
    }
    message
}

/// Convert an upstream response into the client response, streaming the body.
pub fn relay(upstream: HttpResponse<Incoming>) -> Response {
    let (parts, body) = upstream.into_parts();
    let mut headers = parts.headers;
    strip_hop_by_hop(&mut headers);

    // Fresh response so the upstream's HTTP version never leaks to the client.
    let mut response = HttpResponse::new(Body::new(body));
    *response.status_mut() = parts.status;
    *response.headers_mut() = headers;
    response
}
