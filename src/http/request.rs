//! Request transformation for forwarding.
//!
//! # Responsibilities
//! - Build the upstream target from the matched route and the inbound path
//! - Fold a GET request's flat JSON body into the query string
//! - Sanitize headers for the outbound hop
//!
//! # Design Decisions
//! - Pure: no I/O, nothing shared between requests
//! - Non-GET requests and empty bodies are forwarded byte-for-byte
//! - A GET body that is not a non-empty JSON object is left alone
//! - Body-derived parameters come after the original query
//! - The inbound path and query are copied byte-for-byte: no dot-segment
//!   resolution, no re-encoding

use axum::body::Bytes;
use axum::http::{header, uri::InvalidUri, HeaderMap, Method, Uri};
use serde_json::{Map, Value};

use crate::http::query::{self, UnsupportedValueShape};
use crate::routing::Route;
use crate::security::headers::strip_hop_by_hop;

/// An inbound request after its body has been buffered.
#[derive(Debug, Clone)]
pub struct InboundRequest {
    pub method: Method,
    pub uri: Uri,
    pub headers: HeaderMap,
    pub body: Bytes,
}

/// The request actually sent upstream.
#[derive(Debug, Clone)]
pub struct UpstreamRequest {
    pub uri: Uri,
    pub method: Method,
    pub headers: HeaderMap,
    pub body: Option<Bytes>,
    /// True when the body was folded into the query string.
    pub rewritten: bool,
}

/// Why a request could not be rewritten.
#[derive(Debug, thiserror::Error)]
pub enum RewriteError {
    #[error(transparent)]
    UnsupportedValueShape(#[from] UnsupportedValueShape),

    #[error("cannot build upstream target '{target}': {source}")]
    InvalidTarget {
        target: String,
        #[source]
        source: InvalidUri,
    },
}

/// Produce the upstream request for `req` on `route`.
pub fn rewrite(req: InboundRequest, route: &Route) -> Result<UpstreamRequest, RewriteError> {
    let InboundRequest {
        method,
        uri,
        mut headers,
        body,
    } = req;

    let path_and_query = uri
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or_else(|| uri.path());

    strip_hop_by_hop(&mut headers);
    // changeOrigin: the client derives Host from the target URL.
    headers.remove(header::HOST);

    let (path_and_query, body, rewritten) = match query_fields(&method, &body) {
        Some(fields) => {
            let encoded = query::encode(&fields)?;
            headers.remove(header::CONTENT_TYPE);
            headers.remove(header::CONTENT_LENGTH);
            (append_query(path_and_query, &encoded), None, true)
        }
        None => {
            let body = (!body.is_empty()).then_some(body);
            (path_and_query.to_string(), body, false)
        }
    };

    let uri = upstream_uri(route, &path_and_query)?;

    Ok(UpstreamRequest {
        uri,
        method,
        headers,
        body,
        rewritten,
    })
}

/// The body's fields, if this request is a candidate for query rewriting.
fn query_fields(method: &Method, body: &Bytes) -> Option<Map<String, Value>> {
    if *method != Method::GET || body.is_empty() {
        return None;
    }
    match serde_json::from_slice::<Value>(body) {
        Ok(Value::Object(fields)) if !fields.is_empty() => Some(fields),
        _ => None,
    }
}

/// Append an encoded query to a path that may already carry one.
pub fn append_query(path_and_query: &str, encoded: &str) -> String {
    if encoded.is_empty() {
        return path_and_query.to_string();
    }
    let separator = match path_and_query.find('?') {
        None => "?",
        Some(_) if path_and_query.ends_with(['?', '&']) => "",
        Some(_) => "&",
    };
    format!("{path_and_query}{separator}{encoded}")
}

/// Join the upstream base with the inbound path, keeping any base path.
///
/// Built as an `http::Uri` so the path reaches the upstream exactly as the
/// client sent it.
fn upstream_uri(route: &Route, path_and_query: &str) -> Result<Uri, RewriteError> {
    let target = format!(
        "{}://{}{}{}",
        route.upstream.scheme(),
        route.upstream_authority(),
        route.upstream.path().trim_end_matches('/'),
        path_and_query
    );
    target
        .parse::<Uri>()
        .map_err(|source| RewriteError::InvalidTarget { target, source })
}
