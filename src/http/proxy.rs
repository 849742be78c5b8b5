//! Forwarding a matched request to its upstream.
//!
//! # Responsibilities
//! - Rewrite the buffered inbound request for the matched route
//! - Issue exactly one upstream call, bounded by the upstream timeout
//! - Relay the upstream response as a stream
//!
//! # Design Decisions
//! - No retries, no caching, no circuit breaking: one hop per request
//! - Redirects are returned to the caller, never followed
//! - System proxy variables are ignored; upstreams are dialed directly
//! - The target URI is sent as built, so the path is never normalized
//! - Dropping the returned future (client went away) cancels the upstream call

use std::time::Duration;

use axum::{
    body::Body,
    http::{Request, Response as HttpResponse},
    response::Response,
};
use hyper::body::Incoming;
use hyper_rustls::{HttpsConnector, HttpsConnectorBuilder};
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use tokio::time;

use crate::config::TimeoutConfig;
use crate::http::request::{rewrite, InboundRequest, UpstreamRequest};
use crate::http::response::{relay, GatewayError};
use crate::routing::Route;

type UpstreamClient = Client<HttpsConnector<HttpConnector>, Body>;

/// Sends rewritten requests upstream. Cheap to share; holds the client pool.
#[derive(Clone)]
pub struct ProxyDispatcher {
    client: UpstreamClient,
    upstream_timeout: Duration,
}

impl ProxyDispatcher {
    /// Build the dispatcher and its pooled HTTP client.
    ///
    /// Upstreams may be `https` (webpki roots) or plain `http`.
    pub fn new(timeouts: &TimeoutConfig) -> Result<Self, rustls::Error> {
        let mut http = HttpConnector::new();
        http.enforce_http(false);
        http.set_connect_timeout(Some(Duration::from_secs(timeouts.connect_secs)));

        let https = HttpsConnectorBuilder::new()
            .with_provider_and_webpki_roots(rustls::crypto::ring::default_provider())?
            .https_or_http()
            .enable_http1()
            .wrap_connector(http);

        let client = Client::builder(TokioExecutor::new()).build(https);

        Ok(Self {
            client,
            upstream_timeout: Duration::from_secs(timeouts.upstream_secs),
        })
    }

    /// Forward `req` to `route`'s upstream and return its response.
    pub async fn dispatch(
        &self,
        route: &Route,
        req: InboundRequest,
        request_id: &str,
    ) -> Result<Response, GatewayError> {
        let upstream = rewrite(req, route)?;

        if upstream.rewritten {
            tracing::debug!(
                request_id = %request_id,
                route = %route.name,
                target = %upstream.uri,
                "GET body rewritten into query string"
            );
        }

        tracing::info!(
            request_id = %request_id,
            route = %route.name,
            method = %upstream.method,
            target = %upstream.uri,
            "Forwarding request"
        );

        let response = self.send(upstream).await.map_err(|e| {
            tracing::error!(
                request_id = %request_id,
                route = %route.name,
                error = %e,
                "Upstream error"
            );
            e
        })?;

        tracing::debug!(
            request_id = %request_id,
            route = %route.name,
            status = %response.status(),
            "Upstream responded"
        );

        Ok(relay(response))
    }

    async fn send(&self, upstream: UpstreamRequest) -> Result<HttpResponse<Incoming>, GatewayError> {
        let UpstreamRequest {
            uri,
            method,
            headers,
            body,
            ..
        } = upstream;

        let mut request = Request::new(body.map(Body::from).unwrap_or_else(Body::empty));
        *request.method_mut() = method;
        *request.uri_mut() = uri;
        *request.headers_mut() = headers;

        match time::timeout(self.upstream_timeout, self.client.request(request)).await {
            Ok(Ok(response)) => Ok(response),
            Ok(Err(e)) => Err(GatewayError::from_upstream(&e)),
            Err(_) => Err(GatewayError::UpstreamTimeout(format!(
                "upstream did not respond within {}s",
                self.upstream_timeout.as_secs()
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RouteConfig;
    use crate::routing::RouteTable;
    use axum::body::Bytes;
    use axum::http::{HeaderMap, Method, StatusCode};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    fn route_to(upstream: String) -> Route {
        RouteTable::from_config(&[RouteConfig::new("spot", "/api", upstream)])
            .unwrap()
            .routes()[0]
            .clone()
    }

    fn get(uri: &str, body: &'static str) -> InboundRequest {
        InboundRequest {
            method: Method::GET,
            uri: uri.parse().unwrap(),
            headers: HeaderMap::new(),
            body: Bytes::from_static(body.as_bytes()),
        }
    }

    #[tokio::test]
    async fn test_unreachable_upstream() {
        // Bind then drop to get a port nobody listens on.
        let addr = TcpListener::bind("127.0.0.1:0").await.unwrap().local_addr().unwrap();
        let dispatcher = ProxyDispatcher::new(&TimeoutConfig::default()).unwrap();

        let err = dispatcher
            .dispatch(&route_to(format!("http://{addr}")), get("/api/v3/ping", ""), "t")
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::UpstreamUnreachable(_)));
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn test_upstream_timeout() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            // Accept and never answer.
            let (_socket, _) = listener.accept().await.unwrap();
            time::sleep(Duration::from_secs(10)).await;
        });

        let mut dispatcher = ProxyDispatcher::new(&TimeoutConfig::default()).unwrap();
        dispatcher.upstream_timeout = Duration::from_millis(200);

        let err = dispatcher
            .dispatch(&route_to(format!("http://{addr}")), get("/api/v3/ping", ""), "t")
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::UpstreamTimeout(_)));
    }

    #[tokio::test]
    async fn test_nested_body_never_reaches_upstream() {
        let dispatcher = ProxyDispatcher::new(&TimeoutConfig::default()).unwrap();
        let err = dispatcher
            .dispatch(
                &route_to("http://127.0.0.1:9".into()),
                get("/api/v3/order", r#"{"filters":{"a":1}}"#),
                "t",
            )
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::UnsupportedValueShape(_)));
    }

    /// One-shot upstream that answers 200 and reports the raw request head.
    async fn capture_upstream() -> (String, tokio::sync::oneshot::Receiver<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (seen_tx, seen_rx) = tokio::sync::oneshot::channel();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = vec![0u8; 4096];
            let n = socket.read(&mut buf).await.unwrap();
            let _ = seen_tx.send(String::from_utf8_lossy(&buf[..n]).into_owned());
            socket
                .write_all(b"HTTP/1.1 200 OK\r\nContent-Length: 2\r\nConnection: close\r\n\r\n{}")
                .await
                .unwrap();
            let _ = socket.shutdown().await;
        });
        (format!("http://{addr}"), seen_rx)
    }

    #[tokio::test]
    async fn test_path_and_query_reach_upstream_unnormalized() {
        let (upstream, seen) = capture_upstream().await;
        let dispatcher = ProxyDispatcher::new(&TimeoutConfig::default()).unwrap();
        let req = InboundRequest {
            method: Method::POST,
            uri: "/api/v3/../%2e%2e/sapi/v1/account?note=it's&signature=abc"
                .parse()
                .unwrap(),
            headers: HeaderMap::new(),
            body: Bytes::new(),
        };

        let response = dispatcher.dispatch(&route_to(upstream), req, "t").await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let seen = seen.await.unwrap();
        assert!(
            seen.starts_with(
                "POST /api/v3/../%2e%2e/sapi/v1/account?note=it's&signature=abc HTTP/1.1\r\n"
            ),
            "upstream saw: {seen}"
        );
    }

    #[tokio::test]
    async fn test_relays_status_and_body() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (seen_tx, seen_rx) = tokio::sync::oneshot::channel::<String>();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = vec![0u8; 4096];
            let n = socket.read(&mut buf).await.unwrap();
            let _ = seen_tx.send(String::from_utf8_lossy(&buf[..n]).into_owned());
            let body = r#"{"code":-1121,"msg":"Invalid symbol."}"#;
            let response = format!(
                "HTTP/1.1 400 Bad Request\r\nContent-Type: application/json\r\nX-Mbx-Used-Weight: 2\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                body.len(),
                body
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            let _ = socket.shutdown().await;
        });

        let dispatcher = ProxyDispatcher::new(&TimeoutConfig::default()).unwrap();
        let response = dispatcher
            .dispatch(
                &route_to(format!("http://{addr}")),
                get("/api/v3/order", r#"{"symbol":"NOPE"}"#),
                "t",
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(response.headers()["x-mbx-used-weight"], "2");
        assert!(!response.headers().contains_key("connection"));
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&bytes[..], br#"{"code":-1121,"msg":"Invalid symbol."}"#);

        let seen = seen_rx.await.unwrap();
        assert!(seen.starts_with("GET /api/v3/order?symbol=NOPE HTTP/1.1\r\n"));
        assert!(seen.to_ascii_lowercase().contains(&format!("host: {addr}")));
    }
}
