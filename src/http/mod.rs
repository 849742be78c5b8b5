//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, middleware, /health)
//!     → routing::RouteTable (prefix lookup, 404 on miss)
//!     → proxy.rs (buffer body, single upstream call)
//!         → request.rs (rewrite: GET JSON body → query, header cleanup)
//!             → query.rs (flat JSON → urlencoded)
//!     → response.rs (stream upstream response, or JSON error)
//!     → Send to client
//! ```

pub mod health;
pub mod proxy;
pub mod query;
pub mod request;
pub mod response;
pub mod server;

pub use proxy::ProxyDispatcher;
pub use response::{ErrorBody, GatewayError};
pub use server::HttpServer;
