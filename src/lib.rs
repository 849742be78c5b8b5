//! Binance API proxy gateway library.
//!
//! Forwards `/api/*` to the spot upstream and `/fapi/*` to the futures
//! upstream, folding GET JSON bodies into query strings on the way.

pub mod config;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod routing;
pub mod security;

pub use config::GatewayConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
