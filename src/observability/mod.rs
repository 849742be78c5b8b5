//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Request path emits:
//!     → tracing events (request received, rewrite applied, upstream done/failed)
//!     → TraceLayer access spans (tower-http)
//!     → metrics.rs (counters, histograms)
//!
//! Consumers:
//!     → logging.rs subscriber (stdout, pretty or JSON)
//!     → Metrics endpoint (Prometheus scrape, optional)
//! ```
//!
//! # Design Decisions
//! - The proxy core only emits structured events; formatting lives here
//! - Request ID flows through every event and to the upstream

pub mod logging;
pub mod metrics;

pub use logging::init_logging;
