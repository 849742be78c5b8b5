//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request:
//!     → DefaultBodyLimit, enforced while buffering (http::server)
//!     → headers.rs (strip hop-by-hop before forwarding)
//!     → Pass to routing
//!
//! Outgoing response:
//!     → headers.rs (strip hop-by-hop, add security headers)
//!     → CorsLayer (permissive, when enabled)
//! ```
//!
//! # Design Decisions
//! - No trust in client framing headers
//! - Upstream-provided headers win over our defaults

pub mod headers;
