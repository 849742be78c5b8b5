//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! .env (optional) → process environment
//! defaults or TOML file (--config)
//!     → loader.rs (parse & deserialize)
//!     → ConfigOverrides (CLI flags / PORT, BN_*_API_BASE_URL, ...)
//!     → validation.rs (semantic checks)
//!     → GatewayConfig (validated, immutable)
//!     → consumed once at startup by the route table and HTTP server
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; there is no hot reload
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, ConfigError, ConfigOverrides};
pub use schema::{
    GatewayConfig, ListenerConfig, LogFormat, ObservabilityConfig, RouteConfig, SecurityConfig,
    TimeoutConfig,
};
pub use validation::ValidationError;
