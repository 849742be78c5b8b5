//! Route lookup.
//!
//! # Responsibilities
//! - Store compiled routes
//! - Look up matching route for a request path
//! - Return matched route or explicit no-match
//!
//! # Design Decisions
//! - Immutable after construction (thread-safe without locks)
//! - O(n) path prefix scan (acceptable for typical route counts)
//! - Explicit NoMatch rather than silent default

use url::Url;

use crate::config::RouteConfig;
use crate::routing::matcher::PathPrefixMatcher;

/// Error raised while compiling routes from config.
#[derive(Debug, thiserror::Error)]
#[error("route '{route}': invalid upstream '{upstream}': {source}")]
pub struct RouteError {
    pub route: String,
    pub upstream: String,
    #[source]
    pub source: url::ParseError,
}

/// A compiled prefix route.
#[derive(Debug, Clone)]
pub struct Route {
    /// Route name (used for logging/metrics).
    pub name: String,
    /// Prefix condition.
    pub matcher: PathPrefixMatcher,
    /// Upstream base URL requests are forwarded to.
    pub upstream: Url,
}

impl Route {
    pub fn prefix(&self) -> &str {
        self.matcher.prefix()
    }

    /// `host[:port]` of the upstream, as it would appear in a Host header.
    pub fn upstream_authority(&self) -> String {
        match (self.upstream.host_str(), self.upstream.port()) {
            (Some(host), Some(port)) => format!("{host}:{port}"),
            (Some(host), None) => host.to_string(),
            _ => String::new(),
        }
    }
}

/// Ordered, immutable route table. First match wins.
#[derive(Debug, Clone)]
pub struct RouteTable {
    routes: Vec<Route>,
}

impl RouteTable {
    /// Compile the route table from configuration, keeping registration order.
    pub fn from_config(configs: &[RouteConfig]) -> Result<Self, RouteError> {
        let routes = configs
            .iter()
            .map(|config| {
                let upstream = Url::parse(&config.upstream).map_err(|source| RouteError {
                    route: config.name.clone(),
                    upstream: config.upstream.clone(),
                    source,
                })?;

                tracing::info!(
                    route = %config.name,
                    prefix = %config.path_prefix,
                    upstream = %upstream,
                    "Route registered"
                );

                Ok(Route {
                    name: config.name.clone(),
                    matcher: PathPrefixMatcher::new(config.path_prefix.clone()),
                    upstream,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { routes })
    }

    /// Find the first route whose prefix matches `path`.
    pub fn match_path(&self, path: &str) -> Option<&Route> {
        self.routes.iter().find(|route| route.matcher.matches(path))
    }

    pub fn routes(&self) -> &[Route] {
        &self.routes
    }
}
