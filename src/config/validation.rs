//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, body limit > 0)
//! - Check upstream URLs are absolute http(s) URLs
//! - Detect conflicting routes (duplicates, shadowed prefixes)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: GatewayConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use url::Url;

use crate::config::schema::GatewayConfig;

/// A single semantic problem found in a config.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("no routes configured")]
    NoRoutes,

    #[error("route '{route}': path prefix '{prefix}' must start with '/'")]
    RelativePrefix { route: String, prefix: String },

    #[error("route '{route}': duplicate path prefix '{prefix}'")]
    DuplicatePrefix { route: String, prefix: String },

    #[error("route '{route}': prefix '{prefix}' is unreachable behind route '{shadowed_by}'")]
    ShadowedPrefix {
        route: String,
        prefix: String,
        shadowed_by: String,
    },

    #[error("route '{route}': invalid upstream '{upstream}': {reason}")]
    InvalidUpstream {
        route: String,
        upstream: String,
        reason: String,
    },

    #[error("{field} must be greater than zero")]
    Zero { field: &'static str },

    #[error("upstream override for route '{route}' has no route with that name")]
    UnknownRouteOverride { route: String },
}

/// Validate a parsed configuration.
pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.routes.is_empty() {
        errors.push(ValidationError::NoRoutes);
    }

    for (i, route) in config.routes.iter().enumerate() {
        if !route.path_prefix.starts_with('/') {
            errors.push(ValidationError::RelativePrefix {
                route: route.name.clone(),
                prefix: route.path_prefix.clone(),
            });
        }

        // Earlier routes win, so a later route under an earlier prefix never matches.
        for earlier in &config.routes[..i] {
            if earlier.path_prefix == route.path_prefix {
                errors.push(ValidationError::DuplicatePrefix {
                    route: route.name.clone(),
                    prefix: route.path_prefix.clone(),
                });
            } else if route.path_prefix.starts_with(&earlier.path_prefix) {
                errors.push(ValidationError::ShadowedPrefix {
                    route: route.name.clone(),
                    prefix: route.path_prefix.clone(),
                    shadowed_by: earlier.name.clone(),
                });
            }
        }

        if let Err(reason) = check_upstream(&route.upstream) {
            errors.push(ValidationError::InvalidUpstream {
                route: route.name.clone(),
                upstream: route.upstream.clone(),
                reason,
            });
        }
    }

    if config.timeouts.connect_secs == 0 {
        errors.push(ValidationError::Zero { field: "timeouts.connect_secs" });
    }
    if config.timeouts.upstream_secs == 0 {
        errors.push(ValidationError::Zero { field: "timeouts.upstream_secs" });
    }
    if config.security.max_body_bytes == 0 {
        errors.push(ValidationError::Zero { field: "security.max_body_bytes" });
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_upstream(upstream: &str) -> Result<(), String> {
    let url = Url::parse(upstream).map_err(|e| e.to_string())?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(format!("unsupported scheme '{}'", url.scheme()));
    }
    if url.host_str().is_none() {
        return Err("missing host".to_string());
    }
    if url.query().is_some() {
        return Err("query strings are not allowed in an upstream base".to_string());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::RouteConfig;

    #[test]
    fn test_default_config_is_valid() {
        assert_eq!(validate_config(&GatewayConfig::default()), Ok(()));
    }

    #[test]
    fn test_collects_all_errors() {
        let mut config = GatewayConfig::default();
        config.routes = vec![
            RouteConfig::new("a", "api", "ftp://example.com"),
            RouteConfig::new("b", "/x", "not a url"),
        ];
        config.timeouts.upstream_secs = 0;

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 4);
        assert!(matches!(errors[0], ValidationError::RelativePrefix { .. }));
        assert!(matches!(errors[1], ValidationError::InvalidUpstream { .. }));
        assert!(matches!(errors[2], ValidationError::InvalidUpstream { .. }));
        assert_eq!(errors[3], ValidationError::Zero { field: "timeouts.upstream_secs" });
    }

    #[test]
    fn test_shadowed_and_duplicate_prefixes() {
        let mut config = GatewayConfig::default();
        config.routes = vec![
            RouteConfig::new("spot", "/api", "https://api.binance.com"),
            RouteConfig::new("spot-v3", "/api/v3", "https://api.binance.com"),
            RouteConfig::new("again", "/api", "https://api.binance.com"),
        ];

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(
            errors,
            vec![
                ValidationError::ShadowedPrefix {
                    route: "spot-v3".into(),
                    prefix: "/api/v3".into(),
                    shadowed_by: "spot".into(),
                },
                ValidationError::DuplicatePrefix {
                    route: "again".into(),
                    prefix: "/api".into(),
                },
            ]
        );
    }

    #[test]
    fn test_more_specific_first_is_allowed() {
        let mut config = GatewayConfig::default();
        config.routes = vec![
            RouteConfig::new("spot-v3", "/api/v3", "https://api.binance.com"),
            RouteConfig::new("spot", "/api", "https://api.binance.com"),
        ];
        assert_eq!(validate_config(&config), Ok(()));
    }

    #[test]
    fn test_no_routes() {
        let mut config = GatewayConfig::default();
        config.routes.clear();
        assert_eq!(validate_config(&config), Err(vec![ValidationError::NoRoutes]));
    }
}
