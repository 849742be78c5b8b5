//! Configuration loading from disk and the environment.

use std::fs;
use std::path::Path;

use crate::config::schema::GatewayConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Settings supplied on the command line or through environment variables.
///
/// Each `Some` wins over whatever the config file (or the defaults) said.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub port: Option<u16>,
    pub spot_base_url: Option<String>,
    pub futures_base_url: Option<String>,
    pub upstream_timeout_secs: Option<u64>,
    pub log_level: Option<String>,
}

impl ConfigOverrides {
    /// Apply the overrides in place.
    ///
    /// Returns one error per upstream override whose route the config does
    /// not define.
    pub fn apply(self, config: &mut GatewayConfig) -> Vec<ValidationError> {
        let mut errors = Vec::new();
        if let Some(port) = self.port {
            config.listener.port = port;
        }
        if let Some(url) = self.spot_base_url {
            errors.extend(set_upstream(config, "spot", url));
        }
        if let Some(url) = self.futures_base_url {
            errors.extend(set_upstream(config, "futures", url));
        }
        if let Some(secs) = self.upstream_timeout_secs {
            config.timeouts.upstream_secs = secs;
        }
        if let Some(level) = self.log_level {
            config.observability.log_level = level;
        }
        errors
    }
}

fn set_upstream(
    config: &mut GatewayConfig,
    route: &str,
    url: String,
) -> Option<ValidationError> {
    match config.route_mut(route) {
        Some(r) => {
            r.upstream = url;
            None
        }
        None => Some(ValidationError::UnknownRouteOverride {
            route: route.to_string(),
        }),
    }
}

/// Parse a TOML document into a config without validating it.
pub fn parse_config(content: &str) -> Result<GatewayConfig, ConfigError> {
    Ok(toml::from_str(content)?)
}

/// Build the effective configuration.
///
/// Starts from the defaults (or the TOML file at `path`), applies the
/// overrides, then validates the result.
pub fn load_config(
    path: Option<&Path>,
    overrides: ConfigOverrides,
) -> Result<GatewayConfig, ConfigError> {
    let mut config = match path {
        Some(path) => parse_config(&fs::read_to_string(path)?)?,
        None => GatewayConfig::default(),
    };

    let mut errors = overrides.apply(&mut config);
    if let Err(found) = validate_config(&config) {
        errors.extend(found);
    }
    if !errors.is_empty() {
        return Err(ConfigError::Validation(errors));
    }

    Ok(config)
}
