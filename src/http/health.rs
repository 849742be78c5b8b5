//! Liveness endpoint.
//!
//! Answers from local state only; upstream reachability never affects it.

use axum::Json;
use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// Service identity reported by `/health`.
pub const SERVICE_NAME: &str = "bn-api-proxy-service";

/// Path of the liveness endpoint.
pub const HEALTH_PATH: &str = "/health";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    /// RFC 3339 UTC timestamp with millisecond precision.
    pub timestamp: String,
    pub service: String,
}

impl HealthStatus {
    pub fn now() -> Self {
        Self {
            status: "ok".to_string(),
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            service: SERVICE_NAME.to_string(),
        }
    }
}

pub async fn health_check() -> Json<HealthStatus> {
    Json(HealthStatus::now())
}
