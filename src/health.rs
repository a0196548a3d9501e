//! Health and info endpoints for worker processes.

use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

/// Liveness payload returned by `/_healthcheck`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthStatus {
    pub alive: bool,
}

/// Service identity returned by `/_info`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceInfo {
    pub server: String,
    pub version: String,
}

impl ServiceInfo {
    #[must_use]
    pub fn new(server: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            server: server.into(),
            version: version.into(),
        }
    }
}

/// Router exposing `/_healthcheck` and `/_info` for one worker process.
pub fn health_router(info: ServiceInfo) -> Router {
    Router::new()
        .route("/_healthcheck", get(healthcheck))
        .route("/_info", get(move || async move { Json(info) }))
}

async fn healthcheck() -> Json<HealthStatus> {
    Json(HealthStatus { alive: true })
}
