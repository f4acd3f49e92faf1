/// `GET /health`
///
/// Unauthenticated. Always answers 200; a store that cannot be reached shows
/// up as `"status": "degraded"` so load balancers can tell a dead process
/// from a dead database.
///
/// ```json
/// { "status": "ok", "version": "0.1.0", "database": "up" }
/// ```

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};

use crate::app::AppState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Ok,
    Degraded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComponentStatus {
    Up,
    Down,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: HealthStatus,
    pub version: String,
    pub database: ComponentStatus,
}

pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let (status, database) = match state.services.store.health_check().await {
        Ok(()) => (HealthStatus::Ok, ComponentStatus::Up),
        Err(e) => {
            tracing::warn!(error = %e, "Store unreachable during health check");
            (HealthStatus::Degraded, ComponentStatus::Down)
        }
    };

    Json(HealthResponse {
        status,
        version: env!("CARGO_PKG_VERSION").to_string(),
        database,
    })
}
