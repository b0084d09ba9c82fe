use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;
use tracing::error;
use uuid::Uuid;

use crate::state::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    status: &'static str,
    registry: &'static str,
    version: &'static str,
}

/// Liveness plus a registry round trip.
pub async fn health_check(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let registry_ok = match state.registry.landlords.find_by_id(&Uuid::nil()).await {
        Ok(_) => true,
        Err(e) => {
            error!("Registry health probe failed: {}", e);
            false
        }
    };

    let (status, label) = if registry_ok {
        (StatusCode::OK, "healthy")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "degraded")
    };
    (
        status,
        Json(HealthResponse {
            status: label,
            registry: if registry_ok { "up" } else { "down" },
            version: env!("CARGO_PKG_VERSION"),
        }),
    )
}
