use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    Json,
};
use serde::Serialize;
use tracing::info;

use lease_core::services::CallbackOutcome;

use crate::security::CurrentLandlord;
use crate::state::AppState;
use crate::utils::error::ApiError;

const SIGNATURE_HEADER: &str = "x-hmac-signature";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionResponse {
    pub session_url: String,
}

pub async fn start_session(
    State(state): State<AppState>,
    CurrentLandlord(landlord_id): CurrentLandlord,
) -> Result<(StatusCode, Json<SessionResponse>), ApiError> {
    let session_url = state.identity.start_session(landlord_id).await?;
    Ok((StatusCode::CREATED, Json(SessionResponse { session_url })))
}

#[derive(Debug, Serialize)]
pub struct WebhookResponse {
    pub received: bool,
}

/// Provider decision callback. The signature covers the raw body bytes.
pub async fn webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<WebhookResponse>, ApiError> {
    let signature = headers.get(SIGNATURE_HEADER).and_then(|v| v.to_str().ok());

    match state.identity.handle_callback(&body, signature).await? {
        CallbackOutcome::Applied { landlord_id, status } => {
            info!("KYC decision for {}: {}", landlord_id, status.as_str());
        }
        CallbackOutcome::Ignored => {
            info!("KYC callback acknowledged without a decision");
        }
    }
    Ok(Json(WebhookResponse { received: true }))
}
