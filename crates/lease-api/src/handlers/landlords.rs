use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::info;
use validator::Validate;

use lease_core::domain::{BlobKey, Landlord};
use lease_core::services::LandlordDashboard;

use crate::security::CurrentLandlord;
use crate::state::AppState;
use crate::utils::error::ApiError;

#[derive(Debug, Deserialize, Validate)]
pub struct RegisterLandlordRequest {
    /// Must match the name printed on contracts, deeds and bills.
    #[validate(length(min = 2, max = 200))]
    pub name: String,
    #[validate(email)]
    pub email: String,
    #[validate(length(max = 32))]
    pub phone: Option<String>,
}

pub async fn register_landlord(
    State(state): State<AppState>,
    Json(request): Json<RegisterLandlordRequest>,
) -> Result<(StatusCode, Json<Landlord>), ApiError> {
    request
        .validate()
        .map_err(|e| ApiError::BadRequest(e.to_string()))?;

    let mut landlord = Landlord::new(request.name.trim(), request.email.trim());
    landlord.phone = request.phone.filter(|p| !p.trim().is_empty());

    let landlord = state.registry.landlords.create(&landlord).await?;
    info!("Landlord {} registered", landlord.id);
    Ok((StatusCode::CREATED, Json(landlord)))
}

pub async fn dashboard(
    State(state): State<AppState>,
    CurrentLandlord(landlord_id): CurrentLandlord,
) -> Result<Json<LandlordDashboard>, ApiError> {
    Ok(Json(state.engine.landlord_dashboard(landlord_id).await?))
}

#[derive(Debug, Deserialize)]
pub struct DocumentQuery {
    pub key: String,
}

#[derive(Debug, Serialize)]
pub struct DocumentUrlResponse {
    pub url: String,
}

pub async fn document_url(
    State(state): State<AppState>,
    CurrentLandlord(landlord_id): CurrentLandlord,
    Query(query): Query<DocumentQuery>,
) -> Result<Json<DocumentUrlResponse>, ApiError> {
    let url = state
        .engine
        .document_url(landlord_id, &BlobKey(query.key))
        .await?;
    Ok(Json(DocumentUrlResponse { url }))
}
