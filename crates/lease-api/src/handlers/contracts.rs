//! Tenant submission and landlord decisions on contracts

use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::info;
use validator::Validate;

use lease_core::domain::{ApprovedContract, Unit};
use lease_core::services::{ApprovalReceipt, InitiationOutcome};

use super::parse_hash;
use crate::security::CurrentLandlord;
use crate::state::AppState;
use crate::utils::error::ApiError;
use crate::utils::multipart::MultipartForm;

#[derive(Debug, Serialize)]
pub struct InitiationResponse {
    #[serde(flatten)]
    pub outcome: InitiationOutcome,
    pub message: &'static str,
}

/// `multipart/form-data` with `contract` (file) and `tenantEmail`.
pub async fn initiate_contract(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<(StatusCode, Json<InitiationResponse>), ApiError> {
    let mut form = MultipartForm::read(multipart).await?;
    let document = form.require_file("contract")?;
    let tenant_email = form.text("tenantEmail");

    let outcome = state.engine.initiate_contract(&document, &tenant_email).await?;
    let status = if outcome.is_new() {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    info!("Contract submission {} -> {:?}", outcome.doc_hash(), status);

    Ok((
        status,
        Json(InitiationResponse {
            message: outcome.message(),
            outcome,
        }),
    ))
}

pub async fn approve_contract(
    State(state): State<AppState>,
    CurrentLandlord(landlord_id): CurrentLandlord,
    Path(doc_hash): Path<String>,
) -> Result<Json<ApprovalReceipt>, ApiError> {
    let doc_hash = parse_hash(&doc_hash)?;
    let receipt = state.engine.approve_contract(landlord_id, &doc_hash).await?;
    state.kick_outbox();
    Ok(Json(receipt))
}

/// Create the unit named in an unmatched contract; it still needs verifying.
pub async fn approve_with_new_unit(
    State(state): State<AppState>,
    CurrentLandlord(landlord_id): CurrentLandlord,
    Path(doc_hash): Path<String>,
) -> Result<(StatusCode, Json<Unit>), ApiError> {
    let doc_hash = parse_hash(&doc_hash)?;
    let unit = state
        .engine
        .approve_and_create_unit(landlord_id, &doc_hash)
        .await?;
    Ok((StatusCode::CREATED, Json(unit)))
}

pub async fn terminate_contract(
    State(state): State<AppState>,
    CurrentLandlord(landlord_id): CurrentLandlord,
    Path(doc_hash): Path<String>,
) -> Result<Json<ApprovedContract>, ApiError> {
    let doc_hash = parse_hash(&doc_hash)?;
    let contract = state.engine.terminate_contract(landlord_id, &doc_hash).await?;
    Ok(Json(contract))
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct InvitationRequest {
    #[validate(email)]
    pub landlord_email: String,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

pub async fn send_invitation(
    State(state): State<AppState>,
    Path(doc_hash): Path<String>,
    Json(request): Json<InvitationRequest>,
) -> Result<(StatusCode, Json<MessageResponse>), ApiError> {
    request
        .validate()
        .map_err(|e| ApiError::BadRequest(e.to_string()))?;
    let doc_hash = parse_hash(&doc_hash)?;

    state
        .engine
        .send_invitation(&doc_hash, &request.landlord_email)
        .await?;
    state.kick_outbox();

    Ok((
        StatusCode::ACCEPTED,
        Json(MessageResponse {
            message: format!("Invitation sent to {}", request.landlord_email),
        }),
    ))
}
