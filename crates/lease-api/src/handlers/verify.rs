//! Public verification of on-chain contracts

use axum::{
    extract::{Multipart, Path, State},
    Json,
};

use lease_core::services::{DocumentCheck, PublicVerification};

use super::parse_hash;
use crate::state::AppState;
use crate::utils::error::ApiError;
use crate::utils::multipart::MultipartForm;

pub async fn verify_hash(
    State(state): State<AppState>,
    Path(doc_hash): Path<String>,
) -> Result<Json<PublicVerification>, ApiError> {
    let doc_hash = parse_hash(&doc_hash)?;
    Ok(Json(state.engine.public_verify(&doc_hash).await?))
}

/// Multipart with a `contract` file; answers whether this copy is on the ledger.
pub async fn verify_document(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<DocumentCheck>, ApiError> {
    let mut form = MultipartForm::read(multipart).await?;
    let document = form.require_file("contract")?;
    Ok(Json(state.engine.verify_uploaded_document(&document).await?))
}
