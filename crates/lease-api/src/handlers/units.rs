//! Unit registration, ownership verification and archiving

use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;
use uuid::Uuid;

use lease_core::domain::{Unit, UnitAddress};
use lease_core::services::{NewUnit, OwnershipDocuments, UnitVerificationOutcome};

use crate::security::CurrentLandlord;
use crate::state::AppState;
use crate::utils::error::ApiError;
use crate::utils::multipart::MultipartForm;

#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum RegisterUnitResponse {
    Verified {
        unit: Unit,
    },
    /// Resubmit with `confirmed=true` to accept the deed address.
    NeedsConfirmation {
        user_input_address: String,
        ai_suggested_address: String,
    },
}

fn ownership_documents(form: &mut MultipartForm) -> Result<OwnershipDocuments, ApiError> {
    Ok(OwnershipDocuments::from_uploads(
        form.take_file("titleDeed"),
        form.take_file("utilityBill"),
    )?)
}

/// Multipart: `unitNumber`, `street`, `city`, `province`, `zipCode`,
/// `country`, optional `confirmed`, plus `titleDeed` and `utilityBill` files.
pub async fn register_unit(
    State(state): State<AppState>,
    CurrentLandlord(landlord_id): CurrentLandlord,
    multipart: Multipart,
) -> Result<(StatusCode, Json<RegisterUnitResponse>), ApiError> {
    let mut form = MultipartForm::read(multipart).await?;
    let new_unit = NewUnit {
        unit_number: form.text("unitNumber"),
        address: UnitAddress {
            street: form.text("street"),
            city: form.text("city"),
            province: form.text("province"),
            zip_code: form.text("zipCode"),
            country: form.text("country"),
        },
    };
    let confirmed = form.flag("confirmed");
    let documents = ownership_documents(&mut form)?;

    let outcome = state
        .engine
        .register_unit(landlord_id, new_unit, documents, confirmed)
        .await?;

    Ok(match outcome {
        UnitVerificationOutcome::Verified(unit) => {
            (StatusCode::CREATED, Json(RegisterUnitResponse::Verified { unit }))
        }
        UnitVerificationOutcome::NeedsAddressConfirmation {
            user_input_address,
            ai_suggested_address,
        } => (
            StatusCode::CONFLICT,
            Json(RegisterUnitResponse::NeedsConfirmation {
                user_input_address,
                ai_suggested_address,
            }),
        ),
    })
}

/// Multipart with `titleDeed` and `utilityBill` files.
pub async fn verify_unit(
    State(state): State<AppState>,
    CurrentLandlord(landlord_id): CurrentLandlord,
    Path(unit_id): Path<Uuid>,
    multipart: Multipart,
) -> Result<Json<Unit>, ApiError> {
    let mut form = MultipartForm::read(multipart).await?;
    let documents = ownership_documents(&mut form)?;
    let unit = state.engine.verify_unit(landlord_id, unit_id, documents).await?;
    Ok(Json(unit))
}

pub async fn archive_unit(
    State(state): State<AppState>,
    CurrentLandlord(landlord_id): CurrentLandlord,
    Path(unit_id): Path<Uuid>,
) -> Result<Json<Unit>, ApiError> {
    Ok(Json(state.engine.archive_unit(landlord_id, unit_id).await?))
}

pub async fn restore_unit(
    State(state): State<AppState>,
    CurrentLandlord(landlord_id): CurrentLandlord,
    Path(unit_id): Path<Uuid>,
) -> Result<Json<Unit>, ApiError> {
    Ok(Json(state.engine.restore_unit(landlord_id, unit_id).await?))
}
