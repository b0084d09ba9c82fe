use axum::{
    extract::{FromRequestParts, Request, State},
    http::request::Parts,
    middleware::Next,
    response::Response,
};
use tracing::debug;
use uuid::Uuid;

use super::header_validator::{ValidatedRequest, LANDLORD_HEADER};
use crate::state::AppState;
use crate::utils::error::ApiError;

/// Validate the service headers and stash the result for extractors.
pub async fn security_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let validated = state.header_validator.validate(request.headers())?;

    debug!(
        "Request validated: app_id={}, timestamp={}, landlord={:?}",
        validated.app_id, validated.timestamp, validated.landlord_id
    );

    request.extensions_mut().insert(validated);
    Ok(next.run(request).await)
}

/// The landlord the front end authenticated for this request.
#[derive(Debug, Clone, Copy)]
pub struct CurrentLandlord(pub Uuid);

impl<S: Send + Sync> FromRequestParts<S> for CurrentLandlord {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<ValidatedRequest>()
            .and_then(|v| v.landlord_id)
            .map(CurrentLandlord)
            .ok_or_else(|| ApiError::Unauthorized(format!("{} header required", LANDLORD_HEADER)))
    }
}
