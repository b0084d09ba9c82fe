//! Serves stored documents behind signed, expiring links

use axum::{
    extract::{Path, Query, State},
    http::header,
    response::IntoResponse,
};
use serde::Deserialize;

use lease_infrastructure::storage::content_type;

use crate::state::AppState;
use crate::utils::error::ApiError;

#[derive(Debug, Deserialize)]
pub struct SignedQuery {
    pub expires: i64,
    pub signature: String,
}

pub async fn signed_file(
    State(state): State<AppState>,
    Path(key): Path<String>,
    Query(query): Query<SignedQuery>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .storage
        .verify_read(&key, query.expires, &query.signature)?;
    let bytes = state.storage.read(&key).await?;

    Ok((
        [
            (header::CONTENT_TYPE, content_type(&key)),
            (header::CACHE_CONTROL, "private, max-age=300"),
        ],
        bytes,
    ))
}
