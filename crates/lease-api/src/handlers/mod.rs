pub mod contracts;
pub mod files;
pub mod health;
pub mod kyc;
pub mod landlords;
pub mod units;
pub mod verify;

use crate::utils::error::ApiError;
use lease_core::DocumentHash;

/// Document hash from a path segment; any case, with or without `0x`.
pub(crate) fn parse_hash(raw: &str) -> Result<DocumentHash, ApiError> {
    Ok(raw.parse::<DocumentHash>()?)
}
