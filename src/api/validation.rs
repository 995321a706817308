use super::ApiError;
use crate::reference::{ReferenceLookup, SubdivisionKey};

pub const INVALID_REFERENCE: &str = "country_alpha2 and subdivision_code are invalid";

pub fn validate_city_id(id: i64) -> Result<i64, ApiError> {
    if id <= 0 {
        return Err(ApiError::validation(format!(
            "Invalid city ID: {id}. ID must be a positive integer"
        )));
    }
    Ok(id)
}

/// Resolves the `{country_alpha2}/subdivision/{subdivision_code}` path pair.
///
/// Malformed and unknown codes produce the same client error.
pub fn validate_subdivision_path(
    reference: &dyn ReferenceLookup,
    country_alpha2: &str,
    subdivision_code: &str,
) -> Result<SubdivisionKey, ApiError> {
    let key = SubdivisionKey::new(country_alpha2, subdivision_code)
        .map_err(|_| ApiError::validation(INVALID_REFERENCE))?;

    if reference.subdivision(&key).is_none() {
        return Err(ApiError::validation(INVALID_REFERENCE));
    }

    Ok(key)
}
