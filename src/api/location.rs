//! Country, subdivision and city endpoints under `/geolocation`.
//!
//! Reads are public. City writes sit behind [`super::auth::require_token`].
//! Reference and persistence rules live in [`crate::services::CityRegistry`];
//! handlers only resolve path parameters and map errors.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use std::sync::Arc;

use super::validation::{INVALID_REFERENCE, validate_city_id, validate_subdivision_path};
use super::{ApiError, ApiResponse, AppState, CreateCityRequest, UpdateCityRequest};
use crate::reference::{Country, Subdivision, SubdivisionKey};
use crate::services::{City, CityError};

impl From<CityError> for ApiError {
    fn from(err: CityError) -> Self {
        match err {
            CityError::Length => Self::validation("City name length"),
            CityError::InvalidReference(_) => Self::validation(INVALID_REFERENCE),
            CityError::Duplicate { .. } => Self::validation("City already exists"),
            CityError::NotFound(id) => Self::not_found("City", id),
            CityError::IntegrityViolation(_) | CityError::Database(_) => {
                Self::database(err.to_string())
            }
        }
    }
}

/// GET /geolocation/country/
pub async fn list_countries(
    State(state): State<Arc<AppState>>,
) -> Json<ApiResponse<Vec<Country>>> {
    Json(ApiResponse::success(state.reference().countries().to_vec()))
}

/// GET /geolocation/country/{country_alpha2}
pub async fn get_country(
    State(state): State<Arc<AppState>>,
    Path(country_alpha2): Path<String>,
) -> Result<Json<ApiResponse<Country>>, ApiError> {
    let country = state
        .reference()
        .country(&country_alpha2)
        .cloned()
        .ok_or_else(|| ApiError::not_found("Country", &country_alpha2))?;

    Ok(Json(ApiResponse::success(country)))
}

/// GET /geolocation/country/{country_alpha2}/subdivision/
pub async fn list_subdivisions(
    State(state): State<Arc<AppState>>,
    Path(country_alpha2): Path<String>,
) -> Result<Json<ApiResponse<Vec<Subdivision>>>, ApiError> {
    let subdivisions = state
        .reference()
        .subdivisions(&country_alpha2)
        .ok_or_else(|| ApiError::not_found("Subdivisions for country", &country_alpha2))?
        .into_iter()
        .cloned()
        .collect();

    Ok(Json(ApiResponse::success(subdivisions)))
}

/// GET /geolocation/country/{country_alpha2}/subdivision/{subdivision_code}
pub async fn get_subdivision(
    State(state): State<Arc<AppState>>,
    Path((country_alpha2, subdivision_code)): Path<(String, String)>,
) -> Result<Json<ApiResponse<Subdivision>>, ApiError> {
    let not_found = || {
        ApiError::not_found("Subdivision", format!("{country_alpha2}-{subdivision_code}"))
    };

    let key = SubdivisionKey::new(&country_alpha2, &subdivision_code).map_err(|_| not_found())?;
    let subdivision = state
        .reference()
        .subdivision(&key)
        .cloned()
        .ok_or_else(not_found)?;

    Ok(Json(ApiResponse::success(subdivision)))
}

/// GET /geolocation/country/{country_alpha2}/subdivision/{subdivision_code}/city/
///
/// Ordered by name. A path that cannot name a subdivision simply has no cities.
pub async fn list_cities(
    State(state): State<Arc<AppState>>,
    Path((country_alpha2, subdivision_code)): Path<(String, String)>,
) -> Result<Json<ApiResponse<Vec<City>>>, ApiError> {
    let Ok(key) = SubdivisionKey::new(&country_alpha2, &subdivision_code) else {
        return Ok(Json(ApiResponse::success(Vec::new())));
    };

    let cities = state.cities().list(&key).await?;
    Ok(Json(ApiResponse::success(cities)))
}

/// POST /geolocation/country/{country_alpha2}/subdivision/{subdivision_code}/city/
pub async fn create_city(
    State(state): State<Arc<AppState>>,
    Path((country_alpha2, subdivision_code)): Path<(String, String)>,
    Json(payload): Json<CreateCityRequest>,
) -> Result<(StatusCode, Json<ApiResponse<City>>), ApiError> {
    let subdivision = format!("{country_alpha2}-{subdivision_code}");
    let city = state.cities().create(&payload.name, &subdivision).await?;

    Ok((StatusCode::CREATED, Json(ApiResponse::success(city))))
}

/// GET /geolocation/country/{country_alpha2}/subdivision/{subdivision_code}/city/{id}
pub async fn get_city(
    State(state): State<Arc<AppState>>,
    Path((country_alpha2, subdivision_code, id)): Path<(String, String, i64)>,
) -> Result<Json<ApiResponse<City>>, ApiError> {
    validate_subdivision_path(state.reference(), &country_alpha2, &subdivision_code)?;
    let id = validate_city_id(id)?;

    let city = state.cities().get(id).await?;
    Ok(Json(ApiResponse::success(city)))
}

/// PUT /geolocation/country/{country_alpha2}/subdivision/{subdivision_code}/city/{id}
pub async fn update_city(
    State(state): State<Arc<AppState>>,
    Path((country_alpha2, subdivision_code, id)): Path<(String, String, i64)>,
    Json(payload): Json<UpdateCityRequest>,
) -> Result<StatusCode, ApiError> {
    validate_subdivision_path(state.reference(), &country_alpha2, &subdivision_code)?;
    let id = validate_city_id(id)?;

    state
        .cities()
        .update(id, &payload.name, &payload.subdivision)
        .await?;

    Ok(StatusCode::NO_CONTENT)
}

/// DELETE /geolocation/country/{country_alpha2}/subdivision/{subdivision_code}/city/{id}
pub async fn delete_city(
    State(state): State<Arc<AppState>>,
    Path((country_alpha2, subdivision_code, id)): Path<(String, String, i64)>,
) -> Result<StatusCode, ApiError> {
    validate_subdivision_path(state.reference(), &country_alpha2, &subdivision_code)?;
    let id = validate_city_id(id)?;

    state.cities().delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
