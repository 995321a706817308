use axum::{
    Extension, Json,
    extract::{Request, State},
    http::{HeaderMap, header},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;

use super::observability::RequestSpan;
use super::{
    AccessTokenResponse, ApiError, ApiResponse, AppState, ChangePasswordRequest, LoginRequest,
    MessageResponse,
};
use crate::services::{AccountError, AuthError, Identity};

const INVALID_CREDENTIAL: &str = "Invalid credential";

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::InvalidCredentials => Self::unauthorized(INVALID_CREDENTIAL),
            AuthError::InvalidToken => Self::unauthorized("Invalid token"),
            AuthError::TokenIssue(msg) => Self::internal(msg),
        }
    }
}

impl From<AccountError> for ApiError {
    fn from(err: AccountError) -> Self {
        match err {
            AccountError::IncorrectPassword => Self::validation(err.to_string()),
            AccountError::Validation(msg) => Self::validation(msg),
            AccountError::DuplicateUsername(_) => Self::validation("Username already exists"),
            AccountError::NotFound(username) => Self::not_found("User", username),
            AccountError::IntegrityViolation(_) | AccountError::Database(_) => {
                Self::database(err.to_string())
            }
            AccountError::Internal(msg) => Self::internal(msg),
        }
    }
}

// ============================================================================
// Middleware
// ============================================================================

/// Resolves `Authorization: Bearer <token>` (or the legacy `JWT <token>`
/// scheme) and stores the [`Identity`] in the request extensions.
pub async fn require_token(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = extract_token(&headers)
        .ok_or_else(|| ApiError::unauthorized("Authorization required"))?;

    let identity = state.tokens().resolve(token).await?;
    if let Some(span) = request.extensions().get::<RequestSpan>() {
        span.record_user_id(identity.id);
    }

    request.extensions_mut().insert(identity);
    Ok(next.run(request).await)
}

fn extract_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;

    if !(scheme.eq_ignore_ascii_case("Bearer") || scheme.eq_ignore_ascii_case("JWT")) {
        return None;
    }

    let token = token.trim();
    (!token.is_empty()).then_some(token)
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /auth
/// Exchange a username and password for an access token
pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<ApiResponse<AccessTokenResponse>>, ApiError> {
    let identity = state
        .authenticator()
        .authenticate(&payload.username, &payload.password)
        .await?;

    let access_token = state.tokens().issue(&identity)?;

    Ok(Json(ApiResponse::success(AccessTokenResponse {
        access_token,
        token_type: "Bearer",
        expires_in: state.tokens().expiry().as_secs(),
    })))
}

/// GET /protected
/// Echo the identity behind the presented token
pub async fn protected(Extension(identity): Extension<Identity>) -> Json<ApiResponse<Identity>> {
    Json(ApiResponse::success(identity))
}

/// PUT /geolocation/account/password
/// Change the token holder's password (requires current password verification)
pub async fn change_password(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
    Json(payload): Json<ChangePasswordRequest>,
) -> Result<Json<ApiResponse<MessageResponse>>, ApiError> {
    state
        .accounts()
        .update_password(
            &identity.username,
            &payload.current_password,
            &payload.new_password,
        )
        .await?;

    Ok(Json(ApiResponse::success(MessageResponse {
        message: "Password updated successfully".to_string(),
    })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn accepts_bearer_and_jwt_schemes() {
        assert_eq!(extract_token(&headers("Bearer abc.def")), Some("abc.def"));
        assert_eq!(extract_token(&headers("JWT abc.def")), Some("abc.def"));
        assert_eq!(extract_token(&headers("bearer  abc")), Some("abc"));
    }

    #[test]
    fn rejects_other_schemes_and_empty_tokens() {
        assert_eq!(extract_token(&headers("Basic dXNlcjpwYXNz")), None);
        assert_eq!(extract_token(&headers("Bearer ")), None);
        assert_eq!(extract_token(&headers("abc.def")), None);
        assert_eq!(extract_token(&HeaderMap::new()), None);
    }

    #[test]
    fn login_failures_map_to_one_message() {
        match ApiError::from(AuthError::InvalidCredentials) {
            ApiError::Unauthorized(msg) => assert_eq!(msg, INVALID_CREDENTIAL),
            other => panic!("unexpected: {other}"),
        }
    }
}
