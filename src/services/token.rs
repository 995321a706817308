//! Bearer tokens that map back to a current user record.

use std::time::Duration;

use chrono::Utc;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::config::SecurityConfig;
use crate::db::Store;
use crate::domain::Lookup;
use crate::services::auth_service::{AuthError, Identity};

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub identity: i32,
    pub iat: i64,
    pub nbf: i64,
    pub exp: i64,
}

#[derive(Clone)]
pub struct TokenService {
    store: Store,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    expiry: Duration,
}

impl TokenService {
    #[must_use]
    pub fn new(store: Store, config: &SecurityConfig) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = config.token_leeway_seconds;
        validation.validate_nbf = true;
        validation.set_required_spec_claims(&["exp", "nbf", "iat"]);

        Self {
            store,
            encoding_key: EncodingKey::from_secret(config.token_secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(config.token_secret.as_bytes()),
            validation,
            expiry: Duration::from_secs(config.token_expiry_seconds),
        }
    }

    #[must_use]
    pub const fn expiry(&self) -> Duration {
        self.expiry
    }

    /// Issues a signed token for an identity that has just authenticated.
    pub fn issue(&self, identity: &Identity) -> Result<String, AuthError> {
        let now = Utc::now().timestamp();
        let lifetime = i64::try_from(self.expiry.as_secs())
            .map_err(|_| AuthError::TokenIssue("token lifetime out of range".to_string()))?;

        let claims = Claims {
            identity: identity.id,
            iat: now,
            nbf: now,
            exp: now + lifetime,
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| AuthError::TokenIssue(e.to_string()))
    }

    /// Resolves a token to the enabled user it was issued for.
    pub async fn resolve(&self, token: &str) -> Result<Identity, AuthError> {
        let claims = decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map_err(|e| {
                debug!(error = %e, "Rejected bearer token");
                AuthError::InvalidToken
            })?
            .claims;

        match self.store.find_user_by_id(claims.identity).await {
            Ok(Lookup::Found(user)) if user.enabled => Ok(Identity::from(user)),
            Ok(Lookup::Found(_)) => {
                debug!(user_id = claims.identity, "Token holder is disabled");
                Err(AuthError::InvalidToken)
            }
            Ok(Lookup::NotFound) => {
                debug!(user_id = claims.identity, "Token holder no longer exists");
                Err(AuthError::InvalidToken)
            }
            Ok(Lookup::IntegrityViolation(n)) => {
                error!(user_id = claims.identity, rows = n, "Duplicate user id");
                Err(AuthError::InvalidToken)
            }
            Err(e) => {
                error!(error = %e, "Failed to load token holder");
                Err(AuthError::InvalidToken)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::NewUser;
    use crate::domain::utc_timestamp;

    fn config() -> SecurityConfig {
        SecurityConfig {
            token_secret: "test-secret".to_string(),
            ..SecurityConfig::default()
        }
    }

    async fn setup() -> (Store, TokenService, Identity) {
        let store = Store::new("sqlite::memory:").await.unwrap();
        let user = store
            .insert_user(
                NewUser {
                    username: "admin".to_string(),
                    password_hash: "unused".to_string(),
                    salt: "unused".to_string(),
                    enabled: true,
                },
                utc_timestamp(),
            )
            .await
            .unwrap();
        let tokens = TokenService::new(store.clone(), &config());
        (store, tokens, Identity::from(user))
    }

    #[tokio::test]
    async fn issued_token_resolves_to_its_user() {
        let (_store, tokens, identity) = setup().await;
        let token = tokens.issue(&identity).unwrap();

        let resolved = tokens.resolve(&token).await.unwrap();
        assert_eq!(resolved.id, identity.id);
        assert_eq!(resolved.username, "admin");
    }

    #[tokio::test]
    async fn tampered_or_foreign_tokens_fail() {
        let (store, tokens, identity) = setup().await;
        let token = tokens.issue(&identity).unwrap();

        let mut tampered = token.clone();
        tampered.push('x');
        assert!(matches!(
            tokens.resolve(&tampered).await,
            Err(AuthError::InvalidToken)
        ));

        let other = TokenService::new(
            store,
            &SecurityConfig {
                token_secret: "another-secret".to_string(),
                ..SecurityConfig::default()
            },
        );
        assert!(other.resolve(&token).await.is_err());
        assert!(tokens.resolve("not a token").await.is_err());
    }

    #[tokio::test]
    async fn token_for_deleted_user_fails() {
        let (store, tokens, identity) = setup().await;
        let token = tokens.issue(&identity).unwrap();

        let user = store.find_user_by_id(identity.id).await.unwrap().found().unwrap();
        store.delete_user(user).await.unwrap();

        assert!(matches!(
            tokens.resolve(&token).await,
            Err(AuthError::InvalidToken)
        ));
    }

    #[tokio::test]
    async fn token_for_disabled_user_fails() {
        let (store, tokens, identity) = setup().await;
        let token = tokens.issue(&identity).unwrap();

        let user = store.find_user_by_id(identity.id).await.unwrap().found().unwrap();
        store.set_user_enabled(user, false).await.unwrap();

        assert!(tokens.resolve(&token).await.is_err());
    }

    #[tokio::test]
    async fn expired_token_fails() {
        let (_store, tokens, identity) = setup().await;
        let past = Utc::now().timestamp() - 3600;
        let claims = Claims {
            identity: identity.id,
            iat: past,
            nbf: past,
            exp: past + 60,
        };
        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(b"test-secret"),
        )
        .unwrap();

        assert!(matches!(
            tokens.resolve(&token).await,
            Err(AuthError::InvalidToken)
        ));
    }
}
