//! Authentication: bearer tokens and password hashing.
//!
//! Tokens are HS256 JWTs carrying the user's id, email and name, valid for
//! seven days from issue. Passwords are stored as bcrypt hashes; hashing and
//! verification run on the blocking pool.

use crate::error::{ApiError, ApiResult, DbError};
use crate::models::PublicUser;
use axum::extract::{FromRef, FromRequestParts};
use axum::http::{HeaderMap, header, request::Parts};
use chrono::Utc;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};

/// Token lifetime in seconds (seven days).
pub const TOKEN_TTL_SECS: i64 = 7 * 24 * 60 * 60;

/// JWT claims.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    pub id: i64,
    pub email: String,
    pub name: String,
    pub iat: i64,
    pub exp: i64,
}

/// Signs and verifies bearer tokens with a shared secret.
pub struct TokenService {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
}

impl std::fmt::Debug for TokenService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenService").finish_non_exhaustive()
    }
}

impl TokenService {
    pub fn new(secret: &str) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "iat"]);
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        }
    }

    /// Issue a token for `user`, valid from now.
    pub fn issue(&self, user: &PublicUser) -> ApiResult<String> {
        self.issue_at(user, Utc::now().timestamp())
    }

    /// Issue a token as if signed at `issued_at` (epoch seconds).
    pub fn issue_at(&self, user: &PublicUser, issued_at: i64) -> ApiResult<String> {
        let claims = Claims {
            id: user.id,
            email: user.email.clone(),
            name: user.name.clone(),
            iat: issued_at,
            exp: issued_at + TOKEN_TTL_SECS,
        };
        jsonwebtoken::encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| ApiError::from(DbError::internal(format!("Cannot sign token: {e}"))))
    }

    /// Check signature and expiry.
    pub fn verify(&self, token: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
        jsonwebtoken::decode::<Claims>(token, &self.decoding, &self.validation)
            .map(|data| data.claims)
    }
}

/// bcrypt with a fixed cost factor.
#[derive(Debug, Clone, Copy)]
pub struct PasswordHasher {
    cost: u32,
}

impl PasswordHasher {
    pub fn new(cost: u32) -> Self {
        Self { cost }
    }

    pub async fn hash(&self, password: String) -> ApiResult<String> {
        let cost = self.cost;
        tokio::task::spawn_blocking(move || bcrypt::hash(password, cost))
            .await
            .map_err(|e| DbError::internal(format!("Hashing task failed: {e}")))?
            .map_err(|e| DbError::internal(format!("Cannot hash password: {e}")).into())
    }

    /// `false` for a wrong password or an unreadable stored hash.
    pub async fn verify(&self, password: String, hash: String) -> ApiResult<bool> {
        let outcome = tokio::task::spawn_blocking(move || bcrypt::verify(password, &hash))
            .await
            .map_err(|e| DbError::internal(format!("Verification task failed: {e}")))?;
        match outcome {
            Ok(matches) => Ok(matches),
            Err(e) => {
                warn!(error = %e, "Stored password hash could not be checked");
                Ok(false)
            }
        }
    }
}

/// Pull the token out of `Authorization: Bearer <token>`.
///
/// `Ok(None)` when the header is absent or carries no token.
pub fn extract_bearer_token(headers: &HeaderMap) -> Result<Option<&str>, &'static str> {
    let Some(auth_header) = headers.get(header::AUTHORIZATION) else {
        return Ok(None);
    };

    let auth_str = auth_header
        .to_str()
        .map_err(|_| "Authorization header contains invalid characters")?;

    let token = auth_str
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty());

    Ok(token)
}

/// Claims of the authenticated caller. Rejects with 401 when no token is
/// supplied and 403 when the token does not verify.
#[derive(Debug, Clone)]
pub struct AuthUser(pub Claims);

impl<S> FromRequestParts<S> for AuthUser
where
    Arc<TokenService>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let token = match extract_bearer_token(&parts.headers) {
            Ok(Some(token)) => token,
            Ok(None) => return Err(ApiError::Unauthorized("Access token required".into())),
            Err(msg) => {
                debug!(reason = msg, "Rejected Authorization header");
                return Err(ApiError::Unauthorized("Access token required".into()));
            }
        };

        let tokens = Arc::<TokenService>::from_ref(state);
        match tokens.verify(token) {
            Ok(claims) => Ok(AuthUser(claims)),
            Err(e) => {
                debug!(error = %e, "Token verification failed");
                Err(ApiError::Forbidden("Invalid or expired token".into()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn alice() -> PublicUser {
        PublicUser {
            id: 1,
            name: "Alice".into(),
            email: "a@x.com".into(),
        }
    }

    #[test]
    fn test_issue_and_verify() {
        let service = TokenService::new("test-secret");
        let token = service.issue(&alice()).unwrap();
        let claims = service.verify(&token).unwrap();
        assert_eq!(claims.id, 1);
        assert_eq!(claims.email, "a@x.com");
        assert_eq!(claims.name, "Alice");
        assert_eq!(claims.exp - claims.iat, 7 * 24 * 60 * 60);
    }

    #[test]
    fn test_token_valid_until_seven_days() {
        let service = TokenService::new("test-secret");
        let now = Utc::now().timestamp();

        let almost_expired = service
            .issue_at(&alice(), now - TOKEN_TTL_SECS + 60)
            .unwrap();
        assert!(service.verify(&almost_expired).is_ok());

        let expired = service
            .issue_at(&alice(), now - TOKEN_TTL_SECS - 60)
            .unwrap();
        assert!(service.verify(&expired).is_err());
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let token = TokenService::new("one").issue(&alice()).unwrap();
        assert!(TokenService::new("two").verify(&token).is_err());
        assert!(TokenService::new("one").verify("not.a.jwt").is_err());
    }

    #[test]
    fn test_extract_bearer_token() {
        let mut headers = HeaderMap::new();
        assert_eq!(extract_bearer_token(&headers), Ok(None));

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer abc"));
        assert_eq!(extract_bearer_token(&headers), Ok(Some("abc")));

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer "));
        assert_eq!(extract_bearer_token(&headers), Ok(None));

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Basic abc"));
        assert_eq!(extract_bearer_token(&headers), Ok(None));
    }

    #[tokio::test]
    async fn test_password_hash_and_verify() {
        let hasher = PasswordHasher::new(4);
        let hash = hasher.hash("secret1".into()).await.unwrap();
        assert_ne!(hash, "secret1");
        assert!(hasher.verify("secret1".into(), hash.clone()).await.unwrap());
        assert!(!hasher.verify("wrong".into(), hash).await.unwrap());
        assert!(!hasher
            .verify("secret1".into(), "not-a-hash".into())
            .await
            .unwrap());
    }
}
