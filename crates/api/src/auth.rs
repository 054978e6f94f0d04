//! Bearer token issuance, verification and role gating.

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::Response;
use chrono::{DateTime, Duration, Utc};
use common::UserId;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use store::{Store, User};

use crate::error::ApiError;
use crate::state::AppState;

/// JWT claims carried by every access token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// User id
    pub sub: String,
    pub email: String,
    pub iss: String,
    /// Issued at (Unix timestamp seconds)
    pub iat: i64,
    /// Expiration (Unix timestamp seconds)
    pub exp: i64,
}

/// Authenticated caller extracted from a verified token. The email is the
/// username baskets and orders are keyed by.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub user_id: UserId,
    pub email: String,
}

/// A freshly signed token.
#[derive(Debug, Clone, Serialize)]
pub struct IssuedToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// Signs and verifies HS256 access tokens.
#[derive(Clone)]
pub struct TokenIssuer {
    encoding: EncodingKey,
    decoding: DecodingKey,
    issuer: String,
    ttl: Duration,
}

impl TokenIssuer {
    pub fn new(secret: &str, issuer: &str, ttl_hours: i64) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            issuer: issuer.to_string(),
            ttl: Duration::hours(ttl_hours),
        }
    }

    /// Issues a token for `user`.
    pub fn issue(&self, user: &User) -> Result<IssuedToken, ApiError> {
        self.issue_at(user, Utc::now())
    }

    fn issue_at(&self, user: &User, now: DateTime<Utc>) -> Result<IssuedToken, ApiError> {
        let expires_at = now + self.ttl;
        let claims = Claims {
            sub: user.id.to_string(),
            email: user.email.clone(),
            iss: self.issuer.clone(),
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
        };

        let token = jsonwebtoken::encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| ApiError::Internal(format!("failed to sign token: {e}")))?;
        Ok(IssuedToken { token, expires_at })
    }

    /// Verifies signature, issuer and expiry and returns the caller.
    pub fn verify(&self, token: &str) -> Result<Identity, ApiError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[self.issuer.as_str()]);

        let data = jsonwebtoken::decode::<Claims>(token, &self.decoding, &validation).map_err(|e| {
            tracing::debug!("JWT validation failed: {e}");
            ApiError::Unauthorized("invalid or expired token".to_string())
        })?;

        let user_id = data
            .claims
            .sub
            .parse::<i64>()
            .map(UserId::new)
            .map_err(|_| ApiError::Unauthorized("invalid token subject".to_string()))?;

        Ok(Identity {
            user_id,
            email: data.claims.email,
        })
    }
}

/// Middleware that verifies the bearer token and stores the [`Identity`] in
/// the request extensions.
pub async fn require_auth<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let header = request
        .headers()
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ApiError::Unauthorized("missing Authorization header".to_string()))?;

    let token = header
        .strip_prefix("Bearer ")
        .ok_or_else(|| ApiError::Unauthorized("invalid Authorization format".to_string()))?;

    let identity = state.tokens.verify(token.trim())?;
    request.extensions_mut().insert(identity);

    Ok(next.run(request).await)
}

/// Fails with 403 unless the caller holds `role`.
pub async fn require_role<S: Store>(
    state: &AppState<S>,
    identity: &Identity,
    role: &'static str,
) -> Result<(), ApiError> {
    if state.users.has_role(identity.user_id, role).await? {
        Ok(())
    } else {
        tracing::warn!(user_id = %identity.user_id, role, "role check failed");
        Err(ApiError::Forbidden(role))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user() -> User {
        User {
            id: UserId::new(7),
            email: "ada@example.com".to_string(),
            password_hash: String::new(),
            roles: vec!["customer".to_string()],
            created_at: Utc::now(),
        }
    }

    #[test]
    fn issued_token_verifies() {
        let issuer = TokenIssuer::new("secret", "storefront", 1);
        let issued = issuer.issue(&user()).unwrap();

        let identity = issuer.verify(&issued.token).unwrap();
        assert_eq!(identity.user_id, UserId::new(7));
        assert_eq!(identity.email, "ada@example.com");
    }

    #[test]
    fn wrong_secret_or_issuer_is_rejected() {
        let issued = TokenIssuer::new("secret", "storefront", 1)
            .issue(&user())
            .unwrap();

        assert!(
            TokenIssuer::new("other", "storefront", 1)
                .verify(&issued.token)
                .is_err()
        );
        assert!(
            TokenIssuer::new("secret", "elsewhere", 1)
                .verify(&issued.token)
                .is_err()
        );
    }

    #[test]
    fn expired_token_is_rejected() {
        let issuer = TokenIssuer::new("secret", "storefront", 1);
        let issued = issuer
            .issue_at(&user(), Utc::now() - Duration::hours(3))
            .unwrap();

        let err = issuer.verify(&issued.token).unwrap_err();
        assert!(matches!(err, ApiError::Unauthorized(_)));
    }
}
