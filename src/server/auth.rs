//! Bearer-token authentication.
//!
//! Tokens are HS256 JWTs whose `sub` claim is the owner id. Verification
//! happens in the [`AuthUser`] extractor, so a handler that takes an
//! `AuthUser` cannot run for an unauthenticated request.

use super::AppState;
use crate::error::ApiError;
use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub exp: usize,
}

/// The authenticated caller.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub owner_id: String,
}

/// Sign a token for `sub` that expires after `ttl`.
pub fn mint_token(
    secret: &str,
    sub: &str,
    ttl: Duration,
) -> Result<String, jsonwebtoken::errors::Error> {
    let claims = Claims {
        sub: sub.to_string(),
        exp: (Utc::now() + ttl).timestamp().max(0) as usize,
    };
    encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
}

/// Verify signature and expiry; returns the `sub` claim.
pub fn verify_token(secret: &str, token: &str) -> Result<String, ApiError> {
    let data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::new(Algorithm::HS256),
    )
    .map_err(|e| ApiError::Unauthorized(format!("invalid token: {e}")))?;

    if data.claims.sub.trim().is_empty() {
        return Err(ApiError::Unauthorized("token has no subject".into()));
    }
    Ok(data.claims.sub)
}

#[async_trait]
impl FromRequestParts<Arc<AppState>> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| ApiError::Unauthorized("missing bearer token".into()))?;
        let token = header
            .strip_prefix("Bearer ")
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| ApiError::Unauthorized("expected 'Bearer <token>'".into()))?;

        let owner_id = verify_token(&state.jwt_secret, token)?;
        Ok(AuthUser { owner_id })
    }
}
