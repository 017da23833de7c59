//! Bearer-token verification.
//!
//! The pipeline only needs `verify(token) -> user_id`; token issuance belongs
//! to the external authentication provider. `JwtVerifier` validates HS256
//! tokens whose `sub` claim carries the user id; `StaticTokenVerifier` is a
//! fixed token table for tests and local development.

use std::collections::HashMap;

use chrono::Utc;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;

/// Resolves a bearer token to the user it belongs to.
pub trait TokenVerifier: Send + Sync {
    fn verify(&self, token: &str) -> Result<Uuid, AppError>;
}

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    sub: String,
    exp: i64,
}

/// HS256 JWT verification against a shared secret.
pub struct JwtVerifier {
    secret: String,
}

impl JwtVerifier {
    pub fn new(secret: impl Into<String>) -> Self {
        JwtVerifier {
            secret: secret.into(),
        }
    }

    /// Issue a token for the given user. Intended for tests and local
    /// tooling; production tokens come from the external auth provider.
    pub fn issue(&self, user_id: Uuid, ttl_seconds: i64) -> Result<String, AppError> {
        let claims = Claims {
            sub: user_id.to_string(),
            exp: Utc::now().timestamp() + ttl_seconds,
        };
        encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(self.secret.as_bytes()),
        )
        .map_err(|e| AppError::Internal(format!("failed to issue token: {}", e)))
    }
}

impl TokenVerifier for JwtVerifier {
    fn verify(&self, token: &str) -> Result<Uuid, AppError> {
        let validation = Validation::new(Algorithm::HS256);
        let data = decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.secret.as_bytes()),
            &validation,
        )
        .map_err(|e| AppError::Unauthorized(format!("invalid token: {}", e)))?;

        Uuid::parse_str(&data.claims.sub)
            .map_err(|_| AppError::Unauthorized("token subject is not a user id".to_string()))
    }
}

/// Fixed token-to-user table. No expiry, no crypto.
#[derive(Default)]
pub struct StaticTokenVerifier {
    tokens: HashMap<String, Uuid>,
}

impl StaticTokenVerifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(mut self, token: impl Into<String>, user_id: Uuid) -> Self {
        self.tokens.insert(token.into(), user_id);
        self
    }
}

impl TokenVerifier for StaticTokenVerifier {
    fn verify(&self, token: &str) -> Result<Uuid, AppError> {
        self.tokens
            .get(token)
            .copied()
            .ok_or_else(|| AppError::Unauthorized("unknown token".to_string()))
    }
}
