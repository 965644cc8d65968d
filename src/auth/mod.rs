use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Access level that unlocks the operator routes.
pub const ROOT_ACCESS: &str = "root";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Registry id of the tenant the caller acts for.
    pub tenant: String,
    pub sub: String,
    pub access: String,
    pub exp: i64,
    pub iat: i64,
}

impl Claims {
    pub fn new(tenant: impl Into<String>, sub: impl Into<String>, access: impl Into<String>, ttl: Duration) -> Self {
        let now = Utc::now();
        Self {
            tenant: tenant.into(),
            sub: sub.into(),
            access: access.into(),
            exp: (now + ttl).timestamp(),
            iat: now.timestamp(),
        }
    }
}

#[derive(Debug, Error)]
pub enum JwtError {
    #[error("JWT generation error: {0}")]
    TokenGeneration(String),
    #[error("JWT secret not configured")]
    InvalidSecret,
    #[error("Invalid JWT token: {0}")]
    InvalidToken(String),
}

pub fn generate_jwt(claims: &Claims, secret: &SecretString) -> Result<String, JwtError> {
    let secret = secret.expose_secret();
    if secret.is_empty() {
        return Err(JwtError::InvalidSecret);
    }

    let encoding_key = EncodingKey::from_secret(secret.as_bytes());
    encode(&Header::new(Algorithm::HS256), claims, &encoding_key)
        .map_err(|e| JwtError::TokenGeneration(e.to_string()))
}

/// Verify signature and expiry. An empty secret rejects every token.
pub fn validate_jwt(token: &str, secret: &SecretString) -> Result<Claims, JwtError> {
    let secret = secret.expose_secret();
    if secret.is_empty() {
        return Err(JwtError::InvalidSecret);
    }

    let decoding_key = DecodingKey::from_secret(secret.as_bytes());
    let validation = Validation::new(Algorithm::HS256);

    decode::<Claims>(token, &decoding_key, &validation)
        .map(|data| data.claims)
        .map_err(|e| JwtError::InvalidToken(e.to_string()))
}
