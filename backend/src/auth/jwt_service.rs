use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

/// JWT-related errors
#[derive(Debug, Error)]
pub enum JwtError {
    #[error("Token validation failed: {0}")]
    TokenValidation(String),

    #[error("Token expired")]
    TokenExpired,

    #[error("Invalid token")]
    InvalidToken,
}

impl From<jsonwebtoken::errors::Error> for JwtError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        match err.kind() {
            jsonwebtoken::errors::ErrorKind::ExpiredSignature => JwtError::TokenExpired,
            jsonwebtoken::errors::ErrorKind::InvalidToken => JwtError::InvalidToken,
            _ => JwtError::TokenValidation(err.to_string()),
        }
    }
}

/// Claims of an access token issued by account management
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,    // user id
    pub player_id: Uuid,
    pub exp: i64,
    pub iat: i64,
}

#[derive(Debug, Clone)]
pub struct JwtConfig {
    pub secret_key: String,
    pub algorithm: Algorithm,
}

impl JwtConfig {
    pub fn new(secret_key: impl Into<String>) -> Self {
        Self {
            secret_key: secret_key.into(),
            algorithm: Algorithm::HS256,
        }
    }
}

/// Validates bearer tokens. Issuing tokens is left to account management.
pub struct JwtService {
    config: JwtConfig,
    decoding_key: DecodingKey,
}

impl JwtService {
    pub fn new(config: JwtConfig) -> Self {
        let decoding_key = DecodingKey::from_secret(config.secret_key.as_bytes());
        Self {
            config,
            decoding_key,
        }
    }

    /// Decode and verify a token, including its expiry
    pub fn validate_token(&self, token: &str) -> Result<Claims, JwtError> {
        let validation = Validation::new(self.config.algorithm);
        let data = decode::<Claims>(token, &self.decoding_key, &validation)?;
        debug!(player_id = %data.claims.player_id, "Token validated");
        Ok(data.claims)
    }
}
