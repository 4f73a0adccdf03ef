use async_trait::async_trait;
use hmac::{Hmac, Mac};
use jwt::{SignWithKey, VerifyWithKey};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

use crate::error::{ApiError, Result};

/// Turns an opaque bearer credential into a verified email address.
#[async_trait]
pub trait IdentityVerifier: Send + Sync {
    async fn verify(&self, token: &str) -> Result<String>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub email: String,
    /// Expiry as unix seconds.
    pub exp: i64,
}

/// HS256 tokens signed with a shared secret.
#[derive(Clone)]
pub struct HmacTokenVerifier {
    key: Hmac<Sha256>,
}

impl HmacTokenVerifier {
    pub fn new(secret: &str) -> Result<HmacTokenVerifier> {
        let key = Hmac::<Sha256>::new_from_slice(secret.as_bytes())
            .map_err(|_| ApiError::Internal("Invalid token secret".to_string()))?;
        Ok(HmacTokenVerifier { key })
    }

    pub fn issue(&self, email: &str, valid_for: chrono::Duration) -> Result<String> {
        let claims = Claims {
            email: email.to_string(),
            exp: (chrono::Utc::now() + valid_for).timestamp(),
        };
        claims
            .sign_with_key(&self.key)
            .map_err(|e| ApiError::Internal(format!("Failed to sign token: {}", e)))
    }

    fn decode(&self, token: &str) -> Result<Claims> {
        let claims: Claims = token
            .verify_with_key(&self.key)
            .map_err(|_| ApiError::unauthorized("Invalid authorization token"))?;
        if claims.exp <= chrono::Utc::now().timestamp() {
            return Err(ApiError::unauthorized("Authorization token has expired"));
        }
        if claims.email.trim().is_empty() {
            return Err(ApiError::unauthorized("Authorization token carries no email"));
        }
        Ok(claims)
    }
}

#[async_trait]
impl IdentityVerifier for HmacTokenVerifier {
    async fn verify(&self, token: &str) -> Result<String> {
        self.decode(token).map(|claims| claims.email)
    }
}
