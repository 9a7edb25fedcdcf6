/// Security module for token issuance
///
/// Wraps the shared `crypto-core::jwt` HS256 signer with the configured secret
/// and lifetime. Tokens are stateless: verification needs only the secret.
pub use crypto_core::jwt;
pub use crypto_core::jwt::Claims;

use std::fmt;

use chrono::Duration;
use uuid::Uuid;

use crate::config::JwtSettings;
use crate::error::{IdentityError, Result};

/// Token Issuer bound to one signing secret and TTL
#[derive(Clone)]
pub struct TokenIssuer {
    secret: Vec<u8>,
    ttl: Duration,
}

impl TokenIssuer {
    pub fn new(secret: impl Into<Vec<u8>>, ttl: Duration) -> Self {
        Self {
            secret: secret.into(),
            ttl,
        }
    }

    pub fn from_settings(settings: &JwtSettings) -> Result<Self> {
        let ttl_seconds = i64::try_from(settings.ttl_seconds)
            .map_err(|_| IdentityError::Internal("JWT TTL out of range".to_string()))?;
        Ok(Self::new(
            settings.secret.as_bytes().to_vec(),
            Duration::seconds(ttl_seconds),
        ))
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Sign an access token whose subject is `user_id`.
    pub fn sign(&self, user_id: Uuid) -> Result<String> {
        Ok(jwt::sign(user_id, &self.secret, self.ttl)?)
    }

    /// Verify a token and return the user id it was issued for.
    ///
    /// Any failure, including a subject that is not a UUID, is `InvalidToken`.
    pub fn verify(&self, token: &str) -> Result<Uuid> {
        let claims = jwt::verify(token, &self.secret)?;
        Uuid::parse_str(&claims.sub).map_err(|_| IdentityError::InvalidToken)
    }
}

impl fmt::Debug for TokenIssuer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenIssuer")
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}
