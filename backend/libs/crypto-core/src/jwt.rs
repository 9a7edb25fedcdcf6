/// Stateless bearer token signing and verification
///
/// Tokens are HS256 JWTs carrying only the standard `sub`, `iat` and `exp`
/// claims. Nothing is persisted: a token is valid exactly when its MAC matches
/// the configured secret and `exp` has not passed.
///
/// ## Security Design
///
/// - **HS256 ONLY**: the validator accepts a single algorithm, so a token whose
///   header names any other algorithm is rejected instead of negotiated
/// - **No global keys**: the secret is passed in by the caller on every call
/// - **Zero leeway**: a token is rejected as soon as `exp` is reached
/// - **Opaque failures**: every verification failure maps to `TokenError::Invalid`
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// JWT algorithm used for every token
const JWT_ALGORITHM: Algorithm = Algorithm::HS256;

/// JWT Claims structure
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Claims {
    /// Subject (stringified user ID)
    pub sub: String,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
}

#[derive(Debug, Error)]
pub enum TokenError {
    /// Signing failed in the underlying crypto library or the key was unusable
    #[error("failed to sign token: {0}")]
    Signing(String),

    /// Token failed verification for any reason
    #[error("invalid token")]
    Invalid,
}

/// Sign a token for `user_id` that expires `ttl` from now.
pub fn sign(user_id: impl ToString, secret: &[u8], ttl: Duration) -> Result<String, TokenError> {
    if secret.is_empty() {
        return Err(TokenError::Signing("signing secret is empty".to_string()));
    }

    let now = Utc::now();
    let claims = Claims {
        sub: user_id.to_string(),
        iat: now.timestamp(),
        exp: (now + ttl).timestamp(),
    };

    encode(
        &Header::new(JWT_ALGORITHM),
        &claims,
        &EncodingKey::from_secret(secret),
    )
    .map_err(|e| TokenError::Signing(e.to_string()))
}

/// Verify a token and return its claims.
pub fn verify(token: &str, secret: &[u8]) -> Result<Claims, TokenError> {
    if secret.is_empty() {
        return Err(TokenError::Invalid);
    }

    let mut validation = Validation::new(JWT_ALGORITHM);
    validation.leeway = 0;
    validation.validate_exp = true;
    validation.set_required_spec_claims(&["exp", "iat", "sub"]);

    decode::<Claims>(token, &DecodingKey::from_secret(secret), &validation)
        .map(|data| data.claims)
        .map_err(|_| TokenError::Invalid)
}

/// Verify a token and return only its subject.
pub fn subject(token: &str, secret: &[u8]) -> Result<String, TokenError> {
    verify(token, secret).map(|claims| claims.sub)
}
