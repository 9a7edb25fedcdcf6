use crypto_core::TokenError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, IdentityError>;

#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("User not found")]
    UserNotFound,

    #[error("User provider mismatch")]
    ProviderMismatch,

    #[error("Invalid OTP")]
    InvalidOtp,

    #[error("Invalid token")]
    InvalidToken,

    #[error("Invalid OAuth provider")]
    InvalidOAuthProvider,

    #[error("OAuth provider error: {0}")]
    OAuthError(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Event publish error: {0}")]
    EventPublish(String),

    #[error("JWT error: {0}")]
    JwtError(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl IdentityError {
    /// Expected outcomes that drive control flow or are reported to the caller
    /// as authentication failures. Everything else is an infrastructure fault.
    pub fn is_domain(&self) -> bool {
        matches!(
            self,
            IdentityError::UserNotFound
                | IdentityError::ProviderMismatch
                | IdentityError::InvalidOtp
                | IdentityError::InvalidToken
                | IdentityError::InvalidOAuthProvider
                | IdentityError::Validation(_)
        )
    }

    /// Prefix infrastructure errors with the operation that failed.
    ///
    /// Domain outcomes are returned untouched so callers can still match on them.
    pub fn with_operation(self, operation: &str) -> Self {
        match self {
            IdentityError::Database(msg) => {
                IdentityError::Database(format!("{operation}: {msg}"))
            }
            IdentityError::EventPublish(msg) => {
                IdentityError::EventPublish(format!("{operation}: {msg}"))
            }
            IdentityError::JwtError(msg) => IdentityError::JwtError(format!("{operation}: {msg}")),
            IdentityError::OAuthError(msg) => {
                IdentityError::OAuthError(format!("{operation}: {msg}"))
            }
            IdentityError::Internal(msg) => IdentityError::Internal(format!("{operation}: {msg}")),
            other => other,
        }
    }
}

/// `Result` extension for attaching the failing operation name.
pub trait OperationContext<T> {
    fn operation(self, operation: &str) -> Result<T>;
}

impl<T> OperationContext<T> for Result<T> {
    fn operation(self, operation: &str) -> Result<T> {
        self.map_err(|err| err.with_operation(operation))
    }
}

// Conversions from external error types
impl From<sqlx::Error> for IdentityError {
    fn from(err: sqlx::Error) -> Self {
        tracing::error!("Database error: {}", err);
        IdentityError::Database(err.to_string())
    }
}

impl From<rdkafka::error::KafkaError> for IdentityError {
    fn from(err: rdkafka::error::KafkaError) -> Self {
        tracing::error!("Kafka error: {}", err);
        IdentityError::EventPublish(err.to_string())
    }
}

impl From<TokenError> for IdentityError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::Invalid => IdentityError::InvalidToken,
            TokenError::Signing(msg) => {
                tracing::error!("JWT signing error: {}", msg);
                IdentityError::JwtError(msg)
            }
        }
    }
}

impl From<serde_json::Error> for IdentityError {
    fn from(err: serde_json::Error) -> Self {
        IdentityError::Internal(format!("serialization failed: {err}"))
    }
}

impl From<validator::ValidationErrors> for IdentityError {
    fn from(err: validator::ValidationErrors) -> Self {
        IdentityError::Validation(err.to_string())
    }
}
