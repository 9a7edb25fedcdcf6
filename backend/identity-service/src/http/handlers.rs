/// Auth endpoints
///
/// Thin adapters: decode and validate the request, call `AuthService`, map
/// the outcome to JSON. Authentication failures use fixed messages so a
/// caller cannot tell a wrong code from an expired one or an unknown email.
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tracing::error;
use uuid::Uuid;
use validator::Validate;

use super::HttpServerState;
use crate::error::{IdentityError, Result};
use crate::models::Provider;
use crate::services::AuthResult;
use crate::validators::{validate_email_shape_validator, validate_otp_code_validator};

#[derive(Debug, Deserialize, Validate)]
pub struct OAuthExchangeRequest {
    #[validate(length(min = 1, max = 2048))]
    pub code: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct GenerateOtpRequest {
    #[validate(custom(function = "validate_email_shape_validator"))]
    pub email: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct VerifyOtpRequest {
    #[validate(custom(function = "validate_email_shape_validator"))]
    pub email: String,
    #[validate(custom(function = "validate_otp_code_validator"))]
    pub code: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: i64,
    pub user_id: Uuid,
    pub is_new_user: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct OtpSentResponse {
    pub expires_at: DateTime<Utc>,
}

fn token_response(state: &HttpServerState, result: AuthResult) -> Json<TokenResponse> {
    Json(TokenResponse {
        access_token: result.access_token,
        token_type: "Bearer".to_string(),
        expires_in: state.token_ttl_seconds,
        user_id: result.user_id,
        is_new_user: result.is_new_user,
    })
}

/// POST /auth/oauth/{provider}
pub async fn exchange_oauth(
    State(state): State<Arc<HttpServerState>>,
    Path(provider): Path<String>,
    Json(req): Json<OAuthExchangeRequest>,
) -> Result<Json<TokenResponse>> {
    req.validate()?;
    let provider: Provider = provider.parse()?;
    if !provider.is_oauth() {
        return Err(IdentityError::InvalidOAuthProvider);
    }

    let payload = state.oauth.exchange(provider, &req.code).await?;
    let result = state.auth.oauth(payload).await?;
    Ok(token_response(&state, result))
}

/// POST /auth/otp
pub async fn generate_otp(
    State(state): State<Arc<HttpServerState>>,
    Json(req): Json<GenerateOtpRequest>,
) -> Result<(StatusCode, Json<OtpSentResponse>)> {
    req.validate()?;
    let issued = state.auth.generate_otp(&req.email).await?;
    Ok((
        StatusCode::ACCEPTED,
        Json(OtpSentResponse {
            expires_at: issued.expires_at,
        }),
    ))
}

/// POST /auth/otp/verify
pub async fn verify_otp(
    State(state): State<Arc<HttpServerState>>,
    Json(req): Json<VerifyOtpRequest>,
) -> Result<Json<TokenResponse>> {
    req.validate()?;
    let result = state.auth.verify_otp(&req.email, &req.code).await?;
    Ok(token_response(&state, result))
}

/// GET /health
pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

impl IntoResponse for IdentityError {
    fn into_response(self) -> Response {
        let (status, error_message) = match &self {
            IdentityError::InvalidOtp => (StatusCode::UNAUTHORIZED, "invalid OTP"),
            IdentityError::ProviderMismatch => (StatusCode::UNAUTHORIZED, "invalid provider"),
            IdentityError::InvalidToken | IdentityError::UserNotFound => {
                (StatusCode::UNAUTHORIZED, "unauthenticated")
            }
            IdentityError::InvalidOAuthProvider => {
                (StatusCode::BAD_REQUEST, "unsupported OAuth provider")
            }
            IdentityError::Validation(_) => (StatusCode::BAD_REQUEST, "invalid request"),
            IdentityError::OAuthError(_) => (StatusCode::BAD_GATEWAY, "OAuth provider error"),
            IdentityError::Database(_) | IdentityError::EventPublish(_) => {
                (StatusCode::SERVICE_UNAVAILABLE, "service unavailable")
            }
            IdentityError::JwtError(_) | IdentityError::Internal(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "internal error")
            }
        };

        if !self.is_domain() {
            error!(error = %self, status = status.as_u16(), "Request failed");
        }

        let body = Json(json!({
            "error": error_message,
            "status": status.as_u16()
        }));

        (status, body).into_response()
    }
}
