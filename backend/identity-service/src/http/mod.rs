/// HTTP API for identity resolution
///
/// Routes:
/// - `POST /auth/oauth/{provider}`: exchange an OAuth authorization code
/// - `POST /auth/otp`: request an email one-time code
/// - `POST /auth/otp/verify`: verify a code and receive a token
/// - `GET /health`
mod handlers;

pub use handlers::{
    GenerateOtpRequest, OAuthExchangeRequest, OtpSentResponse, TokenResponse, VerifyOtpRequest,
};

use axum::{
    http::StatusCode,
    routing::{get, post},
    Router,
};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};
use tracing::info;

use crate::services::{AuthService, OAuthExchange};

/// Shared HTTP server state
#[derive(Clone)]
pub struct HttpServerState {
    pub auth: AuthService,
    pub oauth: Arc<dyn OAuthExchange>,
    /// Reported as `expires_in` alongside issued tokens
    pub token_ttl_seconds: i64,
}

/// Build the HTTP router with all auth endpoints
pub fn build_router(state: HttpServerState, request_timeout: Duration) -> Router {
    let state = Arc::new(state);

    Router::new()
        .route("/health", get(handlers::health_check))
        .route("/auth/oauth/{provider}", post(handlers::exchange_oauth))
        .route("/auth/otp", post(handlers::generate_otp))
        .route("/auth/otp/verify", post(handlers::verify_otp))
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            request_timeout,
        ))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Start HTTP server, stopping when `shutdown` resolves
pub async fn start_http_server(
    state: HttpServerState,
    host: &str,
    port: u16,
    request_timeout: Duration,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> anyhow::Result<()> {
    let app = build_router(state, request_timeout);
    let addr = format!("{}:{}", host, port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    info!("Starting HTTP API server on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| anyhow::anyhow!("HTTP server error: {}", e))?;

    Ok(())
}
