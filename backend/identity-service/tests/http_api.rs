mod common;

use std::sync::Arc;
use std::time::Duration;

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use common::{harness, oauth_payload, FakeOAuth, Harness};
use identity_service::http::{build_router, HttpServerState, TokenResponse};
use identity_service::models::Provider;
use serde_json::{json, Value};
use tower::ServiceExt;

fn app(h: &Harness) -> Router {
    let oauth = FakeOAuth::default()
        .with_profile("google-code", oauth_payload("b@x.com", Provider::Google))
        .with_profile("yandex-code", oauth_payload("b@x.com", Provider::Yandex));
    build_router(
        HttpServerState {
            auth: h.auth.clone(),
            oauth: Arc::new(oauth),
            token_ttl_seconds: 86400,
        },
        Duration::from_secs(5),
    )
}

async fn post(app: &Router, uri: &str, body: Value) -> (StatusCode, Value) {
    let request = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
}

#[tokio::test]
async fn health_is_ok() {
    let h = harness();
    let response = app(&h)
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn otp_round_trip_over_http() {
    let h = harness();
    let app = app(&h);

    let (status, body) = post(&app, "/auth/otp", json!({ "email": "a@x.com" })).await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert!(body["expires_at"].is_string());

    let code = h.publisher.last_code_for("a@x.com").unwrap();
    let (status, body) = post(
        &app,
        "/auth/otp/verify",
        json!({ "email": "a@x.com", "code": code }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let token: TokenResponse = serde_json::from_value(body).unwrap();
    assert!(token.is_new_user);
    assert_eq!(token.token_type, "Bearer");
    assert_eq!(token.expires_in, 86400);
    assert_eq!(h.auth.verify_token(&token.access_token).unwrap(), token.user_id);

    let (status, body) = post(
        &app,
        "/auth/otp/verify",
        json!({ "email": "a@x.com", "code": code }),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "invalid OTP");
}

#[tokio::test]
async fn wrong_code_and_unknown_email_look_the_same() {
    let h = harness();
    let app = app(&h);
    post(&app, "/auth/otp", json!({ "email": "a@x.com" })).await;

    let (wrong_status, wrong_body) = post(
        &app,
        "/auth/otp/verify",
        json!({ "email": "a@x.com", "code": "000000" }),
    )
    .await;
    let (unknown_status, unknown_body) = post(
        &app,
        "/auth/otp/verify",
        json!({ "email": "nobody@x.com", "code": "123456" }),
    )
    .await;

    assert_eq!(wrong_status, StatusCode::UNAUTHORIZED);
    assert_eq!(wrong_status, unknown_status);
    assert_eq!(wrong_body, unknown_body);
}

#[tokio::test]
async fn malformed_input_is_rejected_before_the_core() {
    let h = harness();
    let app = app(&h);

    let (status, _) = post(&app, "/auth/otp", json!({ "email": "not-an-email" })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = post(
        &app,
        "/auth/otp/verify",
        json!({ "email": "a@x.com", "code": "12345" }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = post(
        &app,
        "/auth/otp/verify",
        json!({ "email": "a@x.com", "code": "12345a" }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    assert!(h.publisher.otps().is_empty());
}

#[tokio::test]
async fn oauth_register_then_mismatch() {
    let h = harness();
    let app = app(&h);

    let (status, body) = post(
        &app,
        "/auth/oauth/google",
        json!({ "code": "google-code" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["is_new_user"], true);

    let (status, body) = post(
        &app,
        "/auth/oauth/yandex",
        json!({ "code": "yandex-code" }),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "invalid provider");
}

#[tokio::test]
async fn unsupported_oauth_provider_is_bad_request() {
    let h = harness();
    let app = app(&h);

    for provider in ["github", "email", "Google"] {
        let (status, _) = post(
            &app,
            &format!("/auth/oauth/{provider}"),
            json!({ "code": "google-code" }),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "provider {provider}");
    }
}

#[tokio::test]
async fn provider_exchange_failure_is_bad_gateway() {
    let h = harness();
    let app = app(&h);

    let (status, _) = post(&app, "/auth/oauth/google", json!({ "code": "expired" })).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(h.store.user_count().await, 0);
}

#[tokio::test]
async fn broker_outage_is_service_unavailable() {
    let h = harness();
    let app = app(&h);
    h.publisher.set_failing(true);

    let (status, body) = post(&app, "/auth/otp", json!({ "email": "a@x.com" })).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["error"], "service unavailable");
    assert!(!body.to_string().contains("broker"));
}

#[tokio::test]
async fn stalled_request_times_out_and_leaves_no_code() {
    let h = harness();
    h.publisher.set_stalled(true);
    let app = build_router(
        HttpServerState {
            auth: h.auth.clone(),
            oauth: Arc::new(FakeOAuth::default()),
            token_ttl_seconds: 86400,
        },
        Duration::from_millis(50),
    );

    let (status, _) = post(&app, "/auth/otp", json!({ "email": "a@x.com" })).await;

    assert_eq!(status, StatusCode::REQUEST_TIMEOUT);
    assert!(h.store.otps_for("a@x.com").await.is_empty());
}
