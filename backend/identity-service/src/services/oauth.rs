/// OAuth provider exchange (Google, Yandex)
///
/// Turns an authorization code into the profile fields identity resolution
/// needs. Provider failures surface as `IdentityError::OAuthError`.
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use crate::config::OAuthSettings;
use crate::error::{IdentityError, Result};
use crate::models::{OAuthPayload, Provider};

const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const GOOGLE_USERINFO_URL: &str = "https://www.googleapis.com/oauth2/v2/userinfo";
const YANDEX_TOKEN_URL: &str = "https://oauth.yandex.ru/token";
const YANDEX_USERINFO_URL: &str = "https://login.yandex.ru/info?format=json";

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait OAuthExchange: Send + Sync {
    async fn exchange(&self, provider: Provider, code: &str) -> Result<OAuthPayload>;
}

/// HTTP client for the provider token and userinfo endpoints
#[derive(Clone)]
pub struct OAuthClient {
    http: Client,
    config: OAuthSettings,
}

impl OAuthClient {
    pub fn new(config: OAuthSettings) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| IdentityError::Internal(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self { http, config })
    }

    fn redirect_uri(&self, provider: Provider) -> String {
        format!(
            "{}/auth/{}/callback",
            self.config.redirect_base.trim_end_matches('/'),
            provider
        )
    }

    async fn exchange_google(&self, code: &str) -> Result<OAuthPayload> {
        let client_id = self.config.google_client_id.as_deref().ok_or_else(|| {
            IdentityError::OAuthError("Google client ID not configured".to_string())
        })?;
        let client_secret = self.config.google_client_secret.as_deref().ok_or_else(|| {
            IdentityError::OAuthError("Google client secret not configured".to_string())
        })?;
        let redirect_uri = self.redirect_uri(Provider::Google);

        // Exchange code for access token
        let token_response = self
            .http
            .post(GOOGLE_TOKEN_URL)
            .form(&[
                ("code", code),
                ("client_id", client_id),
                ("client_secret", client_secret),
                ("redirect_uri", redirect_uri.as_str()),
                ("grant_type", "authorization_code"),
            ])
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| IdentityError::OAuthError(e.to_string()))?
            .json::<TokenResponse>()
            .await
            .map_err(|e| IdentityError::OAuthError(e.to_string()))?;

        // Fetch user info
        let user_info = self
            .http
            .get(GOOGLE_USERINFO_URL)
            .bearer_auth(&token_response.access_token)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| IdentityError::OAuthError(e.to_string()))?
            .json::<GoogleUserInfo>()
            .await
            .map_err(|e| IdentityError::OAuthError(e.to_string()))?;

        Ok(user_info.into_payload())
    }

    async fn exchange_yandex(&self, code: &str) -> Result<OAuthPayload> {
        let client_id = self.config.yandex_client_id.as_deref().ok_or_else(|| {
            IdentityError::OAuthError("Yandex client ID not configured".to_string())
        })?;
        let client_secret = self.config.yandex_client_secret.as_deref().ok_or_else(|| {
            IdentityError::OAuthError("Yandex client secret not configured".to_string())
        })?;

        let token_response = self
            .http
            .post(YANDEX_TOKEN_URL)
            .form(&[
                ("code", code),
                ("client_id", client_id),
                ("client_secret", client_secret),
                ("grant_type", "authorization_code"),
            ])
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| IdentityError::OAuthError(e.to_string()))?
            .json::<TokenResponse>()
            .await
            .map_err(|e| IdentityError::OAuthError(e.to_string()))?;

        let user_info = self
            .http
            .get(YANDEX_USERINFO_URL)
            .header(
                reqwest::header::AUTHORIZATION,
                format!("OAuth {}", token_response.access_token),
            )
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| IdentityError::OAuthError(e.to_string()))?
            .json::<YandexUserInfo>()
            .await
            .map_err(|e| IdentityError::OAuthError(e.to_string()))?;

        user_info.into_payload()
    }
}

#[async_trait]
impl OAuthExchange for OAuthClient {
    async fn exchange(&self, provider: Provider, code: &str) -> Result<OAuthPayload> {
        debug!(%provider, "Exchanging OAuth authorization code");
        match provider {
            Provider::Google => self.exchange_google(code).await,
            Provider::Yandex => self.exchange_yandex(code).await,
            Provider::Email => Err(IdentityError::InvalidOAuthProvider),
        }
    }
}

// ===== Provider Response Types =====

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Deserialize)]
struct GoogleUserInfo {
    email: String,
    name: Option<String>,
    picture: Option<String>,
}

impl GoogleUserInfo {
    fn into_payload(self) -> OAuthPayload {
        OAuthPayload {
            email: self.email,
            provider: Provider::Google,
            full_name: self.name.filter(|s| !s.is_empty()),
            avatar_url: self.picture.filter(|s| !s.is_empty()),
        }
    }
}

#[derive(Deserialize)]
struct YandexUserInfo {
    default_email: Option<String>,
    real_name: Option<String>,
    default_avatar_id: Option<String>,
    #[serde(default)]
    is_avatar_empty: bool,
}

impl YandexUserInfo {
    fn into_payload(self) -> Result<OAuthPayload> {
        let email = self
            .default_email
            .filter(|s| !s.is_empty())
            .ok_or_else(|| IdentityError::OAuthError("Yandex account has no email".to_string()))?;
        let avatar_url = match (self.default_avatar_id, self.is_avatar_empty) {
            (Some(id), false) if !id.is_empty() => Some(yandex_avatar_url(&id)),
            _ => None,
        };

        Ok(OAuthPayload {
            email,
            provider: Provider::Yandex,
            full_name: self.real_name.filter(|s| !s.is_empty()),
            avatar_url,
        })
    }
}

fn yandex_avatar_url(avatar_id: &str) -> String {
    format!(
        "https://avatars.yandex.net/get-yapic/{}/islands-200",
        avatar_id
    )
}
