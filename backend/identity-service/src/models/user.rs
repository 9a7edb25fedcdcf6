use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::IdentityError;

/// Authentication channel that owns an identity, matching database auth_provider
///
/// Set once at creation and never changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Type)]
#[sqlx(type_name = "auth_provider", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Email,
    Google,
    Yandex,
}

impl Provider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::Email => "email",
            Provider::Google => "google",
            Provider::Yandex => "yandex",
        }
    }

    pub fn is_oauth(&self) -> bool {
        matches!(self, Provider::Google | Provider::Yandex)
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Provider {
    type Err = IdentityError;

    /// Exact match only; "Google" is not "google".
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "email" => Ok(Provider::Email),
            "google" => Ok(Provider::Google),
            "yandex" => Ok(Provider::Yandex),
            _ => Err(IdentityError::InvalidOAuthProvider),
        }
    }
}

/// User model - identity record keyed by email
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct User {
    #[sqlx(rename = "user_id")]
    pub id: Uuid,
    pub email: String,
    pub provider: Provider,
    #[sqlx(rename = "is_email_verified")]
    pub email_verified: bool,
    pub full_name: Option<String>,
    pub avatar_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Fields accepted by `UserRepository::create`; the id is minted by the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewUser {
    pub email: String,
    pub provider: Provider,
    pub email_verified: bool,
    pub full_name: Option<String>,
    pub avatar_url: Option<String>,
}

impl NewUser {
    pub fn from_oauth(payload: &OAuthPayload) -> Self {
        Self {
            email: payload.email.clone(),
            provider: payload.provider,
            email_verified: true,
            full_name: payload.full_name.clone(),
            avatar_url: payload.avatar_url.clone(),
        }
    }

    /// Account created by a confirmed email code
    pub fn verified_email(email: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            provider: Provider::Email,
            email_verified: true,
            full_name: None,
            avatar_url: None,
        }
    }
}

/// Profile returned by an OAuth provider after the code exchange
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OAuthPayload {
    pub email: String,
    pub provider: Provider,
    pub full_name: Option<String>,
    pub avatar_url: Option<String>,
}
