/// Event schemas published by the identity service
///
/// Shared with the notification and profile consumers so producers and
/// consumers agree on payload shape. Payloads are plain JSON objects; the
/// schema version travels in the `schema_version` Kafka header.
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Current schema version for all events
pub const SCHEMA_VERSION: u32 = 1;

/// Source service name stamped on every event
pub const SOURCE: &str = "identity-service";

/// Kafka topic names
pub mod topics {
    pub const USER_REGISTERED: &str = "user.registered";
    pub const OTP_GENERATED: &str = "user.otp.generated";
}

// ============================================================================
// IDENTITY EVENTS
// ============================================================================

/// A new identity record was created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRegisteredEvent {
    pub user_id: Uuid,
    pub email: String,
    /// "email", "google" or "yandex"
    pub provider: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
}

impl UserRegisteredEvent {
    pub const EVENT_TYPE: &'static str = "UserRegistered";
}

/// A one-time code was issued and should be delivered to `email`.
///
/// `user_id` is absent when the code was issued before the account exists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OtpGeneratedEvent {
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<Uuid>,
    #[serde(rename = "otp")]
    pub code: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl OtpGeneratedEvent {
    pub const EVENT_TYPE: &'static str = "OtpGenerated";
}
