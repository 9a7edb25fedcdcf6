/// Service layer for identity-service
///
/// - Identity resolution (OAuth and email OTP login/registration)
/// - OTP manager and background sweeper
/// - Event publisher contract and its Kafka producer
/// - OAuth provider code exchange (Google, Yandex)
pub mod auth;
pub mod events;
pub mod kafka_events;
pub mod oauth;
pub mod otp;

pub use auth::{AuthResult, AuthService, OtpIssued};
pub use events::EventPublisher;
pub use kafka_events::KafkaEventProducer;
pub use oauth::{OAuthClient, OAuthExchange};
pub use otp::{spawn_otp_sweeper, OtpManager, OtpSweeperConfig};
