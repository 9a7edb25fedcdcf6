//! Configuration management for Identity Service
//!
//! Loads settings from environment variables, with a `.env` file picked up in
//! debug builds for local development.
//!
//! # Example
//!
//! ```no_run
//! use identity_service::config::Settings;
//!
//! fn main() -> anyhow::Result<()> {
//!     let settings = Settings::load()?;
//!     println!("listening on {}:{}", settings.server.host, settings.server.port);
//!     Ok(())
//! }
//! ```

use anyhow::{bail, Context, Result};
use event_schema::topics;
use serde::{Deserialize, Serialize};
use std::env;
use std::fmt;
use std::time::Duration;
use tracing::info;

/// Shortest accepted HS256 signing secret, in bytes
pub const MIN_JWT_SECRET_LEN: usize = 32;

/// Application settings
#[derive(Debug, Clone)]
pub struct Settings {
    pub database: DatabaseSettings,
    pub kafka: KafkaSettings,
    pub jwt: JwtSettings,
    pub otp: OtpSettings,
    pub server: ServerSettings,
    pub oauth: OAuthSettings,
}

impl Settings {
    /// Load settings from environment variables
    ///
    /// Fails when a required variable is missing or a value does not parse.
    pub fn load() -> Result<Self> {
        // Load .env file in development
        if cfg!(debug_assertions) {
            dotenvy::dotenv().ok();
            info!("Loaded .env file for development");
        }

        Ok(Settings {
            database: DatabaseSettings::from_env()?,
            kafka: KafkaSettings::from_env()?,
            jwt: JwtSettings::from_env()?,
            otp: OtpSettings::from_env()?,
            server: ServerSettings::from_env()?,
            oauth: OAuthSettings::from_env()?,
        })
    }
}

fn parse_env<T>(name: &str, default: &str) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    env::var(name)
        .unwrap_or_else(|_| default.to_string())
        .parse()
        .with_context(|| format!("Invalid {}", name))
}

/// Database connection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseSettings {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub idle_timeout: u64,
    pub acquire_timeout: u64,
}

impl DatabaseSettings {
    fn from_env() -> Result<Self> {
        Ok(Self {
            url: env::var("DATABASE_URL").context("DATABASE_URL must be set")?,
            max_connections: parse_env("DATABASE_MAX_CONNECTIONS", "20")?,
            min_connections: parse_env("DATABASE_MIN_CONNECTIONS", "2")?,
            idle_timeout: parse_env("DATABASE_IDLE_TIMEOUT", "300")?,
            acquire_timeout: parse_env("DATABASE_ACQUIRE_TIMEOUT", "5")?,
        })
    }
}

/// Kafka event streaming settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KafkaSettings {
    pub brokers: Vec<String>,
    pub client_id: String,
    pub user_registered_topic: String,
    pub otp_generated_topic: String,
    /// Delivery timeout in seconds
    pub producer_timeout: u64,
}

impl KafkaSettings {
    fn from_env() -> Result<Self> {
        let brokers_str = env::var("KAFKA_BROKERS").context("KAFKA_BROKERS must be set")?;
        let brokers: Vec<String> = brokers_str
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        if brokers.is_empty() {
            bail!("KAFKA_BROKERS must list at least one broker");
        }

        Ok(Self {
            brokers,
            client_id: env::var("KAFKA_CLIENT_ID")
                .unwrap_or_else(|_| "identity-service".to_string()),
            user_registered_topic: env::var("KAFKA_TOPIC_USER_REGISTERED")
                .unwrap_or_else(|_| topics::USER_REGISTERED.to_string()),
            otp_generated_topic: env::var("KAFKA_TOPIC_OTP_GENERATED")
                .unwrap_or_else(|_| topics::OTP_GENERATED.to_string()),
            producer_timeout: parse_env("KAFKA_PRODUCER_TIMEOUT", "5")?,
        })
    }

    pub fn producer_timeout(&self) -> Duration {
        Duration::from_secs(self.producer_timeout)
    }
}

/// Token signing settings
///
/// `JWT_SECRET` is mandatory. There is no built-in fallback secret.
#[derive(Clone)]
pub struct JwtSettings {
    pub secret: String,
    pub ttl_seconds: u64,
}

impl JwtSettings {
    fn from_env() -> Result<Self> {
        let secret = env::var("JWT_SECRET").context("JWT_SECRET must be set")?;
        Self::new(secret, parse_env("JWT_TTL_SECONDS", "86400")?)
    }

    pub fn new(secret: String, ttl_seconds: u64) -> Result<Self> {
        if secret.len() < MIN_JWT_SECRET_LEN {
            bail!(
                "JWT_SECRET must be at least {} bytes long",
                MIN_JWT_SECRET_LEN
            );
        }
        if ttl_seconds == 0 {
            bail!("JWT_TTL_SECONDS must be greater than zero");
        }
        Ok(Self {
            secret,
            ttl_seconds,
        })
    }
}

impl fmt::Debug for JwtSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JwtSettings")
            .field("secret", &"<redacted>")
            .field("ttl_seconds", &self.ttl_seconds)
            .finish()
    }
}

/// One-time code settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OtpSettings {
    pub ttl_seconds: u64,
    /// How often expired codes are swept
    pub sweep_interval_seconds: u64,
    /// How long expired codes are kept before the sweeper removes them
    pub retention_seconds: u64,
}

impl OtpSettings {
    fn from_env() -> Result<Self> {
        let settings = Self {
            ttl_seconds: parse_env("OTP_TTL_SECONDS", "300")?,
            sweep_interval_seconds: parse_env("OTP_SWEEP_INTERVAL_SECONDS", "600")?,
            retention_seconds: parse_env("OTP_RETENTION_SECONDS", "86400")?,
        };
        if settings.ttl_seconds == 0 {
            bail!("OTP_TTL_SECONDS must be greater than zero");
        }
        Ok(settings)
    }
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    /// Per-request timeout in seconds
    pub request_timeout: u64,
}

impl ServerSettings {
    fn from_env() -> Result<Self> {
        Ok(Self {
            host: env::var("SERVER_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: parse_env("SERVER_PORT", "8080")?,
            request_timeout: parse_env("SERVER_REQUEST_TIMEOUT", "30")?,
        })
    }
}

/// OAuth provider configuration (Google and Yandex)
#[derive(Clone, Default)]
pub struct OAuthSettings {
    // Google OAuth 2.0
    pub google_client_id: Option<String>,
    pub google_client_secret: Option<String>,
    // Yandex ID
    pub yandex_client_id: Option<String>,
    pub yandex_client_secret: Option<String>,
    /// Public base URL; callbacks are `{base}/auth/{provider}/callback`
    pub redirect_base: String,
}

impl OAuthSettings {
    fn from_env() -> Result<Self> {
        Ok(Self {
            google_client_id: env::var("OAUTH_GOOGLE_CLIENT_ID").ok(),
            google_client_secret: env::var("OAUTH_GOOGLE_CLIENT_SECRET").ok(),
            yandex_client_id: env::var("OAUTH_YANDEX_CLIENT_ID").ok(),
            yandex_client_secret: env::var("OAUTH_YANDEX_CLIENT_SECRET").ok(),
            redirect_base: env::var("OAUTH_REDIRECT_BASE")
                .unwrap_or_else(|_| "http://localhost:8080".to_string()),
        })
    }
}

impl fmt::Debug for OAuthSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OAuthSettings")
            .field("google_client_id", &self.google_client_id)
            .field("yandex_client_id", &self.yandex_client_id)
            .field("redirect_base", &self.redirect_base)
            .finish_non_exhaustive()
    }
}
