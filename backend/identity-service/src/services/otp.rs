/// OTP Manager
///
/// Issues, checks and consumes email one-time codes.
///
/// - Codes are 6 digits from the OS CSPRNG, zero-padded
/// - A code is valid while unused and before `expires_at` (5 minutes by default)
/// - Issuing a code never invalidates earlier outstanding codes for the email
/// - Consumption marks the exact `(email, code)` row used, so replay fails
use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{Duration, Utc};
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info};

use crate::db::{OtpRepository, TxContext};
use crate::error::{OperationContext, Result};
use crate::models::Otp;
use crate::validators::mask_email;

/// OTP code length
pub const OTP_LENGTH: u32 = 6;

/// Default OTP lifetime in seconds (5 minutes)
pub const OTP_EXPIRY_SECS: i64 = 300;

#[derive(Clone)]
pub struct OtpManager {
    repo: Arc<dyn OtpRepository>,
    ttl: Duration,
}

impl OtpManager {
    pub fn new(repo: Arc<dyn OtpRepository>) -> Self {
        Self::with_ttl(repo, Duration::seconds(OTP_EXPIRY_SECS))
    }

    pub fn with_ttl(repo: Arc<dyn OtpRepository>, ttl: Duration) -> Self {
        Self { repo, ttl }
    }

    /// Generate and persist a fresh code for `email`.
    pub async fn generate(&self, cx: &mut TxContext, email: &str) -> Result<Otp> {
        let code = crypto_core::generate_numeric_code(OTP_LENGTH);
        let created_at = Utc::now();
        let expires_at = created_at + self.ttl;

        let otp = self
            .repo
            .insert(cx, email, &code, created_at, expires_at)
            .await
            .operation("store otp")?;

        debug!(email = %mask_email(email), expires_at = %otp.expires_at, "OTP generated");
        Ok(otp)
    }

    /// Whether `(email, code)` is currently valid. Never mutates state.
    pub async fn validate(&self, cx: &mut TxContext, email: &str, code: &str) -> Result<bool> {
        self.repo
            .validate(cx, email, code, Utc::now())
            .await
            .operation("validate otp")
    }

    /// Consume `(email, code)`. A code that is no longer open yields `InvalidOtp`.
    pub async fn mark_used(&self, cx: &mut TxContext, email: &str, code: &str) -> Result<()> {
        self.repo
            .mark_used(cx, email, code, Utc::now())
            .await
            .operation("consume otp")
    }

    /// Remove every outstanding code for `email`.
    pub async fn delete_all(&self, cx: &mut TxContext, email: &str) -> Result<u64> {
        let removed = self
            .repo
            .delete_all(cx, email)
            .await
            .operation("delete otps")?;
        debug!(email = %mask_email(email), removed, "OTPs deleted");
        Ok(removed)
    }

    /// Remove codes that expired more than `retention` ago.
    pub async fn purge_expired(&self, retention: Duration) -> Result<u64> {
        let mut cx = TxContext::new();
        self.repo
            .purge_expired(&mut cx, Utc::now() - retention)
            .await
            .operation("purge expired otps")
    }
}

/// Background sweeper configuration
#[derive(Debug, Clone)]
pub struct OtpSweeperConfig {
    pub interval: StdDuration,
    pub retention: Duration,
}

impl Default for OtpSweeperConfig {
    fn default() -> Self {
        Self {
            interval: StdDuration::from_secs(600),
            retention: Duration::hours(24),
        }
    }
}

/// Spawn background task that periodically purges expired codes
///
/// Failures are logged and the loop continues on the next tick.
pub fn spawn_otp_sweeper(manager: OtpManager, config: OtpSweeperConfig) -> JoinHandle<()> {
    info!(
        interval_secs = config.interval.as_secs(),
        retention_secs = config.retention.num_seconds(),
        "Starting OTP sweeper"
    );

    tokio::spawn(async move {
        let mut ticker = interval(config.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            match manager.purge_expired(config.retention).await {
                Ok(0) => {}
                Ok(purged) => info!(purged, "Expired OTPs purged"),
                Err(err) => error!(error = %err, "OTP sweep failed"),
            }
        }
    })
}
