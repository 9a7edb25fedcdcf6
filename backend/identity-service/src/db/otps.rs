/// One-time code storage keyed by email
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::db::pg::PgTransaction;
use crate::db::tx::TxContext;
use crate::error::{IdentityError, Result};
use crate::models::Otp;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait OtpRepository: Send + Sync {
    async fn insert(
        &self,
        cx: &mut TxContext,
        email: &str,
        code: &str,
        created_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Result<Otp>;

    /// Whether an unused code matching `(email, code)` is still open at `now`. Read-only.
    async fn validate(
        &self,
        cx: &mut TxContext,
        email: &str,
        code: &str,
        now: DateTime<Utc>,
    ) -> Result<bool>;

    /// Consume the matching code.
    ///
    /// Fails with `IdentityError::InvalidOtp` when no open row was updated, which is
    /// how a concurrent verification that lost the race observes "already used".
    async fn mark_used(
        &self,
        cx: &mut TxContext,
        email: &str,
        code: &str,
        now: DateTime<Utc>,
    ) -> Result<()>;

    /// Remove every code issued to `email`, returning the number removed.
    async fn delete_all(&self, cx: &mut TxContext, email: &str) -> Result<u64>;

    /// Remove rows that expired before `before`, used or not.
    async fn purge_expired(&self, cx: &mut TxContext, before: DateTime<Utc>) -> Result<u64>;
}

/// PostgreSQL-backed OTP store (email_otps)
#[derive(Clone)]
pub struct PgOtpRepository {
    pool: PgPool,
}

impl PgOtpRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl OtpRepository for PgOtpRepository {
    async fn insert(
        &self,
        cx: &mut TxContext,
        email: &str,
        code: &str,
        created_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Result<Otp> {
        let query = sqlx::query_as::<_, Otp>(
            r#"
            INSERT INTO email_otps (email, code, created_at, expires_at)
            VALUES ($1, $2, $3, $4)
            RETURNING otp_id, email, code, created_at, expires_at, is_used
            "#,
        )
        .bind(email)
        .bind(code)
        .bind(created_at)
        .bind(expires_at);

        let otp = match cx.participate::<PgTransaction>()? {
            Some(tx) => query.fetch_one(tx.conn()).await?,
            None => query.fetch_one(&self.pool).await?,
        };

        Ok(otp)
    }

    async fn validate(
        &self,
        cx: &mut TxContext,
        email: &str,
        code: &str,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        let query = sqlx::query_scalar::<_, bool>(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM email_otps
                WHERE email = $1 AND code = $2 AND is_used = FALSE AND expires_at > $3
            )
            "#,
        )
        .bind(email)
        .bind(code)
        .bind(now);

        let exists = match cx.participate::<PgTransaction>()? {
            Some(tx) => query.fetch_one(tx.conn()).await?,
            None => query.fetch_one(&self.pool).await?,
        };

        Ok(exists)
    }

    async fn mark_used(
        &self,
        cx: &mut TxContext,
        email: &str,
        code: &str,
        now: DateTime<Utc>,
    ) -> Result<()> {
        // The predicate re-checks the window so the UPDATE itself arbitrates races.
        let query = sqlx::query(
            r#"
            UPDATE email_otps SET is_used = TRUE
            WHERE email = $1 AND code = $2 AND is_used = FALSE AND expires_at > $3
            "#,
        )
        .bind(email)
        .bind(code)
        .bind(now);

        let result = match cx.participate::<PgTransaction>()? {
            Some(tx) => query.execute(tx.conn()).await?,
            None => query.execute(&self.pool).await?,
        };

        if result.rows_affected() == 0 {
            return Err(IdentityError::InvalidOtp);
        }

        Ok(())
    }

    async fn delete_all(&self, cx: &mut TxContext, email: &str) -> Result<u64> {
        let query = sqlx::query("DELETE FROM email_otps WHERE email = $1").bind(email);

        let result = match cx.participate::<PgTransaction>()? {
            Some(tx) => query.execute(tx.conn()).await?,
            None => query.execute(&self.pool).await?,
        };

        Ok(result.rows_affected())
    }

    async fn purge_expired(&self, cx: &mut TxContext, before: DateTime<Utc>) -> Result<u64> {
        let query = sqlx::query("DELETE FROM email_otps WHERE expires_at < $1").bind(before);

        let result = match cx.participate::<PgTransaction>()? {
            Some(tx) => query.execute(tx.conn()).await?,
            None => query.execute(&self.pool).await?,
        };

        Ok(result.rows_affected())
    }
}
