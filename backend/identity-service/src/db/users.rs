/// User directory: identity records keyed by email
use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::db::pg::PgTransaction;
use crate::db::tx::TxContext;
use crate::error::{IdentityError, Result};
use crate::models::{NewUser, User};

const USER_COLUMNS: &str =
    "user_id, email, provider, is_email_verified, full_name, avatar_url, created_at";

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Exact, case-sensitive lookup. Absence is `IdentityError::UserNotFound`.
    async fn get_by_email(&self, cx: &mut TxContext, email: &str) -> Result<User>;

    /// Insert a new identity; the store mints the id.
    async fn create(&self, cx: &mut TxContext, new_user: NewUser) -> Result<User>;

    async fn mark_email_verified(&self, cx: &mut TxContext, user_id: Uuid) -> Result<()>;
}

/// PostgreSQL-backed user directory
#[derive(Clone)]
pub struct PgUserRepository {
    pool: PgPool,
}

impl PgUserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserRepository for PgUserRepository {
    async fn get_by_email(&self, cx: &mut TxContext, email: &str) -> Result<User> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1");
        let query = sqlx::query_as::<_, User>(&sql).bind(email);

        let user = match cx.participate::<PgTransaction>()? {
            Some(tx) => query.fetch_optional(tx.conn()).await?,
            None => query.fetch_optional(&self.pool).await?,
        };

        user.ok_or(IdentityError::UserNotFound)
    }

    async fn create(&self, cx: &mut TxContext, new_user: NewUser) -> Result<User> {
        let sql = format!(
            r#"
            INSERT INTO users (email, provider, is_email_verified, full_name, avatar_url)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {USER_COLUMNS}
            "#
        );
        let query = sqlx::query_as::<_, User>(&sql)
            .bind(&new_user.email)
            .bind(new_user.provider)
            .bind(new_user.email_verified)
            .bind(&new_user.full_name)
            .bind(&new_user.avatar_url);

        let user = match cx.participate::<PgTransaction>()? {
            Some(tx) => query.fetch_one(tx.conn()).await?,
            None => query.fetch_one(&self.pool).await?,
        };

        Ok(user)
    }

    async fn mark_email_verified(&self, cx: &mut TxContext, user_id: Uuid) -> Result<()> {
        let query =
            sqlx::query("UPDATE users SET is_email_verified = TRUE WHERE user_id = $1").bind(user_id);

        let result = match cx.participate::<PgTransaction>()? {
            Some(tx) => query.execute(tx.conn()).await?,
            None => query.execute(&self.pool).await?,
        };

        if result.rows_affected() == 0 {
            return Err(IdentityError::UserNotFound);
        }

        Ok(())
    }
}
