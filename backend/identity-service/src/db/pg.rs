/// PostgreSQL transaction backend
use std::any::Any;

use async_trait::async_trait;
use sqlx::{PgConnection, PgPool, Postgres};

use crate::db::tx::{Transaction, TxBackend};
use crate::error::Result;

/// Starts transactions on a shared `PgPool`.
#[derive(Clone)]
pub struct PgTxBackend {
    pool: PgPool,
}

impl PgTxBackend {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TxBackend for PgTxBackend {
    async fn begin(&self) -> Result<Box<dyn Transaction>> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgTransaction { inner: tx }))
    }
}

/// Open PostgreSQL transaction. Dropping it without commit rolls back.
pub struct PgTransaction {
    inner: sqlx::Transaction<'static, Postgres>,
}

impl PgTransaction {
    pub fn conn(&mut self) -> &mut PgConnection {
        &mut self.inner
    }
}

#[async_trait]
impl Transaction for PgTransaction {
    async fn commit(self: Box<Self>) -> Result<()> {
        self.inner.commit().await?;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        self.inner.rollback().await?;
        Ok(())
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
