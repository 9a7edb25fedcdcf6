//! Transaction scope shared by the user directory and the OTP store
//!
//! A `TxContext` is threaded through every repository call. When it carries an
//! open transaction the repository issues its statements on that transaction,
//! otherwise it uses its own pool. `TxManager::run` opens the scope, runs the
//! callback and always finishes with either a commit or a rollback.
//!
//! Scopes are flattened: calling `run` with a context that already holds a
//! transaction reuses it, and only the outermost `run` decides the outcome.
//!
//! Dropping an unfinished transaction rolls it back, so a cancelled request
//! cannot leave a dangling scope behind.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;
use tracing::{debug, warn};

use crate::error::{IdentityError, Result};

/// An open unit of work on a concrete store.
#[async_trait]
pub trait Transaction: Send {
    async fn commit(self: Box<Self>) -> Result<()>;

    async fn rollback(self: Box<Self>) -> Result<()>;

    /// Lets the owning store recover its concrete transaction type.
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// Store able to start transactions.
#[async_trait]
pub trait TxBackend: Send + Sync {
    async fn begin(&self) -> Result<Box<dyn Transaction>>;
}

/// Request-scoped unit of work handle.
#[derive(Default)]
pub struct TxContext {
    tx: Option<Box<dyn Transaction>>,
}

impl TxContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn in_transaction(&self) -> bool {
        self.tx.is_some()
    }

    /// Open transaction downcast to the store's own type.
    ///
    /// Returns `None` when no transaction is open or it belongs to another store.
    pub fn transaction_mut<T: Any>(&mut self) -> Option<&mut T> {
        self.tx
            .as_mut()
            .and_then(|tx| tx.as_any_mut().downcast_mut::<T>())
    }

    /// Like `transaction_mut`, but a transaction from a different store is an error.
    pub fn participate<T: Any>(&mut self) -> Result<Option<&mut T>> {
        if !self.in_transaction() {
            return Ok(None);
        }
        self.transaction_mut::<T>().map(Some).ok_or_else(|| {
            IdentityError::Internal("open transaction belongs to a different store".to_string())
        })
    }
}

impl fmt::Debug for TxContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TxContext")
            .field("in_transaction", &self.in_transaction())
            .finish()
    }
}

/// Transactional coordinator
#[derive(Clone)]
pub struct TxManager {
    backend: Arc<dyn TxBackend>,
}

impl TxManager {
    pub fn new(backend: Arc<dyn TxBackend>) -> Self {
        Self { backend }
    }

    /// Run `op` inside a transaction scope.
    ///
    /// Commits when `op` returns `Ok`, rolls back when it returns `Err`. A commit
    /// failure is returned to the caller; a rollback failure is logged and the
    /// original error is returned.
    pub async fn run<T, F>(&self, cx: &mut TxContext, op: F) -> Result<T>
    where
        T: Send,
        F: for<'c> FnOnce(&'c mut TxContext) -> BoxFuture<'c, Result<T>> + Send,
    {
        if cx.in_transaction() {
            return op(cx).await;
        }

        cx.tx = Some(self.backend.begin().await?);
        debug!("Transaction started");

        let result = op(cx).await;

        let tx = cx.tx.take().ok_or_else(|| {
            IdentityError::Internal("transaction scope closed by callee".to_string())
        })?;

        match result {
            Ok(value) => {
                tx.commit().await?;
                debug!("Transaction committed");
                Ok(value)
            }
            Err(err) => {
                if let Err(rollback_err) = tx.rollback().await {
                    warn!(error = %rollback_err, "Transaction rollback failed");
                }
                debug!(error = %err, "Transaction rolled back");
                Err(err)
            }
        }
    }
}
