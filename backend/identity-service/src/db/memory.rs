//! In-process store implementing the user directory, the OTP store and the
//! transaction backend
//!
//! A transaction holds the store lock for its whole lifetime and keeps a
//! snapshot of the state taken at `begin`. Rollback, or dropping the
//! transaction without committing, restores the snapshot. Calls made outside a
//! transaction lock the store for the duration of the single operation.

use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

use crate::db::otps::OtpRepository;
use crate::db::tx::{Transaction, TxBackend, TxContext};
use crate::db::users::UserRepository;
use crate::error::{IdentityError, Result};
use crate::models::{NewUser, Otp, User};

#[derive(Debug, Clone, Default)]
struct MemoryState {
    users: HashMap<String, User>,
    otps: Vec<Otp>,
    next_otp_id: i64,
}

/// Shared handle; clones see the same data.
#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored identities.
    pub async fn user_count(&self) -> usize {
        self.state.lock().await.users.len()
    }

    /// Snapshot of every code row issued to `email`.
    pub async fn otps_for(&self, email: &str) -> Vec<Otp> {
        self.state
            .lock()
            .await
            .otps
            .iter()
            .filter(|otp| otp.email == email)
            .cloned()
            .collect()
    }

    async fn with_state<R, F>(&self, cx: &mut TxContext, f: F) -> Result<R>
    where
        F: FnOnce(&mut MemoryState) -> Result<R> + Send,
        R: Send,
    {
        if let Some(tx) = cx.participate::<MemoryTransaction>()? {
            return f(&mut *tx.guard);
        }
        let mut state = self.state.lock().await;
        f(&mut *state)
    }
}

/// Open transaction on a `MemoryStore`.
pub struct MemoryTransaction {
    guard: OwnedMutexGuard<MemoryState>,
    snapshot: Option<MemoryState>,
}

impl Drop for MemoryTransaction {
    fn drop(&mut self) {
        if let Some(snapshot) = self.snapshot.take() {
            *self.guard = snapshot;
        }
    }
}

#[async_trait]
impl Transaction for MemoryTransaction {
    async fn commit(self: Box<Self>) -> Result<()> {
        let mut this = self;
        this.snapshot = None;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        // Drop restores the snapshot.
        drop(self);
        Ok(())
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

#[async_trait]
impl TxBackend for MemoryStore {
    async fn begin(&self) -> Result<Box<dyn Transaction>> {
        let guard = self.state.clone().lock_owned().await;
        let snapshot = Some(guard.clone());
        Ok(Box::new(MemoryTransaction { guard, snapshot }))
    }
}

#[async_trait]
impl UserRepository for MemoryStore {
    async fn get_by_email(&self, cx: &mut TxContext, email: &str) -> Result<User> {
        self.with_state(cx, |state| {
            state
                .users
                .get(email)
                .cloned()
                .ok_or(IdentityError::UserNotFound)
        })
        .await
    }

    async fn create(&self, cx: &mut TxContext, new_user: NewUser) -> Result<User> {
        self.with_state(cx, move |state| {
            if state.users.contains_key(&new_user.email) {
                return Err(IdentityError::Database(
                    "duplicate key value violates unique constraint \"users_email_key\""
                        .to_string(),
                ));
            }
            let user = User {
                id: Uuid::new_v4(),
                email: new_user.email,
                provider: new_user.provider,
                email_verified: new_user.email_verified,
                full_name: new_user.full_name,
                avatar_url: new_user.avatar_url,
                created_at: Utc::now(),
            };
            state.users.insert(user.email.clone(), user.clone());
            Ok(user)
        })
        .await
    }

    async fn mark_email_verified(&self, cx: &mut TxContext, user_id: Uuid) -> Result<()> {
        self.with_state(cx, |state| {
            let user = state
                .users
                .values_mut()
                .find(|user| user.id == user_id)
                .ok_or(IdentityError::UserNotFound)?;
            user.email_verified = true;
            Ok(())
        })
        .await
    }
}

#[async_trait]
impl OtpRepository for MemoryStore {
    async fn insert(
        &self,
        cx: &mut TxContext,
        email: &str,
        code: &str,
        created_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Result<Otp> {
        self.with_state(cx, |state| {
            state.next_otp_id += 1;
            let otp = Otp {
                id: state.next_otp_id,
                email: email.to_string(),
                code: code.to_string(),
                created_at,
                expires_at,
                used: false,
            };
            state.otps.push(otp.clone());
            Ok(otp)
        })
        .await
    }

    async fn validate(
        &self,
        cx: &mut TxContext,
        email: &str,
        code: &str,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        self.with_state(cx, |state| {
            Ok(state
                .otps
                .iter()
                .any(|otp| otp.email == email && otp.code == code && otp.is_valid_at(now)))
        })
        .await
    }

    async fn mark_used(
        &self,
        cx: &mut TxContext,
        email: &str,
        code: &str,
        now: DateTime<Utc>,
    ) -> Result<()> {
        self.with_state(cx, |state| {
            let mut updated = 0;
            for otp in state
                .otps
                .iter_mut()
                .filter(|otp| otp.email == email && otp.code == code && otp.is_valid_at(now))
            {
                otp.used = true;
                updated += 1;
            }
            if updated == 0 {
                return Err(IdentityError::InvalidOtp);
            }
            Ok(())
        })
        .await
    }

    async fn delete_all(&self, cx: &mut TxContext, email: &str) -> Result<u64> {
        self.with_state(cx, |state| {
            let before = state.otps.len();
            state.otps.retain(|otp| otp.email != email);
            Ok((before - state.otps.len()) as u64)
        })
        .await
    }

    async fn purge_expired(&self, cx: &mut TxContext, before: DateTime<Utc>) -> Result<u64> {
        self.with_state(cx, |state| {
            let count = state.otps.len();
            state.otps.retain(|otp| otp.expires_at >= before);
            Ok((count - state.otps.len()) as u64)
        })
        .await
    }
}
