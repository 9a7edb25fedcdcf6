#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Duration;
use event_schema::{OtpGeneratedEvent, UserRegisteredEvent};
use identity_service::db::{MemoryStore, TxManager};
use identity_service::error::{IdentityError, Result};
use identity_service::models::{OAuthPayload, Provider};
use identity_service::security::TokenIssuer;
use identity_service::services::{AuthService, EventPublisher, OAuthExchange, OtpManager};

pub const SECRET: &[u8] = b"integration-test-signing-secret-0123456789";

/// Publisher that records every accepted event and can be switched to fail.
#[derive(Default)]
pub struct RecordingPublisher {
    registered: Mutex<Vec<UserRegisteredEvent>>,
    otps: Mutex<Vec<OtpGeneratedEvent>>,
    failing: AtomicBool,
    stalled: AtomicBool,
}

impl RecordingPublisher {
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Make every publish wait forever, like a broker that never acknowledges.
    pub fn set_stalled(&self, stalled: bool) {
        self.stalled.store(stalled, Ordering::SeqCst);
    }

    pub fn registered(&self) -> Vec<UserRegisteredEvent> {
        self.registered.lock().unwrap().clone()
    }

    pub fn otps(&self) -> Vec<OtpGeneratedEvent> {
        self.otps.lock().unwrap().clone()
    }

    /// Code carried by the most recent OtpGenerated event for `email`.
    pub fn last_code_for(&self, email: &str) -> Option<String> {
        self.otps
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|event| event.email == email)
            .map(|event| event.code.clone())
    }

    async fn check(&self) -> Result<()> {
        if self.stalled.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        if self.failing.load(Ordering::SeqCst) {
            return Err(IdentityError::EventPublish("broker unavailable".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl EventPublisher for RecordingPublisher {
    async fn publish_user_registered(&self, event: &UserRegisteredEvent) -> Result<()> {
        self.check().await?;
        self.registered.lock().unwrap().push(event.clone());
        Ok(())
    }

    async fn publish_otp_generated(&self, event: &OtpGeneratedEvent) -> Result<()> {
        self.check().await?;
        self.otps.lock().unwrap().push(event.clone());
        Ok(())
    }
}

/// OAuth collaborator answering from a fixed code table.
#[derive(Default)]
pub struct FakeOAuth {
    profiles: HashMap<(Provider, String), OAuthPayload>,
}

impl FakeOAuth {
    pub fn with_profile(mut self, code: &str, payload: OAuthPayload) -> Self {
        self.profiles
            .insert((payload.provider, code.to_string()), payload);
        self
    }
}

#[async_trait]
impl OAuthExchange for FakeOAuth {
    async fn exchange(&self, provider: Provider, code: &str) -> Result<OAuthPayload> {
        self.profiles
            .get(&(provider, code.to_string()))
            .cloned()
            .ok_or_else(|| IdentityError::OAuthError("invalid_grant".to_string()))
    }
}

pub struct Harness {
    pub store: MemoryStore,
    pub publisher: Arc<RecordingPublisher>,
    pub auth: AuthService,
}

pub fn harness() -> Harness {
    let store = MemoryStore::new();
    let publisher = Arc::new(RecordingPublisher::default());
    let auth = AuthService::new(
        Arc::new(store.clone()),
        OtpManager::new(Arc::new(store.clone())),
        publisher.clone(),
        TxManager::new(Arc::new(store.clone())),
        TokenIssuer::new(SECRET.to_vec(), Duration::hours(24)),
    );
    Harness {
        store,
        publisher,
        auth,
    }
}

pub fn oauth_payload(email: &str, provider: Provider) -> OAuthPayload {
    OAuthPayload {
        email: email.to_string(),
        provider,
        full_name: Some("Test User".to_string()),
        avatar_url: None,
    }
}
