/// Identity Resolution Service
///
/// Decides register-vs-login for OAuth payloads and email one-time codes,
/// enforces that only the provider that created an identity may act on it,
/// and issues bearer tokens.
///
/// Registration paths run inside one transaction scope together with their
/// event publication: if the broker rejects the event, the new user row (and
/// the consumed code) is rolled back and the caller sees the error.
use std::sync::Arc;

use chrono::{DateTime, Utc};
use event_schema::{OtpGeneratedEvent, UserRegisteredEvent};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::db::{TxContext, TxManager, UserRepository};
use crate::error::{IdentityError, OperationContext, Result};
use crate::models::{NewUser, OAuthPayload, Provider, User};
use crate::security::TokenIssuer;
use crate::services::events::EventPublisher;
use crate::services::otp::OtpManager;
use crate::validators::mask_email;

/// Successful authentication
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthResult {
    pub access_token: String,
    pub user_id: Uuid,
    pub is_new_user: bool,
}

/// Outcome of a code request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OtpIssued {
    pub email: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Clone)]
pub struct AuthService {
    users: Arc<dyn UserRepository>,
    otps: OtpManager,
    publisher: Arc<dyn EventPublisher>,
    tx: TxManager,
    tokens: TokenIssuer,
}

impl AuthService {
    pub fn new(
        users: Arc<dyn UserRepository>,
        otps: OtpManager,
        publisher: Arc<dyn EventPublisher>,
        tx: TxManager,
        tokens: TokenIssuer,
    ) -> Self {
        Self {
            users,
            otps,
            publisher,
            tx,
            tokens,
        }
    }

    pub fn otp_manager(&self) -> &OtpManager {
        &self.otps
    }

    /// Resolve an identity returned by an OAuth provider.
    ///
    /// Unknown email: create a verified user, publish `UserRegistered` and sign,
    /// all in one transaction scope. Known email: the stored provider must equal
    /// the payload's, then a token is signed without any write.
    pub async fn oauth(&self, payload: OAuthPayload) -> Result<AuthResult> {
        if !payload.provider.is_oauth() {
            return Err(IdentityError::InvalidOAuthProvider);
        }

        let mut cx = TxContext::new();
        let lookup = self.users.get_by_email(&mut cx, &payload.email).await;
        match lookup {
            Ok(user) => {
                if user.provider != payload.provider {
                    warn!(
                        email = %mask_email(&payload.email),
                        stored = %user.provider,
                        requested = %payload.provider,
                        "OAuth login rejected: provider mismatch"
                    );
                    return Err(IdentityError::ProviderMismatch);
                }

                let access_token = self.tokens.sign(user.id).operation("sign token")?;
                info!(user_id = %user.id, provider = %user.provider, "OAuth login");
                Ok(AuthResult {
                    access_token,
                    user_id: user.id,
                    is_new_user: false,
                })
            }
            Err(IdentityError::UserNotFound) => self.register_oauth(&mut cx, payload).await,
            Err(err) => Err(err.with_operation("lookup user")),
        }
    }

    async fn register_oauth(
        &self,
        cx: &mut TxContext,
        payload: OAuthPayload,
    ) -> Result<AuthResult> {
        let svc = self.clone();
        let result = self
            .tx
            .run(cx, move |cx| {
                Box::pin(async move {
                    let user = svc
                        .users
                        .create(cx, NewUser::from_oauth(&payload))
                        .await
                        .operation("create user")?;
                    svc.publish_registered(&user).await?;
                    let access_token = svc.tokens.sign(user.id).operation("sign token")?;
                    Ok(AuthResult {
                        access_token,
                        user_id: user.id,
                        is_new_user: true,
                    })
                })
            })
            .await?;

        info!(user_id = %result.user_id, "User registered via OAuth");
        Ok(result)
    }

    /// Issue a one-time code for `email` and request its delivery.
    ///
    /// The email may not belong to any user yet. If it does, that user must
    /// have been created through the email channel.
    pub async fn generate_otp(&self, email: &str) -> Result<OtpIssued> {
        let mut cx = TxContext::new();
        let lookup = self.users.get_by_email(&mut cx, email).await;
        let user_id = match lookup {
            Ok(user) if user.provider != Provider::Email => {
                warn!(
                    email = %mask_email(email),
                    stored = %user.provider,
                    "OTP request rejected: provider mismatch"
                );
                return Err(IdentityError::ProviderMismatch);
            }
            Ok(user) => Some(user.id),
            Err(IdentityError::UserNotFound) => None,
            Err(err) => return Err(err.with_operation("lookup user")),
        };

        let svc = self.clone();
        let email_owned = email.to_string();
        let otp = self
            .tx
            .run(&mut cx, move |cx| {
                Box::pin(async move {
                    let otp = svc.otps.generate(cx, &email_owned).await?;
                    let event = OtpGeneratedEvent {
                        email: otp.email.clone(),
                        user_id,
                        code: otp.code.clone(),
                        created_at: otp.created_at,
                        expires_at: otp.expires_at,
                    };
                    svc.publisher
                        .publish_otp_generated(&event)
                        .await
                        .operation("publish otp generated")?;
                    Ok(otp)
                })
            })
            .await?;

        debug!(email = %mask_email(email), registered = user_id.is_some(), "OTP issued");
        Ok(OtpIssued {
            email: otp.email,
            expires_at: otp.expires_at,
        })
    }

    /// Verify a one-time code and log the user in, creating the account on
    /// first use.
    ///
    /// The code is checked read-only first; an invalid code fails without
    /// opening a transaction. Consumption, account resolution and signing then
    /// share one scope, and losing a concurrent consumption race is reported as
    /// `InvalidOtp`.
    pub async fn verify_otp(&self, email: &str, code: &str) -> Result<AuthResult> {
        let mut cx = TxContext::new();
        if !self.otps.validate(&mut cx, email, code).await? {
            debug!(email = %mask_email(email), "OTP verification failed");
            return Err(IdentityError::InvalidOtp);
        }

        let svc = self.clone();
        let email = email.to_string();
        let code = code.to_string();
        let result = self
            .tx
            .run(&mut cx, move |cx| {
                Box::pin(async move {
                    svc.otps.mark_used(cx, &email, &code).await?;

                    let lookup = svc.users.get_by_email(cx, &email).await;
                    let (user, is_new_user) = match lookup {
                        Ok(user) => {
                            if user.provider != Provider::Email {
                                return Err(IdentityError::ProviderMismatch);
                            }
                            if !user.email_verified {
                                svc.users
                                    .mark_email_verified(cx, user.id)
                                    .await
                                    .operation("mark email verified")?;
                            }
                            (user, false)
                        }
                        Err(IdentityError::UserNotFound) => {
                            let user = svc
                                .users
                                .create(cx, NewUser::verified_email(email.clone()))
                                .await
                                .operation("create user")?;
                            svc.publish_registered(&user).await?;
                            (user, true)
                        }
                        Err(err) => return Err(err.with_operation("lookup user")),
                    };

                    let access_token = svc.tokens.sign(user.id).operation("sign token")?;
                    Ok(AuthResult {
                        access_token,
                        user_id: user.id,
                        is_new_user,
                    })
                })
            })
            .await?;

        info!(
            user_id = %result.user_id,
            is_new_user = result.is_new_user,
            "OTP login"
        );
        Ok(result)
    }

    /// Verify a bearer token issued by this service. No storage is consulted.
    pub fn verify_token(&self, token: &str) -> Result<Uuid> {
        self.tokens.verify(token)
    }

    async fn publish_registered(&self, user: &User) -> Result<()> {
        let event = UserRegisteredEvent {
            user_id: user.id,
            email: user.email.clone(),
            provider: user.provider.to_string(),
            full_name: user.full_name.clone(),
            avatar_url: user.avatar_url.clone(),
        };
        self.publisher
            .publish_user_registered(&event)
            .await
            .operation("publish user registered")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::users::MockUserRepository;
    use crate::db::MemoryStore;
    use crate::services::events::MockEventPublisher;
    use chrono::Duration;

    const SECRET: &[u8] = b"auth-service-unit-test-secret-0123456789";

    fn user(email: &str, provider: Provider) -> User {
        User {
            id: Uuid::new_v4(),
            email: email.to_string(),
            provider,
            email_verified: true,
            full_name: None,
            avatar_url: None,
            created_at: Utc::now(),
        }
    }

    fn payload(email: &str, provider: Provider) -> OAuthPayload {
        OAuthPayload {
            email: email.to_string(),
            provider,
            full_name: Some("Bee".to_string()),
            avatar_url: Some("https://example.com/b.png".to_string()),
        }
    }

    fn service(users: MockUserRepository, publisher: MockEventPublisher) -> AuthService {
        let store = MemoryStore::new();
        AuthService::new(
            Arc::new(users),
            OtpManager::new(Arc::new(store.clone())),
            Arc::new(publisher),
            TxManager::new(Arc::new(store)),
            TokenIssuer::new(SECRET.to_vec(), Duration::hours(24)),
        )
    }

    #[tokio::test]
    async fn test_oauth_registers_unknown_email() {
        let mut users = MockUserRepository::new();
        users
            .expect_get_by_email()
            .times(1)
            .returning(|_, _| Err(IdentityError::UserNotFound));
        let created_id = Uuid::new_v4();
        users.expect_create().times(1).returning(move |_, new_user| {
            assert_eq!(new_user.email, "b@x.com");
            assert_eq!(new_user.provider, Provider::Google);
            assert!(new_user.email_verified);
            assert_eq!(new_user.full_name.as_deref(), Some("Bee"));
            Ok(User {
                id: created_id,
                email: new_user.email.clone(),
                provider: new_user.provider,
                email_verified: new_user.email_verified,
                full_name: new_user.full_name.clone(),
                avatar_url: new_user.avatar_url.clone(),
                created_at: Utc::now(),
            })
        });

        let mut publisher = MockEventPublisher::new();
        publisher
            .expect_publish_user_registered()
            .times(1)
            .returning(move |event| {
                assert_eq!(event.user_id, created_id);
                assert_eq!(event.provider, "google");
                assert_eq!(event.avatar_url.as_deref(), Some("https://example.com/b.png"));
                Ok(())
            });

        let svc = service(users, publisher);
        let result = svc.oauth(payload("b@x.com", Provider::Google)).await.unwrap();

        assert!(result.is_new_user);
        assert_eq!(result.user_id, created_id);
        assert_eq!(svc.verify_token(&result.access_token).unwrap(), created_id);
    }

    #[tokio::test]
    async fn test_oauth_login_with_matching_provider_makes_no_writes() {
        let existing = user("b@x.com", Provider::Google);
        let existing_id = existing.id;
        let mut users = MockUserRepository::new();
        users
            .expect_get_by_email()
            .times(1)
            .returning(move |_, _| Ok(existing.clone()));
        users.expect_create().times(0);

        let mut publisher = MockEventPublisher::new();
        publisher.expect_publish_user_registered().times(0);

        let svc = service(users, publisher);
        let result = svc.oauth(payload("b@x.com", Provider::Google)).await.unwrap();

        assert!(!result.is_new_user);
        assert_eq!(result.user_id, existing_id);
    }

    #[tokio::test]
    async fn test_oauth_provider_mismatch_is_rejected() {
        let mut users = MockUserRepository::new();
        users
            .expect_get_by_email()
            .times(1)
            .returning(|_, email| Ok(user(email, Provider::Google)));
        users.expect_create().times(0);

        let mut publisher = MockEventPublisher::new();
        publisher.expect_publish_user_registered().times(0);

        let svc = service(users, publisher);
        let err = svc
            .oauth(payload("b@x.com", Provider::Yandex))
            .await
            .unwrap_err();

        assert!(matches!(err, IdentityError::ProviderMismatch));
    }

    #[tokio::test]
    async fn test_oauth_rejects_email_provider_payload() {
        let mut users = MockUserRepository::new();
        users.expect_get_by_email().times(0);

        let svc = service(users, MockEventPublisher::new());
        let err = svc
            .oauth(payload("b@x.com", Provider::Email))
            .await
            .unwrap_err();

        assert!(matches!(err, IdentityError::InvalidOAuthProvider));
    }

    #[tokio::test]
    async fn test_oauth_publish_failure_is_propagated() {
        let mut users = MockUserRepository::new();
        users
            .expect_get_by_email()
            .returning(|_, _| Err(IdentityError::UserNotFound));
        users
            .expect_create()
            .times(1)
            .returning(|_, new_user| Ok(user(&new_user.email, new_user.provider)));

        let mut publisher = MockEventPublisher::new();
        publisher
            .expect_publish_user_registered()
            .times(1)
            .returning(|_| Err(IdentityError::EventPublish("broker unreachable".into())));

        let svc = service(users, publisher);
        let err = svc
            .oauth(payload("b@x.com", Provider::Google))
            .await
            .unwrap_err();

        assert_eq!(
            err.to_string(),
            "Event publish error: publish user registered: broker unreachable"
        );
    }

    #[tokio::test]
    async fn test_oauth_lookup_failure_carries_operation() {
        let mut users = MockUserRepository::new();
        users
            .expect_get_by_email()
            .returning(|_, _| Err(IdentityError::Database("connection refused".into())));
        users.expect_create().times(0);

        let svc = service(users, MockEventPublisher::new());
        let err = svc
            .oauth(payload("b@x.com", Provider::Google))
            .await
            .unwrap_err();

        assert_eq!(
            err.to_string(),
            "Database error: lookup user: connection refused"
        );
    }

    #[tokio::test]
    async fn test_generate_otp_for_oauth_account_is_rejected() {
        let mut users = MockUserRepository::new();
        users
            .expect_get_by_email()
            .returning(|_, email| Ok(user(email, Provider::Yandex)));

        let mut publisher = MockEventPublisher::new();
        publisher.expect_publish_otp_generated().times(0);

        let svc = service(users, publisher);
        let err = svc.generate_otp("y@x.com").await.unwrap_err();

        assert!(matches!(err, IdentityError::ProviderMismatch));
    }

    #[tokio::test]
    async fn test_generate_otp_event_carries_known_user_id() {
        let existing = user("a@x.com", Provider::Email);
        let existing_id = existing.id;
        let mut users = MockUserRepository::new();
        users
            .expect_get_by_email()
            .returning(move |_, _| Ok(existing.clone()));

        let mut publisher = MockEventPublisher::new();
        publisher
            .expect_publish_otp_generated()
            .times(1)
            .returning(move |event| {
                assert_eq!(event.email, "a@x.com");
                assert_eq!(event.user_id, Some(existing_id));
                assert_eq!(event.code.len(), 6);
                assert_eq!(event.expires_at - event.created_at, Duration::minutes(5));
                Ok(())
            });

        let svc = service(users, publisher);
        let issued = svc.generate_otp("a@x.com").await.unwrap();

        assert_eq!(issued.email, "a@x.com");
    }

    #[tokio::test]
    async fn test_verify_otp_with_unknown_code_opens_no_scope() {
        let mut users = MockUserRepository::new();
        users.expect_get_by_email().times(0);
        users.expect_create().times(0);

        let mut publisher = MockEventPublisher::new();
        publisher.expect_publish_user_registered().times(0);

        let svc = service(users, publisher);
        let err = svc.verify_otp("a@x.com", "000000").await.unwrap_err();

        assert!(matches!(err, IdentityError::InvalidOtp));
    }

    #[tokio::test]
    async fn test_verify_otp_marks_unverified_email_account() {
        let mut existing = user("a@x.com", Provider::Email);
        existing.email_verified = false;
        let existing_id = existing.id;

        let mut users = MockUserRepository::new();
        users
            .expect_get_by_email()
            .returning(move |_, _| Ok(existing.clone()));
        users
            .expect_mark_email_verified()
            .times(1)
            .returning(move |_, user_id| {
                assert_eq!(user_id, existing_id);
                Ok(())
            });
        users.expect_create().times(0);

        let mut publisher = MockEventPublisher::new();
        publisher.expect_publish_user_registered().times(0);

        let svc = service(users, publisher);
        let mut cx = TxContext::new();
        let otp = svc.otp_manager().generate(&mut cx, "a@x.com").await.unwrap();

        let result = svc.verify_otp("a@x.com", &otp.code).await.unwrap();
        assert!(!result.is_new_user);
        assert_eq!(result.user_id, existing_id);
    }
}
