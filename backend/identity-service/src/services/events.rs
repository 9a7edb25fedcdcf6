/// Event publisher boundary
///
/// The orchestrator depends only on this contract. Implementations must not
/// return `Ok` until the broker has accepted the event, because the caller
/// commits its transaction on `Ok` and rolls back on `Err`.
use async_trait::async_trait;
use event_schema::{OtpGeneratedEvent, UserRegisteredEvent};

use crate::error::Result;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish_user_registered(&self, event: &UserRegisteredEvent) -> Result<()>;

    async fn publish_otp_generated(&self, event: &OtpGeneratedEvent) -> Result<()>;
}
