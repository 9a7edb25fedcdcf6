/// Data models for identity resolution
pub mod otp;
pub mod user;

pub use otp::Otp;
pub use user::{NewUser, OAuthPayload, Provider, User};
