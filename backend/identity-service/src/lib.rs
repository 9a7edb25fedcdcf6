/// Identity Service Library
///
/// Authenticates users through OAuth (Google, Yandex) and passwordless email
/// one-time codes, and issues stateless bearer tokens.
///
/// ## Modules
///
/// - `config`: Service configuration
/// - `db`: User directory, OTP store and transaction scopes (PostgreSQL and in-memory)
/// - `error`: Error types
/// - `http`: HTTP transport
/// - `models`: Data models
/// - `security`: Token issuance
/// - `services`: Identity resolution, OTP manager, event publishing, OAuth exchange
/// - `validators`: Input validation
pub mod config;
pub mod db;
pub mod error;
pub mod http;
pub mod models;
pub mod security;
pub mod services;
pub mod validators;

// Re-export commonly used types
pub use error::{IdentityError, Result};
pub use services::AuthService;
