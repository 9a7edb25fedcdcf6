//! Shared cryptographic primitives for the identity backend.
//!
//! - `jwt`: stateless HS256 bearer token signing and verification
//! - `otp`: one-time code generation from the operating system CSPRNG
pub mod jwt;
pub mod otp;

pub use jwt::{sign, subject, verify, Claims, TokenError};
pub use otp::generate_numeric_code;
