use once_cell::sync::Lazy;
use regex::Regex;
use validator::ValidationError;

/// Input validation utilities for identity service

// Compile regex patterns once at startup
// These patterns are hardcoded and always valid, so we use expect() with explicit reasoning
static EMAIL_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$")
        .expect("hardcoded email regex is invalid - fix source code")
});

static OTP_CODE_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[0-9]{6}$").expect("hardcoded OTP code regex is invalid - fix source code")
});

/// Validate email format (RFC 5322 simplified)
pub fn validate_email(email: &str) -> bool {
    !email.is_empty() && email.len() <= 254 && EMAIL_REGEX.is_match(email)
}

/// Validate a one-time code: exactly six ASCII digits
pub fn validate_otp_code(code: &str) -> bool {
    OTP_CODE_REGEX.is_match(code)
}

/// validator crate compatible custom validator for email shape
pub fn validate_email_shape_validator(email: &str) -> Result<(), ValidationError> {
    if validate_email(email) {
        Ok(())
    } else {
        Err(ValidationError::new("invalid_email"))
    }
}

/// validator crate compatible custom validator for OTP code shape
pub fn validate_otp_code_validator(code: &str) -> Result<(), ValidationError> {
    if validate_otp_code(code) {
        Ok(())
    } else {
        Err(ValidationError::new("invalid_otp_code"))
    }
}

/// Mask an email for logging: `alice@x.com` becomes `a***@x.com`
pub fn mask_email(email: &str) -> String {
    match email.split_once('@') {
        Some((local, domain)) => {
            let mut chars = local.chars();
            match (chars.next(), local.chars().count()) {
                (Some(first), len) if len > 2 => format!("{}***@{}", first, domain),
                _ => format!("**@{}", domain),
            }
        }
        None => "***@***".to_string(),
    }
}
