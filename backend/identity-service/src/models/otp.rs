use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// One-time code row from email_otps
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Otp {
    #[sqlx(rename = "otp_id")]
    pub id: i64,
    pub email: String,
    pub code: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    #[sqlx(rename = "is_used")]
    pub used: bool,
}

impl Otp {
    /// A code validates only while unused and strictly before its expiry.
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        !self.used && now < self.expires_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn otp(used: bool, expires_in: Duration) -> Otp {
        let now = Utc::now();
        Otp {
            id: 1,
            email: "a@x.com".into(),
            code: "482193".into(),
            created_at: now,
            expires_at: now + expires_in,
            used,
        }
    }

    #[test]
    fn test_validity_window() {
        let now = Utc::now();
        assert!(otp(false, Duration::minutes(5)).is_valid_at(now));
        assert!(!otp(true, Duration::minutes(5)).is_valid_at(now));
        assert!(!otp(false, Duration::seconds(-1)).is_valid_at(now));
    }

    #[test]
    fn test_expiry_boundary_is_exclusive() {
        let row = otp(false, Duration::minutes(5));
        assert!(!row.is_valid_at(row.expires_at));
    }
}
