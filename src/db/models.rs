use crate::error::HeavenError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use subtle::ConstantTimeEq;

#[derive(Debug, Clone, PartialEq)]
pub struct DbUser {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub password_hash: Option<String>,
    pub google_id: Option<String>,
    pub is_verified: bool,
    pub otp: Option<String>,
    pub otp_expiry: Option<DateTime<Utc>>,
    pub reset_expiry: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl DbUser {
    /// Check a submitted code against the stored OTP.
    ///
    /// Expiry is checked after the code itself so a wrong guess never
    /// learns whether a code is still pending.
    pub fn check_otp(&self, submitted: &str, now: DateTime<Utc>) -> Result<(), HeavenError> {
        let Some(stored) = self.otp.as_deref() else {
            return Err(HeavenError::InvalidOtp);
        };
        let submitted = submitted.trim();
        if !bool::from(stored.as_bytes().ct_eq(submitted.as_bytes())) {
            return Err(HeavenError::InvalidOtp);
        }
        match self.otp_expiry {
            Some(expiry) if expiry > now => Ok(()),
            _ => Err(HeavenError::OtpExpired),
        }
    }

    pub fn reset_window_open(&self, now: DateTime<Utc>) -> bool {
        self.reset_expiry.is_some_and(|until| until > now)
    }
}

/// Insert payload for a new user row.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password_hash: Option<String>,
    pub google_id: Option<String>,
    pub is_verified: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DbContact {
    pub id: i64,
    pub user_id: i64,
    pub name: String,
    pub email: Option<String>,
    pub phone: String,
    pub relation: Option<String>,
}

/// Insert/update payload for an emergency contact.
#[derive(Debug, Clone)]
pub struct NewContact {
    pub name: String,
    pub email: Option<String>,
    pub phone: String,
    pub relation: Option<String>,
}
