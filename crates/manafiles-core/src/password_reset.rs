use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Lifetime of a reset code, from issue to password change.
pub const RESET_CODE_TTL_MINUTES: i64 = 15;

/// Number of decimal digits in a reset code.
pub const RESET_CODE_DIGITS: usize = 6;

/// Wrong guesses tolerated before a pending reset is discarded.
pub const MAX_RESET_ATTEMPTS: i64 = 5;

#[derive(Debug, Clone)]
pub struct PasswordReset {
    pub id: String,
    pub user_id: String,
    pub code_hash: String,
    /// Set once the code has been verified; the client then presents the
    /// matching raw token to choose a new password.
    pub token_hash: Option<String>,
    pub verified: bool,
    /// Failed code verifications so far.
    pub attempts: i64,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl PasswordReset {
    pub fn expiry_from(now: DateTime<Utc>) -> DateTime<Utc> {
        now + Duration::minutes(RESET_CODE_TTL_MINUTES)
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }

    pub fn attempts_exhausted(&self) -> bool {
        self.attempts >= MAX_RESET_ATTEMPTS
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestReset {
    pub email: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifyReset {
    pub email: String,
    pub code: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResetTicket {
    pub reset_token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfirmReset {
    pub reset_token: String,
    pub new_password: String,
}
