//! Verification code models.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// What a code proves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CodePurpose {
    Signup,
    PasswordReset,
}

impl CodePurpose {
    pub fn as_str(&self) -> &'static str {
        match self {
            CodePurpose::Signup => "signup",
            CodePurpose::PasswordReset => "password-reset",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "signup" => Some(CodePurpose::Signup),
            "password-reset" => Some(CodePurpose::PasswordReset),
            _ => None,
        }
    }

    /// Lifetime of a freshly issued code.
    pub fn ttl(&self) -> Duration {
        match self {
            CodePurpose::Signup => Duration::minutes(10),
            CodePurpose::PasswordReset => Duration::minutes(30),
        }
    }
}

/// A short-lived code bound to an email and a purpose.
#[derive(Debug, Clone, PartialEq)]
pub struct VerificationCode {
    pub id: Uuid,
    /// Case-folded.
    pub email: String,
    /// SHA-256 hex digest of the 4-digit code.
    pub code_hash: String,
    pub purpose: CodePurpose,
    /// Password hash applied when the code is consumed (placeholder
    /// activation through signup).
    pub password_hash: Option<String>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub verified: bool,
    pub attempts: i32,
}

impl VerificationCode {
    /// Unexpired and unconsumed at `now`. Expiry is exclusive: a code is
    /// dead at exactly `expires_at`.
    pub fn is_live(&self, now: DateTime<Utc>) -> bool {
        !self.verified && now < self.expires_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn code(created_at: DateTime<Utc>, purpose: CodePurpose) -> VerificationCode {
        VerificationCode {
            id: Uuid::nil(),
            email: "a@b.co".into(),
            code_hash: String::new(),
            purpose,
            password_hash: None,
            created_at,
            expires_at: created_at + purpose.ttl(),
            verified: false,
            attempts: 0,
        }
    }

    #[test]
    fn signup_code_dies_after_ten_minutes() {
        let t = Utc::now();
        let c = code(t, CodePurpose::Signup);
        assert!(c.is_live(t + Duration::minutes(9)));
        assert!(!c.is_live(t + Duration::minutes(10) + Duration::seconds(1)));
    }

    #[test]
    fn reset_code_lives_thirty_minutes() {
        let t = Utc::now();
        let c = code(t, CodePurpose::PasswordReset);
        assert!(c.is_live(t + Duration::minutes(29)));
        assert!(!c.is_live(t + Duration::minutes(30)));
    }

    #[test]
    fn verified_code_is_dead() {
        let t = Utc::now();
        let mut c = code(t, CodePurpose::Signup);
        c.verified = true;
        assert!(!c.is_live(t));
    }
}
