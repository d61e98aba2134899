//! Verification code issuance and redemption.
//!
//! Codes are 4 digits drawn from the thread-local CSPRNG and only their
//! SHA-256 digest is stored. A live code survives [`MAX_ATTEMPTS`] wrong
//! guesses; the last one deletes it.

use chrono::{DateTime, Utc};
use rand::{Rng, rng};
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use crate::error::{CoreError, CoreResult};
use crate::models::verification::{CodePurpose, VerificationCode};
use crate::store::Store;
use crate::ids::new_id;

/// Wrong guesses tolerated per code.
pub const MAX_ATTEMPTS: i32 = 5;

/// Uniform 4-digit code, zero padded.
pub fn generate_code() -> String {
    format!("{:04}", rng().random_range(0..10_000u32))
}

/// SHA-256 hex digest of a code.
pub fn hash_code(code: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(code.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Issue a fresh code for `(email, purpose)`, replacing any earlier one.
/// Returns the plaintext for mailing.
pub async fn issue(
    store: &dyn Store,
    email: &str,
    purpose: CodePurpose,
    password_hash: Option<String>,
    now: DateTime<Utc>,
) -> CoreResult<String> {
    let code = generate_code();
    store
        .replace_code(VerificationCode {
            id: new_id(),
            email: email.to_string(),
            code_hash: hash_code(&code),
            purpose,
            password_hash,
            created_at: now,
            expires_at: now + purpose.ttl(),
            verified: false,
            attempts: 0,
        })
        .await?;
    debug!(email, purpose = purpose.as_str(), "verification code issued");
    Ok(code)
}

/// Match `code` against the live code for `(email, purpose)` and consume it.
///
/// Fails with `InvalidCode` when nothing live matches (expired, already
/// used, or wrong) and with `TooManyAttempts` on the guess that exhausts
/// the code.
pub async fn redeem(
    store: &dyn Store,
    email: &str,
    purpose: CodePurpose,
    code: &str,
    now: DateTime<Utc>,
) -> CoreResult<VerificationCode> {
    let live = store
        .live_code(email, purpose, now)
        .await?
        .ok_or(CoreError::InvalidCode)?;

    if live.code_hash != hash_code(code.trim()) {
        let attempts = store.record_failed_attempt(live.id).await?;
        if attempts >= MAX_ATTEMPTS {
            store.delete_code(live.id).await?;
            warn!(email, purpose = purpose.as_str(), "verification code attempt limit reached");
            return Err(CoreError::TooManyAttempts);
        }
        return Err(CoreError::InvalidCode);
    }

    // A concurrent redeem may have won the race.
    if !store.consume_code(live.id).await? {
        return Err(CoreError::InvalidCode);
    }
    Ok(VerificationCode {
        verified: true,
        ..live
    })
}

/// Delete every code expired at `now`.
pub async fn purge_expired(store: &dyn Store, now: DateTime<Utc>) -> CoreResult<u64> {
    let purged = store.purge_expired_codes(now).await?;
    if purged > 0 {
        info!(purged, "expired verification codes deleted");
    }
    Ok(purged)
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;
    use crate::store::MemoryStore;

    #[test]
    fn codes_are_four_digits() {
        for _ in 0..200 {
            let code = generate_code();
            assert_eq!(code.len(), 4);
            assert!(code.chars().all(|c| c.is_ascii_digit()));
        }
    }

    #[test]
    fn hash_is_hex_sha256() {
        let h = hash_code("1234");
        assert_eq!(h.len(), 64);
        assert_ne!(h, hash_code("1235"));
    }

    #[tokio::test]
    async fn code_redeems_once() {
        let store = MemoryStore::new();
        let now = Utc::now();
        let code = issue(&store, "a@b.co", CodePurpose::Signup, None, now)
            .await
            .unwrap();
        let redeemed = redeem(&store, "a@b.co", CodePurpose::Signup, &code, now)
            .await
            .unwrap();
        assert!(redeemed.verified);
        let again = redeem(&store, "a@b.co", CodePurpose::Signup, &code, now).await;
        assert!(matches!(again, Err(CoreError::InvalidCode)));
    }

    #[tokio::test]
    async fn expired_code_does_not_match() {
        let store = MemoryStore::new();
        let t = Utc::now();
        let code = issue(&store, "a@b.co", CodePurpose::Signup, None, t)
            .await
            .unwrap();
        let late = t + Duration::minutes(10) + Duration::seconds(1);
        let res = redeem(&store, "a@b.co", CodePurpose::Signup, &code, late).await;
        assert!(matches!(res, Err(CoreError::InvalidCode)));
    }

    #[tokio::test]
    async fn reissue_invalidates_previous_code() {
        let store = MemoryStore::new();
        let now = Utc::now();
        let mut first = issue(&store, "a@b.co", CodePurpose::PasswordReset, None, now)
            .await
            .unwrap();
        let mut second = issue(&store, "a@b.co", CodePurpose::PasswordReset, None, now)
            .await
            .unwrap();
        while second == first {
            first = second;
            second = issue(&store, "a@b.co", CodePurpose::PasswordReset, None, now)
                .await
                .unwrap();
        }
        let res = redeem(&store, "a@b.co", CodePurpose::PasswordReset, &first, now).await;
        assert!(matches!(res, Err(CoreError::InvalidCode)));
        redeem(&store, "a@b.co", CodePurpose::PasswordReset, &second, now)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn purposes_do_not_collide() {
        let store = MemoryStore::new();
        let now = Utc::now();
        let signup = issue(&store, "a@b.co", CodePurpose::Signup, None, now)
            .await
            .unwrap();
        issue(&store, "a@b.co", CodePurpose::PasswordReset, None, now)
            .await
            .unwrap();
        redeem(&store, "a@b.co", CodePurpose::Signup, &signup, now)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn fifth_wrong_guess_burns_the_code() {
        let store = MemoryStore::new();
        let now = Utc::now();
        let code = issue(&store, "a@b.co", CodePurpose::Signup, None, now)
            .await
            .unwrap();
        let wrong = if code == "0000" { "0001" } else { "0000" };
        for _ in 0..MAX_ATTEMPTS - 1 {
            let res = redeem(&store, "a@b.co", CodePurpose::Signup, wrong, now).await;
            assert!(matches!(res, Err(CoreError::InvalidCode)));
        }
        let res = redeem(&store, "a@b.co", CodePurpose::Signup, wrong, now).await;
        assert!(matches!(res, Err(CoreError::TooManyAttempts)));
        let res = redeem(&store, "a@b.co", CodePurpose::Signup, &code, now).await;
        assert!(matches!(res, Err(CoreError::InvalidCode)));
    }
}
