//! Password hashing via bcrypt.

use crate::error::{CoreError, CoreResult};

/// bcrypt cost factor.
const BCRYPT_COST: u32 = 10;

/// Minimum accepted password length.
pub const MIN_PASSWORD_LEN: usize = 8;

/// Hash a password with bcrypt (cost 10).
pub fn hash_password(password: &str) -> CoreResult<String> {
    bcrypt::hash(password, BCRYPT_COST)
        .map_err(|e| CoreError::Internal(format!("bcrypt hash: {e}")))
}

/// Verify a password against a bcrypt hash.
pub fn verify_password(password: &str, hash: &str) -> CoreResult<bool> {
    bcrypt::verify(password, hash).map_err(|e| CoreError::Internal(format!("bcrypt verify: {e}")))
}

/// Reject passwords shorter than [`MIN_PASSWORD_LEN`].
pub fn validate_password(password: &str) -> CoreResult<()> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(CoreError::Validation(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    Ok(())
}
