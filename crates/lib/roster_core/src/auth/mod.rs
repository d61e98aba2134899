//! Credential hashing and token issuance.
//!
//! Thin collaborators around `bcrypt` and `jsonwebtoken`, plus the random
//! secret helpers used for placeholder passwords.

pub mod jwt;
pub mod password;

use rand::distr::Alphanumeric;
use rand::{Rng, rng};

/// Random alphanumeric string of `len` characters from the thread CSPRNG.
pub fn random_secret(len: usize) -> String {
    rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn random_secret_has_requested_length() {
        let a = random_secret(32);
        let b = random_secret(32);
        assert_eq!(a.len(), 32);
        assert!(a.chars().all(|c| c.is_ascii_alphanumeric()));
        assert_ne!(a, b);
    }
}
