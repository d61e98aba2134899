//! # roster_core
//!
//! Core domain logic for Roster: identities, tenants, the membership ledger,
//! invites, teams, verification codes and the usage ledger.

pub mod accounts;
pub mod auth;
pub mod codes;
pub mod error;
pub mod ids;
pub mod mailer;
pub mod models;
pub mod permissions;
pub mod platform;
pub mod store;
pub mod teams;
pub mod tenancy;
pub mod usage;

pub use error::{CoreError, CoreResult, ErrorKind};

/// Returns the crate version.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_is_not_empty() {
        assert!(!version().is_empty());
    }
}
