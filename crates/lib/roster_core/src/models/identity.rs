//! Identity (user account) models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Platform-level role: orthogonal to any tenant-scoped role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum PlatformRole {
    #[default]
    #[serde(rename = "none")]
    None,
    #[serde(rename = "super-admin")]
    SuperAdmin,
}

impl PlatformRole {
    /// Database text representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            PlatformRole::None => "none",
            PlatformRole::SuperAdmin => "super-admin",
        }
    }

    /// Decode a stored or submitted role string, folding the historical
    /// spellings (`Super Admin`, `superadmin`, `SuperAdmin`, `super_admin`)
    /// onto [`PlatformRole::SuperAdmin`]. Anything else, including the old
    /// `Member`/`Creator` display roles, is [`PlatformRole::None`].
    pub fn normalize(raw: &str) -> Self {
        let folded: String = raw
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .map(|c| c.to_ascii_lowercase())
            .collect();
        if folded == "superadmin" {
            PlatformRole::SuperAdmin
        } else {
            PlatformRole::None
        }
    }

    /// Strict parse for user input: only recognised role names are accepted.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "none" | "member" | "creator" | "" => Some(PlatformRole::None),
            _ => match Self::normalize(raw) {
                PlatformRole::SuperAdmin => Some(PlatformRole::SuperAdmin),
                PlatformRole::None => None,
            },
        }
    }

    /// True when `raw` is already the canonical tag.
    pub fn is_canonical(raw: &str) -> bool {
        raw == Self::normalize(raw).as_str()
    }
}

impl std::fmt::Display for PlatformRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A stored user account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Identity {
    pub id: Uuid,
    /// Case-folded, unique.
    pub email: String,
    /// Case-folded, unique when present.
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub time_zone: Option<String>,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub email_verified: bool,
    pub platform_role: PlatformRole,
    /// Set on invite-created placeholders until the owner picks a password.
    pub must_rotate_password: bool,
    pub removed: bool,
    pub created_at: DateTime<Utc>,
    pub created_by: Option<Uuid>,
}

impl Identity {
    pub fn is_super_admin(&self) -> bool {
        self.platform_role == PlatformRole::SuperAdmin
    }

    /// Display name: first/last name, then username, then email.
    pub fn display_name(&self) -> String {
        let full = [self.first_name.as_deref(), self.last_name.as_deref()]
            .into_iter()
            .flatten()
            .filter(|s| !s.trim().is_empty())
            .collect::<Vec<_>>()
            .join(" ");
        if !full.is_empty() {
            return full;
        }
        self.username.clone().unwrap_or_else(|| self.email.clone())
    }
}

/// Input for creating an identity. Email and username are folded by the
/// caller through [`fold_email`] / [`fold_username`].
#[derive(Debug, Clone)]
pub struct NewIdentity {
    pub email: String,
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub time_zone: Option<String>,
    pub password_hash: String,
    pub email_verified: bool,
    pub platform_role: PlatformRole,
    pub must_rotate_password: bool,
    pub created_by: Option<Uuid>,
}

/// Partial update applied by platform administrators.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdentityPatch {
    pub platform_role: Option<PlatformRole>,
    pub email_verified: Option<bool>,
}

impl IdentityPatch {
    pub fn is_empty(&self) -> bool {
        self.platform_role.is_none() && self.email_verified.is_none()
    }
}

/// Canonical email form used for storage and comparison.
pub fn fold_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Canonical username form.
pub fn fold_username(username: &str) -> String {
    username.trim().to_lowercase()
}

/// Minimal syntactic email check: one `@`, non-empty local part, a dot in
/// the domain that is neither first nor last, no whitespace.
pub fn is_valid_email(email: &str) -> bool {
    let email = email.trim();
    if email.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn legacy_super_admin_spellings_normalize() {
        for raw in ["Super Admin", "superadmin", "SuperAdmin", "super_admin", "super-admin"] {
            assert_eq!(PlatformRole::normalize(raw), PlatformRole::SuperAdmin, "{raw}");
        }
        for raw in ["Member", "Creator", "", "admin", "none"] {
            assert_eq!(PlatformRole::normalize(raw), PlatformRole::None, "{raw}");
        }
    }

    #[test]
    fn strict_parse_rejects_unknown_roles() {
        assert_eq!(PlatformRole::parse("Super Admin"), Some(PlatformRole::SuperAdmin));
        assert_eq!(PlatformRole::parse("Member"), Some(PlatformRole::None));
        assert_eq!(PlatformRole::parse("owner"), None);
    }

    #[test]
    fn canonical_detection() {
        assert!(PlatformRole::is_canonical("super-admin"));
        assert!(PlatformRole::is_canonical("none"));
        assert!(!PlatformRole::is_canonical("Super Admin"));
        assert!(!PlatformRole::is_canonical("Member"));
    }

    #[test]
    fn email_syntax() {
        assert!(is_valid_email("x@y.com"));
        assert!(is_valid_email("  First.Last@Example.org "));
        assert!(!is_valid_email("x@y"));
        assert!(!is_valid_email("@y.com"));
        assert!(!is_valid_email("x y@z.com"));
        assert!(!is_valid_email("x@@y.com"));
    }

    #[test]
    fn email_is_case_folded() {
        assert_eq!(fold_email("  X@Y.Com "), "x@y.com");
    }
}
