//! Tenant (company) models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Tenant-scoped role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TenantRole {
    Member,
    Creator,
    Admin,
}

impl TenantRole {
    pub const ALL: [TenantRole; 3] = [TenantRole::Member, TenantRole::Creator, TenantRole::Admin];

    /// Database text representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            TenantRole::Member => "member",
            TenantRole::Creator => "creator",
            TenantRole::Admin => "admin",
        }
    }

    /// Case-insensitive parse; accepts the capitalised legacy spellings.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "member" => Some(TenantRole::Member),
            "creator" => Some(TenantRole::Creator),
            "admin" => Some(TenantRole::Admin),
            _ => None,
        }
    }

    /// Roles an invite may propose. `admin` is never assignable by invite.
    pub fn is_invitable(&self) -> bool {
        !matches!(self, TenantRole::Admin)
    }
}

impl std::fmt::Display for TenantRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A member as shown on the tenant. Derived from the membership ledger at
/// read time, so it can never drift from it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TenantMember {
    pub user_id: Uuid,
    pub email: String,
    pub name: String,
    pub role: TenantRole,
    pub active: bool,
    pub joined_at: DateTime<Utc>,
}

/// A tenant with its member view.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tenant {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub removed: bool,
    pub members: Vec<TenantMember>,
}

impl Tenant {
    pub fn member(&self, user_id: Uuid) -> Option<&TenantMember> {
        self.members.iter().find(|m| m.user_id == user_id)
    }
}

/// Input for creating a tenant.
#[derive(Debug, Clone)]
pub struct NewTenant {
    pub name: String,
    pub description: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_accepts_legacy_capitalisation() {
        assert_eq!(TenantRole::parse("Admin"), Some(TenantRole::Admin));
        assert_eq!(TenantRole::parse(" creator "), Some(TenantRole::Creator));
        assert_eq!(TenantRole::parse("owner"), None);
    }

    #[test]
    fn admin_is_not_invitable() {
        assert!(TenantRole::Member.is_invitable());
        assert!(TenantRole::Creator.is_invitable());
        assert!(!TenantRole::Admin.is_invitable());
    }
}
