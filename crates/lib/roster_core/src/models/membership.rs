//! Membership ledger ("creds") models: one entry per (user, tenant).

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::tenant::{TenantMember, TenantRole};

/// Lifecycle state of a (user, tenant) relationship.
///
/// `Removed` is terminal; the stores purge the entry instead of keeping it,
/// so the variant only appears when decoding legacy rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MembershipStatus {
    Invited,
    Accepted,
    Inactive,
    Removed,
}

impl MembershipStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MembershipStatus::Invited => "invited",
            MembershipStatus::Accepted => "accepted",
            MembershipStatus::Inactive => "inactive",
            MembershipStatus::Removed => "removed",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "invited" => Some(MembershipStatus::Invited),
            "accepted" => Some(MembershipStatus::Accepted),
            "inactive" => Some(MembershipStatus::Inactive),
            "removed" => Some(MembershipStatus::Removed),
            _ => None,
        }
    }

    /// Whether the entry shows up in the tenant's member view.
    pub fn is_member(&self) -> bool {
        matches!(self, MembershipStatus::Accepted | MembershipStatus::Inactive)
    }
}

/// Authoritative role/status record for one user in one tenant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Membership {
    pub user_id: Uuid,
    pub tenant_id: Uuid,
    pub status: MembershipStatus,
    pub role: TenantRole,
    pub invited_by: Option<Uuid>,
    pub started_at: DateTime<Utc>,
    pub last_login_at: Option<DateTime<Utc>>,
    pub email: String,
    pub name: String,
    pub active: bool,
    /// Per-feature switches, open-ended.
    pub enabled: BTreeMap<String, bool>,
}

impl Membership {
    /// Role to authorize with, if this entry currently grants any.
    pub fn effective_role(&self) -> Option<TenantRole> {
        (self.status == MembershipStatus::Accepted && self.active).then_some(self.role)
    }

    pub fn as_member(&self) -> TenantMember {
        TenantMember {
            user_id: self.user_id,
            email: self.email.clone(),
            name: self.name.clone(),
            role: self.role,
            active: self.active,
            joined_at: self.started_at,
        }
    }
}

/// Input for a new ledger entry.
#[derive(Debug, Clone)]
pub struct NewMembership {
    pub user_id: Uuid,
    pub tenant_id: Uuid,
    pub role: TenantRole,
    pub invited_by: Option<Uuid>,
    pub email: String,
    pub name: String,
}

/// Result of removing a member.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MemberRemoval {
    /// Pending invites for the same (email, tenant) that were deleted.
    pub invites_deleted: u64,
    /// The identity was an unverified placeholder with no other tenant and
    /// was purged.
    pub identity_purged: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(status: MembershipStatus, active: bool) -> Membership {
        Membership {
            user_id: Uuid::nil(),
            tenant_id: Uuid::nil(),
            status,
            role: TenantRole::Creator,
            invited_by: None,
            started_at: Utc::now(),
            last_login_at: None,
            email: "a@b.co".into(),
            name: "A".into(),
            active,
            enabled: BTreeMap::new(),
        }
    }

    #[test]
    fn only_active_accepted_entries_authorize() {
        assert_eq!(
            entry(MembershipStatus::Accepted, true).effective_role(),
            Some(TenantRole::Creator)
        );
        assert_eq!(entry(MembershipStatus::Inactive, false).effective_role(), None);
        assert_eq!(entry(MembershipStatus::Invited, true).effective_role(), None);
    }

    #[test]
    fn member_view_includes_inactive() {
        assert!(MembershipStatus::Accepted.is_member());
        assert!(MembershipStatus::Inactive.is_member());
        assert!(!MembershipStatus::Invited.is_member());
    }
}
