//! Role/permission engine.
//!
//! Pure capability checks over a tenant-scoped role:
//!
//! - `admin`: everything
//! - `creator`: creation tools, content tools, team chat
//! - `member`: content tools, team chat
//!
//! Platform super-admin is a separate axis and is checked through
//! [`Identity::is_super_admin`](crate::models::identity::Identity::is_super_admin).

use serde::Serialize;

use crate::error::{CoreError, CoreResult};
use crate::models::tenant::TenantRole;

pub fn can_invite(role: TenantRole) -> bool {
    role == TenantRole::Admin
}

pub fn can_view_audit_log(role: TenantRole) -> bool {
    role == TenantRole::Admin
}

/// Team admin tools (scaling, security, AI accounts, policy manager).
pub fn can_access_admin_tools(role: TenantRole) -> bool {
    role == TenantRole::Admin
}

/// App builder, UI and reports.
pub fn can_access_creation_tools(role: TenantRole) -> bool {
    matches!(role, TenantRole::Admin | TenantRole::Creator)
}

pub fn can_access_content_tools(_role: TenantRole) -> bool {
    true
}

pub fn can_access_team_chat(_role: TenantRole) -> bool {
    true
}

/// Role management (role changes, removal, activation) follows the invite
/// capability.
pub fn can_manage_members(role: TenantRole) -> bool {
    can_invite(role)
}

/// Capability set of a role, as returned to the frontend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RolePermissions {
    pub can_invite: bool,
    pub can_view_event_logs: bool,
    pub can_access_admin_tools: bool,
    pub can_access_creation_tools: bool,
    pub can_access_content_tools: bool,
    pub can_access_team_chat: bool,
}

impl RolePermissions {
    pub fn for_role(role: TenantRole) -> Self {
        Self {
            can_invite: can_invite(role),
            can_view_event_logs: can_view_audit_log(role),
            can_access_admin_tools: can_access_admin_tools(role),
            can_access_creation_tools: can_access_creation_tools(role),
            can_access_content_tools: can_access_content_tools(role),
            can_access_team_chat: can_access_team_chat(role),
        }
    }
}

/// Fail with `Forbidden` unless `check(role)` holds. `role` is `None` when
/// the caller has no effective membership in the tenant.
pub fn require(
    role: Option<TenantRole>,
    check: fn(TenantRole) -> bool,
    action: &str,
) -> CoreResult<TenantRole> {
    match role {
        Some(r) if check(r) => Ok(r),
        _ => Err(CoreError::Forbidden(format!("not allowed to {action}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_role_gets_content_and_chat() {
        for role in TenantRole::ALL {
            assert!(can_access_content_tools(role));
            assert!(can_access_team_chat(role));
        }
    }

    #[test]
    fn creation_tools_for_creator_and_admin() {
        for role in TenantRole::ALL {
            assert_eq!(
                can_access_creation_tools(role),
                role == TenantRole::Creator || role == TenantRole::Admin
            );
        }
    }

    #[test]
    fn admin_only_capabilities() {
        for role in TenantRole::ALL {
            let is_admin = role == TenantRole::Admin;
            assert_eq!(can_invite(role), is_admin);
            assert_eq!(can_view_audit_log(role), is_admin);
            assert_eq!(can_access_admin_tools(role), is_admin);
        }
    }

    #[test]
    fn summary_matches_individual_checks() {
        let p = RolePermissions::for_role(TenantRole::Creator);
        assert!(!p.can_invite);
        assert!(p.can_access_creation_tools);
        assert!(p.can_access_team_chat);
    }

    #[test]
    fn require_rejects_missing_membership() {
        assert!(require(None, can_invite, "invite").is_err());
        assert!(require(Some(TenantRole::Member), can_invite, "invite").is_err());
        assert_eq!(
            require(Some(TenantRole::Admin), can_invite, "invite").unwrap(),
            TenantRole::Admin
        );
    }
}
