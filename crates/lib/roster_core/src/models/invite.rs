//! Invite queue models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::tenant::TenantRole;

/// Invite lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InviteStatus {
    Pending,
    Accepted,
    Declined,
}

impl InviteStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InviteStatus::Pending => "pending",
            InviteStatus::Accepted => "accepted",
            InviteStatus::Declined => "declined",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "pending" => Some(InviteStatus::Pending),
            "accepted" => Some(InviteStatus::Accepted),
            "declined" => Some(InviteStatus::Declined),
            _ => None,
        }
    }
}

impl std::fmt::Display for InviteStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A pending (or declined) offer of tenant membership.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Invite {
    pub id: Uuid,
    pub tenant_id: Uuid,
    /// Case-folded invitee email.
    pub email: String,
    pub invited_by: Uuid,
    pub invited_at: DateTime<Utc>,
    pub status: InviteStatus,
    pub accepted_at: Option<DateTime<Utc>>,
    pub role: TenantRole,
}

/// Input for a new invite.
#[derive(Debug, Clone)]
pub struct NewInvite {
    pub tenant_id: Uuid,
    pub email: String,
    pub invited_by: Uuid,
    pub role: TenantRole,
}

/// A pending invite joined with its tenant's name, for the invitee's inbox.
#[derive(Debug, Clone, Serialize)]
pub struct PendingInvite {
    pub invite: Invite,
    pub tenant_name: String,
}
