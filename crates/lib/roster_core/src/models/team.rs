//! Team models. Teams are lightweight groups of identities, separate from
//! tenants and the membership ledger.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::tenant::TenantRole;

/// A member as shown on a team, joined with the identity at read time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeamMember {
    pub user_id: Uuid,
    pub email: String,
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub role: TenantRole,
    pub joined_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Team {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub removed: bool,
    pub members: Vec<TeamMember>,
}

impl Team {
    pub fn member(&self, user_id: Uuid) -> Option<&TeamMember> {
        self.members.iter().find(|m| m.user_id == user_id)
    }
}

#[derive(Debug, Clone)]
pub struct NewTeam {
    pub name: String,
    pub description: Option<String>,
}
