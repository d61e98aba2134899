//! Request and response bodies.
//!
//! Wire names are camelCase. Every response is wrapped in
//! `{success, data}` or `{success: false, error, code}`.

use chrono::{DateTime, Utc};
use roster_core::accounts::Profile;
use roster_core::models::action::{Action, BillingGroup};
use roster_core::models::identity::Identity;
use roster_core::models::invite::{Invite, PendingInvite};
use roster_core::models::team::{Team, TeamMember};
use roster_core::models::tenant::{Tenant, TenantMember};
use roster_core::permissions::RolePermissions;
use roster_core::store::{InviteAccepted, MemberTenant};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Envelope
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub struct Envelope<T> {
    pub success: bool,
    pub data: T,
}

impl<T> Envelope<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub success: bool,
    pub error: String,
    pub code: String,
}

/// Body for operations with nothing to return.
#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Identities
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserDto {
    pub id: Uuid,
    pub email: String,
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub time_zone: Option<String>,
    pub email_verified: bool,
    pub role: String,
    pub must_rotate_password: bool,
    pub created_at: DateTime<Utc>,
}

impl From<&Identity> for UserDto {
    fn from(i: &Identity) -> Self {
        Self {
            id: i.id,
            email: i.email.clone(),
            username: i.username.clone(),
            first_name: i.first_name.clone(),
            last_name: i.last_name.clone(),
            time_zone: i.time_zone.clone(),
            email_verified: i.email_verified,
            role: i.platform_role.as_str().to_string(),
            must_rotate_password: i.must_rotate_password,
            created_at: i.created_at,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignupRequest {
    pub email: String,
    pub username: Option<String>,
    pub password: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub time_zone: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct ValidateEmailRequest {
    pub email: String,
    pub code: String,
}

#[derive(Debug, Deserialize)]
pub struct EmailRequest {
    pub email: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResetPasswordRequest {
    pub email: String,
    pub code: String,
    pub new_password: String,
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub token: String,
    pub user: UserDto,
}

/// Signup result. `token` is absent while a placeholder activation waits for
/// its code.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SignupResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    pub user: UserDto,
    pub activation_pending: bool,
}

#[derive(Debug, Serialize)]
pub struct MeResponse {
    pub user: UserDto,
    pub companies: Vec<MyCompanyDto>,
}

impl From<&Profile> for MeResponse {
    fn from(p: &Profile) -> Self {
        Self {
            user: UserDto::from(&p.identity),
            companies: p.tenants.iter().map(MyCompanyDto::from).collect(),
        }
    }
}

// ---------------------------------------------------------------------------
// Admin
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateUserRequest {
    pub email: String,
    pub username: Option<String>,
    pub password: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub role: Option<String>,
    pub email_verified: Option<bool>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateUserRequest {
    pub role: Option<String>,
    pub email_verified: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct RoleRequest {
    pub role: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

#[derive(Debug, Serialize)]
pub struct UserListResponse {
    pub users: Vec<UserDto>,
    pub total: u64,
    pub page: u32,
    pub limit: u32,
    pub pages: u64,
}

// ---------------------------------------------------------------------------
// Companies
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberDto {
    pub user_id: Uuid,
    pub email: String,
    pub name: String,
    pub role: String,
    pub active: bool,
    pub joined_at: DateTime<Utc>,
}

impl From<&TenantMember> for MemberDto {
    fn from(m: &TenantMember) -> Self {
        Self {
            user_id: m.user_id,
            email: m.email.clone(),
            name: m.name.clone(),
            role: m.role.as_str().to_string(),
            active: m.active,
            joined_at: m.joined_at,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompanyDto {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub members: Vec<MemberDto>,
}

impl From<&Tenant> for CompanyDto {
    fn from(t: &Tenant) -> Self {
        Self {
            id: t.id,
            name: t.name.clone(),
            description: t.description.clone(),
            created_by: t.created_by,
            created_at: t.created_at,
            members: t.members.iter().map(MemberDto::from).collect(),
        }
    }
}

/// A company seen from one member's ledger entry.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MyCompanyDto {
    #[serde(flatten)]
    pub company: CompanyDto,
    pub role: String,
    pub status: String,
    pub last_login_at: Option<DateTime<Utc>>,
}

impl From<&MemberTenant> for MyCompanyDto {
    fn from(mt: &MemberTenant) -> Self {
        Self {
            company: CompanyDto::from(&mt.tenant),
            role: mt.membership.role.as_str().to_string(),
            status: mt.membership.status.as_str().to_string(),
            last_login_at: mt.membership.last_login_at,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateCompanyRequest {
    pub name: String,
    pub description: Option<String>,
}

// ---------------------------------------------------------------------------
// Teams
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamMemberDto {
    pub user_id: Uuid,
    pub email: String,
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub role: String,
    pub joined_at: DateTime<Utc>,
}

impl From<&TeamMember> for TeamMemberDto {
    fn from(m: &TeamMember) -> Self {
        Self {
            user_id: m.user_id,
            email: m.email.clone(),
            username: m.username.clone(),
            first_name: m.first_name.clone(),
            last_name: m.last_name.clone(),
            role: m.role.as_str().to_string(),
            joined_at: m.joined_at,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamDto {
    pub team_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub created: DateTime<Utc>,
    pub created_by: Uuid,
    pub members: Vec<TeamMemberDto>,
}

impl From<&Team> for TeamDto {
    fn from(t: &Team) -> Self {
        Self {
            team_id: t.id,
            name: t.name.clone(),
            description: t.description.clone(),
            created: t.created_at,
            created_by: t.created_by,
            members: t.members.iter().map(TeamMemberDto::from).collect(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct TeamsResponse {
    pub teams: Vec<TeamDto>,
}

#[derive(Debug, Deserialize)]
pub struct CreateTeamRequest {
    pub name: String,
    pub description: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InviteRequest {
    pub company_id: String,
    pub email: String,
    pub role: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InviteDto {
    pub id: Uuid,
    pub company_id: Uuid,
    pub email: String,
    pub invited_by: Uuid,
    pub invited_at: DateTime<Utc>,
    pub status: String,
    pub role: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub company_name: Option<String>,
}

impl From<&Invite> for InviteDto {
    fn from(i: &Invite) -> Self {
        Self {
            id: i.id,
            company_id: i.tenant_id,
            email: i.email.clone(),
            invited_by: i.invited_by,
            invited_at: i.invited_at,
            status: i.status.as_str().to_string(),
            role: i.role.as_str().to_string(),
            company_name: None,
        }
    }
}

impl From<&PendingInvite> for InviteDto {
    fn from(p: &PendingInvite) -> Self {
        Self {
            company_name: Some(p.tenant_name.clone()),
            ..InviteDto::from(&p.invite)
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AcceptInviteResponse {
    pub company_id: Uuid,
    pub company_name: String,
    pub user_id: Uuid,
    pub role: String,
    pub status: String,
}

impl From<&InviteAccepted> for AcceptInviteResponse {
    fn from(a: &InviteAccepted) -> Self {
        Self {
            company_id: a.membership.tenant_id,
            company_name: a.tenant_name.clone(),
            user_id: a.membership.user_id,
            role: a.membership.role.as_str().to_string(),
            status: a.membership.status.as_str().to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct StatusRequest {
    pub active: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoveMemberRequest {
    pub user_id: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoveMemberResponse {
    pub invites_deleted: u64,
    pub identity_purged: bool,
}

#[derive(Debug, Serialize)]
pub struct PermissionsResponse {
    pub role: String,
    pub permissions: RolePermissions,
}

// ---------------------------------------------------------------------------
// Actions
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordActionRequest {
    #[serde(rename = "type")]
    pub kind: String,
    pub collection: String,
    pub read_type: Option<String>,
    pub uid: Option<String>,
    pub company_id: String,
    pub count: Option<i64>,
    pub host: Option<String>,
    pub doc_id: Option<String>,
    pub created: Option<i64>,
}

/// Query string of `GET /api/actions`, shared by listing and aggregation.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionsQuery {
    pub aggregate: Option<bool>,
    pub from_date: Option<i64>,
    pub to_date: Option<i64>,
    pub group_by: Option<String>,
    pub sum: Option<String>,
    pub company_id: Option<String>,
    pub uid: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub collection: Option<String>,
    pub removed: Option<bool>,
    pub since: Option<i64>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

#[derive(Debug, Serialize)]
pub struct ActionListResponse {
    pub actions: Vec<Action>,
    pub total: u64,
    pub page: u32,
    pub limit: u32,
    pub pages: u64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Period {
    pub from_date: i64,
    pub to_date: i64,
}

/// A single tenant summary, or every group in range.
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum AggregateResult {
    One(BillingGroup),
    Many(Vec<BillingGroup>),
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregateResponse {
    pub group_by: &'static str,
    pub sum: &'static str,
    pub period: Period,
    pub result: AggregateResult,
}

#[derive(Debug, Serialize)]
pub struct DeletedResponse {
    pub deleted: u64,
}
