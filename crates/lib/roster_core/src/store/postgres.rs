//! Postgres-backed store.
//!
//! Multi-row operations run in one transaction. The super-admin invariant
//! locks the full super-admin set (`FOR UPDATE`, ordered by id) before the
//! target row, so concurrent demotions serialize instead of racing to zero.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::{PgConnection, PgPool, Postgres, QueryBuilder};
use tracing::{info, warn};
use uuid::Uuid;

use super::{
    ActionStore, CodeStore, IdentityStore, InviteAccepted, InviteCreated, InviteStore,
    MemberTenant, Store, TeamStore, TenantStore,
};
use crate::error::{CoreError, CoreResult};
use crate::models::action::{
    Action, ActionFilter, ActionPatch, AggregateQuery, BillingGroup, DistinctField, NewAction,
};
use crate::models::identity::{Identity, IdentityPatch, NewIdentity, PlatformRole};
use crate::models::invite::{Invite, InviteStatus, NewInvite, PendingInvite};
use crate::models::membership::{MemberRemoval, Membership, MembershipStatus};
use crate::models::team::{NewTeam, Team, TeamMember};
use crate::models::tenant::{NewTenant, Tenant, TenantMember, TenantRole};
use crate::models::verification::{CodePurpose, VerificationCode};
use crate::models::{Page, Pagination};
use crate::ids::new_id;

// ---------------------------------------------------------------------------
// Rows
// ---------------------------------------------------------------------------

const IDENTITY_COLUMNS: &str = "id, email, username, first_name, last_name, time_zone, \
     password_hash, email_verified, platform_role, must_rotate_password, removed, \
     created_at, created_by";

const MEMBERSHIP_COLUMNS: &str = "user_id, tenant_id, status, role, invited_by, started_at, \
     last_login_at, email, name, active, enabled";

const TENANT_COLUMNS: &str = "id, name, description, created_by, created_at, removed";

const TEAM_COLUMNS: &str = "id, name, description, created_by, created_at, removed";

const INVITE_COLUMNS: &str =
    "id, tenant_id, email, invited_by, invited_at, status, accepted_at, role";

const CODE_COLUMNS: &str = "id, email, code_hash, purpose, password_hash, created_at, \
     expires_at, verified, attempts";

const ACTION_COLUMNS: &str = "id, type AS kind, collection, read_type, uid, company_id, \
     count, host, doc_id, created, removed";

/// Statuses that make a ledger entry part of the tenant's member view.
const MEMBER_STATUSES: &str = "('accepted', 'inactive')";

#[derive(Debug, sqlx::FromRow)]
struct IdentityRow {
    id: Uuid,
    email: String,
    username: Option<String>,
    first_name: Option<String>,
    last_name: Option<String>,
    time_zone: Option<String>,
    password_hash: String,
    email_verified: bool,
    platform_role: String,
    must_rotate_password: bool,
    removed: bool,
    created_at: DateTime<Utc>,
    created_by: Option<Uuid>,
}

impl From<IdentityRow> for Identity {
    fn from(row: IdentityRow) -> Self {
        Identity {
            id: row.id,
            email: row.email,
            username: row.username,
            first_name: row.first_name,
            last_name: row.last_name,
            time_zone: row.time_zone,
            password_hash: row.password_hash,
            email_verified: row.email_verified,
            // Legacy spellings decode to the canonical tag.
            platform_role: PlatformRole::normalize(&row.platform_role),
            must_rotate_password: row.must_rotate_password,
            removed: row.removed,
            created_at: row.created_at,
            created_by: row.created_by,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct TenantRow {
    id: Uuid,
    name: String,
    description: Option<String>,
    created_by: Uuid,
    created_at: DateTime<Utc>,
    removed: bool,
}

impl TenantRow {
    fn with_members(self, members: Vec<TenantMember>) -> Tenant {
        Tenant {
            id: self.id,
            name: self.name,
            description: self.description,
            created_by: self.created_by,
            created_at: self.created_at,
            removed: self.removed,
            members,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct MembershipRow {
    user_id: Uuid,
    tenant_id: Uuid,
    status: String,
    role: String,
    invited_by: Option<Uuid>,
    started_at: DateTime<Utc>,
    last_login_at: Option<DateTime<Utc>>,
    email: String,
    name: String,
    active: bool,
    enabled: Json<BTreeMap<String, bool>>,
}

impl TryFrom<MembershipRow> for Membership {
    type Error = CoreError;

    fn try_from(row: MembershipRow) -> Result<Self, Self::Error> {
        Ok(Membership {
            user_id: row.user_id,
            tenant_id: row.tenant_id,
            status: MembershipStatus::parse(&row.status).ok_or_else(|| {
                CoreError::Internal(format!("unknown membership status '{}'", row.status))
            })?,
            role: parse_tenant_role(&row.role)?,
            invited_by: row.invited_by,
            started_at: row.started_at,
            last_login_at: row.last_login_at,
            email: row.email,
            name: row.name,
            active: row.active,
            enabled: row.enabled.0,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct TeamRow {
    id: Uuid,
    name: String,
    description: Option<String>,
    created_by: Uuid,
    created_at: DateTime<Utc>,
    removed: bool,
}

impl TeamRow {
    fn with_members(self, members: Vec<TeamMember>) -> Team {
        Team {
            id: self.id,
            name: self.name,
            description: self.description,
            created_by: self.created_by,
            created_at: self.created_at,
            removed: self.removed,
            members,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct TeamMemberRow {
    user_id: Uuid,
    email: String,
    username: Option<String>,
    first_name: Option<String>,
    last_name: Option<String>,
    role: String,
    joined_at: DateTime<Utc>,
}

impl TryFrom<TeamMemberRow> for TeamMember {
    type Error = CoreError;

    fn try_from(row: TeamMemberRow) -> Result<Self, Self::Error> {
        Ok(TeamMember {
            user_id: row.user_id,
            email: row.email,
            username: row.username,
            first_name: row.first_name,
            last_name: row.last_name,
            role: parse_tenant_role(&row.role)?,
            joined_at: row.joined_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct InviteRow {
    id: Uuid,
    tenant_id: Uuid,
    email: String,
    invited_by: Uuid,
    invited_at: DateTime<Utc>,
    status: String,
    accepted_at: Option<DateTime<Utc>>,
    role: String,
}

impl TryFrom<InviteRow> for Invite {
    type Error = CoreError;

    fn try_from(row: InviteRow) -> Result<Self, Self::Error> {
        Ok(Invite {
            id: row.id,
            tenant_id: row.tenant_id,
            email: row.email,
            invited_by: row.invited_by,
            invited_at: row.invited_at,
            status: InviteStatus::parse(&row.status).ok_or_else(|| {
                CoreError::Internal(format!("unknown invite status '{}'", row.status))
            })?,
            accepted_at: row.accepted_at,
            role: parse_tenant_role(&row.role)?,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct CodeRow {
    id: Uuid,
    email: String,
    code_hash: String,
    purpose: String,
    password_hash: Option<String>,
    created_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
    verified: bool,
    attempts: i32,
}

impl TryFrom<CodeRow> for VerificationCode {
    type Error = CoreError;

    fn try_from(row: CodeRow) -> Result<Self, Self::Error> {
        Ok(VerificationCode {
            id: row.id,
            email: row.email,
            code_hash: row.code_hash,
            purpose: CodePurpose::parse(&row.purpose).ok_or_else(|| {
                CoreError::Internal(format!("unknown code purpose '{}'", row.purpose))
            })?,
            password_hash: row.password_hash,
            created_at: row.created_at,
            expires_at: row.expires_at,
            verified: row.verified,
            attempts: row.attempts,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct ActionRow {
    id: Uuid,
    kind: String,
    collection: String,
    read_type: String,
    uid: String,
    company_id: String,
    count: i64,
    host: String,
    doc_id: String,
    created: i64,
    removed: bool,
}

impl From<ActionRow> for Action {
    fn from(row: ActionRow) -> Self {
        Action {
            id: row.id,
            kind: row.kind,
            collection: row.collection,
            read_type: row.read_type,
            user_id: row.uid,
            tenant_id: row.company_id,
            count: row.count,
            host: row.host,
            doc_id: row.doc_id,
            created: row.created,
            removed: row.removed,
        }
    }
}

fn parse_tenant_role(raw: &str) -> CoreResult<TenantRole> {
    TenantRole::parse(raw).ok_or_else(|| CoreError::Internal(format!("unknown tenant role '{raw}'")))
}

fn memberships(rows: Vec<MembershipRow>) -> CoreResult<Vec<Membership>> {
    rows.into_iter().map(Membership::try_from).collect()
}

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

/// [`Store`] over a Postgres pool.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Apply the embedded migrations in `roster_core/migrations/`.
    pub async fn migrate(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await
    }

    async fn members_of(&self, tenant_id: Uuid) -> CoreResult<Vec<TenantMember>> {
        let rows = sqlx::query_as::<_, MembershipRow>(&format!(
            "SELECT {MEMBERSHIP_COLUMNS} FROM memberships \
             WHERE tenant_id = $1 AND status IN {MEMBER_STATUSES} \
             ORDER BY started_at, user_id"
        ))
        .bind(tenant_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(memberships(rows)?.iter().map(Membership::as_member).collect())
    }
}

/// Team members joined with their identities, oldest membership first.
async fn team_members_of(conn: &mut PgConnection, team_id: Uuid) -> CoreResult<Vec<TeamMember>> {
    let rows = sqlx::query_as::<_, TeamMemberRow>(
        "SELECT tm.user_id, i.email, i.username, i.first_name, i.last_name, tm.role, tm.joined_at \
         FROM team_members tm JOIN identities i ON i.id = tm.user_id \
         WHERE tm.team_id = $1 \
         ORDER BY tm.joined_at, tm.user_id",
    )
    .bind(team_id)
    .fetch_all(conn)
    .await?;
    rows.into_iter().map(TeamMember::try_from).collect()
}

/// Lock every live super-admin row in id order and return their ids.
async fn lock_super_admins(conn: &mut PgConnection) -> Result<Vec<Uuid>, sqlx::Error> {
    sqlx::query_scalar::<_, Uuid>(
        "SELECT id FROM identities \
         WHERE platform_role = 'super-admin' AND NOT removed \
         ORDER BY id FOR UPDATE",
    )
    .fetch_all(conn)
    .await
}

async fn insert_identity(conn: &mut PgConnection, new: NewIdentity) -> CoreResult<Identity> {
    let row = sqlx::query_as::<_, IdentityRow>(&format!(
        "INSERT INTO identities \
         (id, email, username, first_name, last_name, time_zone, password_hash, \
          email_verified, platform_role, must_rotate_password, created_by) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11) \
         RETURNING {IDENTITY_COLUMNS}"
    ))
    .bind(new_id())
    .bind(&new.email)
    .bind(&new.username)
    .bind(&new.first_name)
    .bind(&new.last_name)
    .bind(&new.time_zone)
    .bind(&new.password_hash)
    .bind(new.email_verified)
    .bind(new.platform_role.as_str())
    .bind(new.must_rotate_password)
    .bind(new.created_by)
    .fetch_one(conn)
    .await
    .map_err(CoreError::from_unique_violation)?;
    Ok(row.into())
}

#[async_trait]
impl IdentityStore for PgStore {
    async fn create_identity(&self, new: NewIdentity) -> CoreResult<Identity> {
        let mut conn = self.pool.acquire().await?;
        insert_identity(&mut conn, new).await
    }

    async fn identity_by_id(&self, id: Uuid) -> CoreResult<Option<Identity>> {
        let row = sqlx::query_as::<_, IdentityRow>(&format!(
            "SELECT {IDENTITY_COLUMNS} FROM identities WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Identity::from))
    }

    async fn identity_by_email(&self, email: &str) -> CoreResult<Option<Identity>> {
        let row = sqlx::query_as::<_, IdentityRow>(&format!(
            "SELECT {IDENTITY_COLUMNS} FROM identities WHERE email = $1"
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Identity::from))
    }

    async fn identity_by_username(&self, username: &str) -> CoreResult<Option<Identity>> {
        let row = sqlx::query_as::<_, IdentityRow>(&format!(
            "SELECT {IDENTITY_COLUMNS} FROM identities WHERE username = $1"
        ))
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Identity::from))
    }

    async fn list_identities(&self, page: Pagination) -> CoreResult<Page<Identity>> {
        let total = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM identities")
            .fetch_one(&self.pool)
            .await?;
        let rows = sqlx::query_as::<_, IdentityRow>(&format!(
            "SELECT {IDENTITY_COLUMNS} FROM identities \
             ORDER BY created_at DESC, id DESC LIMIT $1 OFFSET $2"
        ))
        .bind(i64::from(page.limit))
        .bind(page.offset() as i64)
        .fetch_all(&self.pool)
        .await?;
        Ok(Page::new(
            rows.into_iter().map(Identity::from).collect(),
            total as u64,
            page,
        ))
    }

    async fn update_identity(&self, id: Uuid, patch: IdentityPatch) -> CoreResult<Identity> {
        let mut tx = self.pool.begin().await?;
        if patch.platform_role == Some(PlatformRole::None) {
            let super_admins = lock_super_admins(&mut tx).await?;
            if super_admins == [id] {
                warn!(user_id = %id, "refusing to demote the last super-admin");
                return Err(CoreError::LastSuperAdmin);
            }
        }
        let row = sqlx::query_as::<_, IdentityRow>(&format!(
            "UPDATE identities SET \
               platform_role = COALESCE($2, platform_role), \
               email_verified = COALESCE($3, email_verified) \
             WHERE id = $1 RETURNING {IDENTITY_COLUMNS}"
        ))
        .bind(id)
        .bind(patch.platform_role.map(|r| r.as_str()))
        .bind(patch.email_verified)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(CoreError::UserNotFound)?;
        tx.commit().await?;
        Ok(row.into())
    }

    async fn delete_identity(&self, id: Uuid) -> CoreResult<()> {
        let mut tx = self.pool.begin().await?;
        let super_admins = lock_super_admins(&mut tx).await?;
        if super_admins == [id] {
            warn!(user_id = %id, "refusing to delete the last super-admin");
            return Err(CoreError::LastSuperAdmin);
        }
        // Ledger entries go with the identity (ON DELETE CASCADE).
        let deleted = sqlx::query("DELETE FROM identities WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        if deleted == 0 {
            return Err(CoreError::UserNotFound);
        }
        tx.commit().await?;
        Ok(())
    }

    async fn mark_verified(&self, id: Uuid, password_hash: Option<String>) -> CoreResult<()> {
        let updated = sqlx::query(
            "UPDATE identities SET \
               email_verified = TRUE, \
               password_hash = COALESCE($2, password_hash), \
               must_rotate_password = CASE WHEN $2 IS NULL THEN must_rotate_password ELSE FALSE END \
             WHERE id = $1",
        )
        .bind(id)
        .bind(password_hash)
        .execute(&self.pool)
        .await?
        .rows_affected();
        if updated == 0 {
            return Err(CoreError::UserNotFound);
        }
        Ok(())
    }

    async fn count_super_admins(&self) -> CoreResult<u64> {
        let n = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM identities WHERE platform_role = 'super-admin' AND NOT removed",
        )
        .fetch_one(&self.pool)
        .await?;
        Ok(n as u64)
    }

    async fn normalize_platform_roles(&self) -> CoreResult<u64> {
        let mut tx = self.pool.begin().await?;
        let legacy = sqlx::query_as::<_, (Uuid, String)>(
            "SELECT id, platform_role FROM identities \
             WHERE platform_role NOT IN ('none', 'super-admin') FOR UPDATE",
        )
        .fetch_all(&mut *tx)
        .await?;
        for (id, raw) in &legacy {
            let canonical = PlatformRole::normalize(raw);
            sqlx::query("UPDATE identities SET platform_role = $2 WHERE id = $1")
                .bind(id)
                .bind(canonical.as_str())
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;
        if !legacy.is_empty() {
            info!(rows = legacy.len(), "normalized legacy platform roles");
        }
        Ok(legacy.len() as u64)
    }
}

#[async_trait]
impl TenantStore for PgStore {
    async fn create_tenant(
        &self,
        new: NewTenant,
        creator: &Identity,
        at: DateTime<Utc>,
    ) -> CoreResult<Tenant> {
        let mut tx = self.pool.begin().await?;
        let tenant = sqlx::query_as::<_, TenantRow>(&format!(
            "INSERT INTO tenants (id, name, description, created_by, created_at) \
             VALUES ($1, $2, $3, $4, $5) RETURNING {TENANT_COLUMNS}"
        ))
        .bind(new_id())
        .bind(&new.name)
        .bind(&new.description)
        .bind(creator.id)
        .bind(at)
        .fetch_one(&mut *tx)
        .await?;
        let entry = sqlx::query_as::<_, MembershipRow>(&format!(
            "INSERT INTO memberships \
             (user_id, tenant_id, status, role, started_at, email, name, active) \
             VALUES ($1, $2, 'accepted', 'admin', $3, $4, $5, TRUE) \
             RETURNING {MEMBERSHIP_COLUMNS}"
        ))
        .bind(creator.id)
        .bind(tenant.id)
        .bind(at)
        .bind(&creator.email)
        .bind(creator.display_name())
        .fetch_one(&mut *tx)
        .await
        .map_err(CoreError::from_unique_violation)?;
        tx.commit().await?;
        let entry = Membership::try_from(entry)?;
        Ok(tenant.with_members(vec![entry.as_member()]))
    }

    async fn tenant_by_id(&self, id: Uuid) -> CoreResult<Option<Tenant>> {
        let row = sqlx::query_as::<_, TenantRow>(&format!(
            "SELECT {TENANT_COLUMNS} FROM tenants WHERE id = $1 AND NOT removed"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        match row {
            Some(row) => {
                let members = self.members_of(row.id).await?;
                Ok(Some(row.with_members(members)))
            }
            None => Ok(None),
        }
    }

    async fn tenants_for_user(&self, user_id: Uuid) -> CoreResult<Vec<MemberTenant>> {
        let rows = sqlx::query_as::<_, MembershipRow>(&format!(
            "SELECT m.user_id, m.tenant_id, m.status, m.role, m.invited_by, m.started_at, \
                    m.last_login_at, m.email, m.name, m.active, m.enabled \
             FROM memberships m JOIN tenants t ON t.id = m.tenant_id \
             WHERE m.user_id = $1 AND m.status IN {MEMBER_STATUSES} AND NOT t.removed \
             ORDER BY t.created_at"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        let mut out = Vec::with_capacity(rows.len());
        for membership in memberships(rows)? {
            if let Some(tenant) = self.tenant_by_id(membership.tenant_id).await? {
                out.push(MemberTenant { tenant, membership });
            }
        }
        Ok(out)
    }

    async fn membership(&self, user_id: Uuid, tenant_id: Uuid) -> CoreResult<Option<Membership>> {
        let row = sqlx::query_as::<_, MembershipRow>(&format!(
            "SELECT {MEMBERSHIP_COLUMNS} FROM memberships WHERE user_id = $1 AND tenant_id = $2"
        ))
        .bind(user_id)
        .bind(tenant_id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(Membership::try_from).transpose()
    }

    async fn memberships_for_user(&self, user_id: Uuid) -> CoreResult<Vec<Membership>> {
        let rows = sqlx::query_as::<_, MembershipRow>(&format!(
            "SELECT {MEMBERSHIP_COLUMNS} FROM memberships WHERE user_id = $1 ORDER BY started_at"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        memberships(rows)
    }

    async fn update_member_role(
        &self,
        tenant_id: Uuid,
        user_id: Uuid,
        role: TenantRole,
    ) -> CoreResult<Membership> {
        let row = sqlx::query_as::<_, MembershipRow>(&format!(
            "UPDATE memberships SET role = $3 \
             WHERE tenant_id = $1 AND user_id = $2 AND status IN {MEMBER_STATUSES} \
             RETURNING {MEMBERSHIP_COLUMNS}"
        ))
        .bind(tenant_id)
        .bind(user_id)
        .bind(role.as_str())
        .fetch_optional(&self.pool)
        .await?
        .ok_or(CoreError::MemberNotFound)?;
        row.try_into()
    }

    async fn set_member_active(
        &self,
        tenant_id: Uuid,
        user_id: Uuid,
        active: bool,
    ) -> CoreResult<Membership> {
        let status = if active {
            MembershipStatus::Accepted
        } else {
            MembershipStatus::Inactive
        };
        let row = sqlx::query_as::<_, MembershipRow>(&format!(
            "UPDATE memberships SET active = $3, status = $4 \
             WHERE tenant_id = $1 AND user_id = $2 AND status IN {MEMBER_STATUSES} \
             RETURNING {MEMBERSHIP_COLUMNS}"
        ))
        .bind(tenant_id)
        .bind(user_id)
        .bind(active)
        .bind(status.as_str())
        .fetch_optional(&self.pool)
        .await?
        .ok_or(CoreError::MemberNotFound)?;
        row.try_into()
    }

    async fn remove_member(&self, tenant_id: Uuid, user_id: Uuid) -> CoreResult<MemberRemoval> {
        let mut tx = self.pool.begin().await?;
        let ledger_email = sqlx::query_scalar::<_, String>(
            "DELETE FROM memberships WHERE tenant_id = $1 AND user_id = $2 RETURNING email",
        )
        .bind(tenant_id)
        .bind(user_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(CoreError::MemberNotFound)?;
        let email = sqlx::query_scalar::<_, String>("SELECT email FROM identities WHERE id = $1")
            .bind(user_id)
            .fetch_optional(&mut *tx)
            .await?
            .unwrap_or(ledger_email);
        let invites_deleted = sqlx::query(
            "DELETE FROM invites WHERE tenant_id = $1 AND email = $2 AND status = 'pending'",
        )
        .bind(tenant_id)
        .bind(&email)
        .execute(&mut *tx)
        .await?
        .rows_affected();
        let purged = sqlx::query(
            "DELETE FROM identities \
             WHERE id = $1 AND NOT email_verified AND platform_role <> 'super-admin' \
               AND NOT EXISTS (SELECT 1 FROM memberships WHERE user_id = $1)",
        )
        .bind(user_id)
        .execute(&mut *tx)
        .await?
        .rows_affected()
            > 0;
        tx.commit().await?;
        if purged {
            info!(user_id = %user_id, "purged unverified placeholder identity");
        }
        Ok(MemberRemoval {
            invites_deleted,
            identity_purged: purged,
        })
    }

    async fn touch_last_login(&self, user_id: Uuid, at: DateTime<Utc>) -> CoreResult<()> {
        sqlx::query("UPDATE memberships SET last_login_at = $2 WHERE user_id = $1")
            .bind(user_id)
            .bind(at)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl TeamStore for PgStore {
    async fn create_team(
        &self,
        new: NewTeam,
        creator: &Identity,
        at: DateTime<Utc>,
    ) -> CoreResult<Team> {
        let mut tx = self.pool.begin().await?;
        let team = sqlx::query_as::<_, TeamRow>(&format!(
            "INSERT INTO teams (id, name, description, created_by, created_at) \
             VALUES ($1, $2, $3, $4, $5) RETURNING {TEAM_COLUMNS}"
        ))
        .bind(new_id())
        .bind(&new.name)
        .bind(&new.description)
        .bind(creator.id)
        .bind(at)
        .fetch_one(&mut *tx)
        .await?;
        sqlx::query(
            "INSERT INTO team_members (team_id, user_id, role, joined_at) VALUES ($1, $2, $3, $4)",
        )
        .bind(team.id)
        .bind(creator.id)
        .bind(TenantRole::Admin.as_str())
        .bind(at)
        .execute(&mut *tx)
        .await?;
        let members = team_members_of(&mut tx, team.id).await?;
        tx.commit().await?;
        Ok(team.with_members(members))
    }

    async fn teams_for_user(&self, user_id: Uuid) -> CoreResult<Vec<Team>> {
        let mut conn = self.pool.acquire().await?;
        let rows = sqlx::query_as::<_, TeamRow>(
            "SELECT t.id, t.name, t.description, t.created_by, t.created_at, t.removed \
             FROM teams t JOIN team_members tm ON tm.team_id = t.id \
             WHERE tm.user_id = $1 AND NOT t.removed \
             ORDER BY t.created_at, t.id",
        )
        .bind(user_id)
        .fetch_all(&mut *conn)
        .await?;
        let mut teams = Vec::with_capacity(rows.len());
        for row in rows {
            let members = team_members_of(&mut conn, row.id).await?;
            teams.push(row.with_members(members));
        }
        Ok(teams)
    }
}

#[async_trait]
impl InviteStore for PgStore {
    async fn create_invite(
        &self,
        new: NewInvite,
        placeholder: Option<NewIdentity>,
        at: DateTime<Utc>,
    ) -> CoreResult<InviteCreated> {
        let mut tx = self.pool.begin().await?;
        let tenant_live = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM tenants WHERE id = $1 AND NOT removed)",
        )
        .bind(new.tenant_id)
        .fetch_one(&mut *tx)
        .await?;
        if !tenant_live {
            return Err(CoreError::TenantNotFound);
        }
        let existing = sqlx::query_scalar::<_, Uuid>("SELECT id FROM identities WHERE email = $1")
            .bind(&new.email)
            .fetch_optional(&mut *tx)
            .await?;
        if let Some(uid) = existing {
            let member = sqlx::query_scalar::<_, bool>(&format!(
                "SELECT EXISTS(SELECT 1 FROM memberships \
                 WHERE user_id = $1 AND tenant_id = $2 AND status IN {MEMBER_STATUSES})"
            ))
            .bind(uid)
            .bind(new.tenant_id)
            .fetch_one(&mut *tx)
            .await?;
            if member {
                return Err(CoreError::AlreadyMember);
            }
        }
        let pending = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM invites \
             WHERE email = $1 AND tenant_id = $2 AND status = 'pending')",
        )
        .bind(&new.email)
        .bind(new.tenant_id)
        .fetch_one(&mut *tx)
        .await?;
        if pending {
            return Err(CoreError::DuplicateInvite);
        }
        let placeholder = match (existing, placeholder) {
            (None, Some(p)) => Some(insert_identity(&mut tx, p).await?),
            _ => None,
        };
        // The partial unique index backs the pending check under races.
        let row = sqlx::query_as::<_, InviteRow>(&format!(
            "INSERT INTO invites (id, tenant_id, email, invited_by, invited_at, status, role) \
             VALUES ($1, $2, $3, $4, $5, 'pending', $6) RETURNING {INVITE_COLUMNS}"
        ))
        .bind(new_id())
        .bind(new.tenant_id)
        .bind(&new.email)
        .bind(new.invited_by)
        .bind(at)
        .bind(new.role.as_str())
        .fetch_one(&mut *tx)
        .await
        .map_err(CoreError::from_unique_violation)?;
        tx.commit().await?;
        Ok(InviteCreated {
            invite: row.try_into()?,
            placeholder,
        })
    }

    async fn invite_by_id(&self, id: Uuid) -> CoreResult<Option<Invite>> {
        let row = sqlx::query_as::<_, InviteRow>(&format!(
            "SELECT {INVITE_COLUMNS} FROM invites WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(Invite::try_from).transpose()
    }

    async fn pending_invites_for_email(&self, email: &str) -> CoreResult<Vec<PendingInvite>> {
        let rows = sqlx::query_as::<_, (Uuid, String)>(
            "SELECT i.id, t.name FROM invites i JOIN tenants t ON t.id = i.tenant_id \
             WHERE i.email = $1 AND i.status = 'pending' AND NOT t.removed \
             ORDER BY i.invited_at",
        )
        .bind(email)
        .fetch_all(&self.pool)
        .await?;
        let mut out = Vec::with_capacity(rows.len());
        for (id, tenant_name) in rows {
            if let Some(invite) = self.invite_by_id(id).await? {
                out.push(PendingInvite {
                    invite,
                    tenant_name,
                });
            }
        }
        Ok(out)
    }

    async fn accept_invite(
        &self,
        invite_id: Uuid,
        identity: &Identity,
        at: DateTime<Utc>,
    ) -> CoreResult<InviteAccepted> {
        let mut tx = self.pool.begin().await?;
        let invite: Invite = sqlx::query_as::<_, InviteRow>(&format!(
            "SELECT {INVITE_COLUMNS} FROM invites WHERE id = $1 FOR UPDATE"
        ))
        .bind(invite_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(CoreError::InviteNotFound)?
        .try_into()?;
        if invite.status != InviteStatus::Pending {
            return Err(CoreError::InviteNotPending(invite.status));
        }
        let tenant_name = sqlx::query_scalar::<_, String>(
            "SELECT name FROM tenants WHERE id = $1 AND NOT removed",
        )
        .bind(invite.tenant_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(CoreError::TenantNotFound)?;
        let member = sqlx::query_scalar::<_, bool>(&format!(
            "SELECT EXISTS(SELECT 1 FROM memberships \
             WHERE user_id = $1 AND tenant_id = $2 AND status IN {MEMBER_STATUSES})"
        ))
        .bind(identity.id)
        .bind(invite.tenant_id)
        .fetch_one(&mut *tx)
        .await?;
        if member {
            return Err(CoreError::AlreadyMember);
        }
        // A leftover non-member entry (legacy `invited`/`removed`) is overwritten.
        let row = sqlx::query_as::<_, MembershipRow>(&format!(
            "INSERT INTO memberships \
             (user_id, tenant_id, status, role, invited_by, started_at, email, name, active) \
             VALUES ($1, $2, 'accepted', $3, $4, $5, $6, $7, TRUE) \
             ON CONFLICT (user_id, tenant_id) DO UPDATE SET \
               status = 'accepted', role = EXCLUDED.role, invited_by = EXCLUDED.invited_by, \
               started_at = EXCLUDED.started_at, email = EXCLUDED.email, \
               name = EXCLUDED.name, active = TRUE \
             RETURNING {MEMBERSHIP_COLUMNS}"
        ))
        .bind(identity.id)
        .bind(invite.tenant_id)
        .bind(invite.role.as_str())
        .bind(invite.invited_by)
        .bind(at)
        .bind(&identity.email)
        .bind(identity.display_name())
        .fetch_one(&mut *tx)
        .await?;
        sqlx::query("DELETE FROM invites WHERE id = $1")
            .bind(invite_id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(InviteAccepted {
            membership: row.try_into()?,
            tenant_name,
        })
    }

    async fn decline_invite(&self, invite_id: Uuid) -> CoreResult<Invite> {
        let row = sqlx::query_as::<_, InviteRow>(&format!(
            "UPDATE invites SET status = 'declined' \
             WHERE id = $1 AND status = 'pending' RETURNING {INVITE_COLUMNS}"
        ))
        .bind(invite_id)
        .fetch_optional(&self.pool)
        .await?;
        match row {
            Some(row) => row.try_into(),
            None => match self.invite_by_id(invite_id).await? {
                Some(invite) => Err(CoreError::InviteNotPending(invite.status)),
                None => Err(CoreError::InviteNotFound),
            },
        }
    }
}

#[async_trait]
impl CodeStore for PgStore {
    async fn replace_code(&self, code: VerificationCode) -> CoreResult<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM verification_codes WHERE email = $1 AND purpose = $2")
            .bind(&code.email)
            .bind(code.purpose.as_str())
            .execute(&mut *tx)
            .await?;
        sqlx::query(
            "INSERT INTO verification_codes \
             (id, email, code_hash, purpose, password_hash, created_at, expires_at, verified, attempts) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
        )
        .bind(code.id)
        .bind(&code.email)
        .bind(&code.code_hash)
        .bind(code.purpose.as_str())
        .bind(&code.password_hash)
        .bind(code.created_at)
        .bind(code.expires_at)
        .bind(code.verified)
        .bind(code.attempts)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(())
    }

    async fn live_code(
        &self,
        email: &str,
        purpose: CodePurpose,
        now: DateTime<Utc>,
    ) -> CoreResult<Option<VerificationCode>> {
        let row = sqlx::query_as::<_, CodeRow>(&format!(
            "SELECT {CODE_COLUMNS} FROM verification_codes \
             WHERE email = $1 AND purpose = $2 AND NOT verified AND expires_at > $3 \
             ORDER BY created_at DESC LIMIT 1"
        ))
        .bind(email)
        .bind(purpose.as_str())
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;
        row.map(VerificationCode::try_from).transpose()
    }

    async fn record_failed_attempt(&self, id: Uuid) -> CoreResult<i32> {
        sqlx::query_scalar::<_, i32>(
            "UPDATE verification_codes SET attempts = attempts + 1 WHERE id = $1 RETURNING attempts",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(CoreError::InvalidCode)
    }

    async fn consume_code(&self, id: Uuid) -> CoreResult<bool> {
        let updated = sqlx::query(
            "UPDATE verification_codes SET verified = TRUE WHERE id = $1 AND NOT verified",
        )
        .bind(id)
        .execute(&self.pool)
        .await?
        .rows_affected();
        Ok(updated == 1)
    }

    async fn delete_code(&self, id: Uuid) -> CoreResult<()> {
        sqlx::query("DELETE FROM verification_codes WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn purge_expired_codes(&self, now: DateTime<Utc>) -> CoreResult<u64> {
        let deleted = sqlx::query("DELETE FROM verification_codes WHERE expires_at <= $1")
            .bind(now)
            .execute(&self.pool)
            .await?
            .rows_affected();
        Ok(deleted)
    }
}

/// Start a query over `actions` with `filter` applied as bound predicates.
fn filtered_actions(head: &str, filter: &ActionFilter) -> QueryBuilder<'static, Postgres> {
    let mut qb = QueryBuilder::new(head);
    qb.push(" WHERE TRUE");
    if let Some(uid) = &filter.user_id {
        qb.push(" AND uid = ").push_bind(uid.clone());
    }
    if let Some(tenant) = &filter.tenant_id {
        qb.push(" AND company_id = ").push_bind(tenant.clone());
    }
    if let Some(kind) = &filter.kind {
        qb.push(" AND type = ").push_bind(kind.clone());
    }
    if let Some(collection) = &filter.collection {
        qb.push(" AND collection = ").push_bind(collection.clone());
    }
    if let Some(removed) = filter.removed {
        qb.push(" AND removed = ").push_bind(removed);
    }
    match (filter.from, filter.to, filter.since) {
        (None, None, Some(since)) => {
            qb.push(" AND created > ").push_bind(since);
        }
        (from, to, _) => {
            if let Some(from) = from {
                qb.push(" AND created >= ").push_bind(from);
            }
            if let Some(to) = to {
                qb.push(" AND created < ").push_bind(to);
            }
        }
    }
    qb
}

#[async_trait]
impl ActionStore for PgStore {
    async fn insert_action(&self, new: NewAction) -> CoreResult<Action> {
        let row = sqlx::query_as::<_, ActionRow>(&format!(
            "INSERT INTO actions \
             (id, type, collection, read_type, uid, company_id, count, host, doc_id, created, removed) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11) \
             RETURNING {ACTION_COLUMNS}"
        ))
        .bind(new_id())
        .bind(&new.kind)
        .bind(&new.collection)
        .bind(&new.read_type)
        .bind(&new.user_id)
        .bind(&new.tenant_id)
        .bind(new.count)
        .bind(&new.host)
        .bind(&new.doc_id)
        .bind(new.created)
        .bind(new.removed)
        .fetch_one(&self.pool)
        .await?;
        Ok(row.into())
    }

    async fn action_by_id(&self, id: Uuid) -> CoreResult<Option<Action>> {
        let row = sqlx::query_as::<_, ActionRow>(&format!(
            "SELECT {ACTION_COLUMNS} FROM actions WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Action::from))
    }

    async fn list_actions(
        &self,
        filter: &ActionFilter,
        page: Pagination,
    ) -> CoreResult<Page<Action>> {
        let total = filtered_actions("SELECT COUNT(*) FROM actions", filter)
            .build_query_scalar::<i64>()
            .fetch_one(&self.pool)
            .await?;
        let mut qb = filtered_actions(&format!("SELECT {ACTION_COLUMNS} FROM actions"), filter);
        qb.push(" ORDER BY created DESC, id DESC LIMIT ")
            .push_bind(i64::from(page.limit))
            .push(" OFFSET ")
            .push_bind(page.offset() as i64);
        let rows = qb
            .build_query_as::<ActionRow>()
            .fetch_all(&self.pool)
            .await?;
        Ok(Page::new(
            rows.into_iter().map(Action::from).collect(),
            total as u64,
            page,
        ))
    }

    async fn update_action(&self, id: Uuid, patch: &ActionPatch) -> CoreResult<Action> {
        let mut tx = self.pool.begin().await?;
        let mut action: Action = sqlx::query_as::<_, ActionRow>(&format!(
            "SELECT {ACTION_COLUMNS} FROM actions WHERE id = $1 FOR UPDATE"
        ))
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(CoreError::ActionNotFound)?
        .into();
        patch.apply(&mut action);
        sqlx::query(
            "UPDATE actions SET type = $2, collection = $3, read_type = $4, count = $5, \
             host = $6, removed = $7 WHERE id = $1",
        )
        .bind(id)
        .bind(&action.kind)
        .bind(&action.collection)
        .bind(&action.read_type)
        .bind(action.count)
        .bind(&action.host)
        .bind(action.removed)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(action)
    }

    async fn delete_action(&self, id: Uuid) -> CoreResult<()> {
        let deleted = sqlx::query("DELETE FROM actions WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?
            .rows_affected();
        if deleted == 0 {
            return Err(CoreError::ActionNotFound);
        }
        Ok(())
    }

    async fn delete_all_actions(&self) -> CoreResult<u64> {
        Ok(sqlx::query("DELETE FROM actions")
            .execute(&self.pool)
            .await?
            .rows_affected())
    }

    async fn aggregate_actions(&self, query: &AggregateQuery) -> CoreResult<Vec<BillingGroup>> {
        // Column names come from closed enums, never from request text.
        let group = query.group_by.column();
        let sum = query.sum.column();
        // SUM over bigint is numeric; out-of-range totals come back NULL.
        let rows = sqlx::query_as::<_, (String, Option<i64>, i64)>(&format!(
            "SELECT \"{group}\"::text, \
                    CASE WHEN COALESCE(SUM(\"{sum}\"), 0) \
                              BETWEEN -9223372036854775808 AND 9223372036854775807 \
                         THEN COALESCE(SUM(\"{sum}\"), 0)::bigint END, \
                    COUNT(*)::bigint \
             FROM actions \
             WHERE NOT removed AND created >= $1 AND created < $2 \
               AND ($3::text IS NULL OR company_id = $3) \
             GROUP BY \"{group}\" ORDER BY \"{group}\""
        ))
        .bind(query.from)
        .bind(query.to)
        .bind(&query.tenant_id)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter()
            .map(|(key, total_sum, document_count)| {
                Ok(BillingGroup {
                    key,
                    total_sum: total_sum.ok_or(CoreError::SumOutOfRange)?,
                    document_count,
                })
            })
            .collect()
    }

    async fn distinct_action_values(&self, field: DistinctField) -> CoreResult<Vec<String>> {
        let column = field.column();
        let values = sqlx::query_scalar::<_, String>(&format!(
            "SELECT DISTINCT \"{column}\" FROM actions WHERE NOT removed ORDER BY 1"
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(values)
    }
}

#[async_trait]
impl Store for PgStore {
    async fn ping(&self) -> bool {
        sqlx::query("SELECT 1").execute(&self.pool).await.is_ok()
    }
}
