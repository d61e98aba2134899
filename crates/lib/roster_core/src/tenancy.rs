//! Tenant and membership lifecycle.
//!
//! `NONE -> INVITED -> ACCEPTED <-> INACTIVE`, and any state `-> REMOVED`.
//! Every mutation checks the caller's ledger role through
//! [`permissions`](crate::permissions) before it writes.

use chrono::{DateTime, Utc};
use tracing::{info, warn};
use uuid::Uuid;

use crate::auth::password::hash_password;
use crate::auth::random_secret;
use crate::error::{CoreError, CoreResult};
use crate::mailer::{Mailer, invite_email};
use crate::models::identity::{Identity, NewIdentity, PlatformRole, fold_email, is_valid_email};
use crate::models::invite::{Invite, InviteStatus, NewInvite, PendingInvite};
use crate::models::membership::{MemberRemoval, Membership};
use crate::models::tenant::{NewTenant, Tenant, TenantMember, TenantRole};
use crate::permissions::{self, RolePermissions};
use crate::store::{InviteAccepted, MemberTenant, Store};

/// Longest accepted tenant name.
pub const MAX_TENANT_NAME_LEN: usize = 120;

/// Length of the random password given to placeholder identities.
const PLACEHOLDER_PASSWORD_LEN: usize = 32;

/// The caller's effective role in a tenant, if any.
pub async fn role_in(
    store: &dyn Store,
    user_id: Uuid,
    tenant_id: Uuid,
) -> CoreResult<Option<TenantRole>> {
    Ok(store
        .membership(user_id, tenant_id)
        .await?
        .and_then(|m| m.effective_role()))
}

async fn live_tenant(store: &dyn Store, tenant_id: Uuid) -> CoreResult<Tenant> {
    store
        .tenant_by_id(tenant_id)
        .await?
        .ok_or(CoreError::TenantNotFound)
}

/// Resolve the tenant and require `check` on the caller's role in it.
async fn authorize(
    store: &dyn Store,
    actor: &Identity,
    tenant_id: Uuid,
    check: fn(TenantRole) -> bool,
    action: &str,
) -> CoreResult<(Tenant, TenantRole)> {
    let tenant = live_tenant(store, tenant_id).await?;
    let role = role_in(store, actor.id, tenant_id).await?;
    let role = permissions::require(role, check, action)?;
    Ok((tenant, role))
}

/// Members and platform super-admins may read a tenant.
async fn readable_tenant(store: &dyn Store, actor: &Identity, tenant_id: Uuid) -> CoreResult<Tenant> {
    let tenant = live_tenant(store, tenant_id).await?;
    if actor.is_super_admin() || role_in(store, actor.id, tenant_id).await?.is_some() {
        return Ok(tenant);
    }
    Err(CoreError::Forbidden("not a member of this company".into()))
}

/// Unverified identity with a random password that must be rotated.
fn placeholder_identity(email: &str, created_by: Option<Uuid>) -> CoreResult<NewIdentity> {
    Ok(NewIdentity {
        email: email.to_string(),
        username: None,
        first_name: None,
        last_name: None,
        time_zone: None,
        password_hash: hash_password(&random_secret(PLACEHOLDER_PASSWORD_LEN))?,
        email_verified: false,
        platform_role: PlatformRole::None,
        must_rotate_password: true,
        created_by,
    })
}

// ---------------------------------------------------------------------------
// Tenants
// ---------------------------------------------------------------------------

/// Create a tenant with `actor` as its sole `admin`.
pub async fn create_tenant(
    store: &dyn Store,
    actor: &Identity,
    name: &str,
    description: Option<&str>,
    now: DateTime<Utc>,
) -> CoreResult<Tenant> {
    let name = name.trim();
    if name.is_empty() {
        return Err(CoreError::Validation("Company name is required".into()));
    }
    if name.chars().count() > MAX_TENANT_NAME_LEN {
        return Err(CoreError::Validation(format!(
            "Company name must be at most {MAX_TENANT_NAME_LEN} characters"
        )));
    }
    let description = description
        .map(str::trim)
        .filter(|d| !d.is_empty())
        .map(str::to_owned);
    let tenant = store
        .create_tenant(
            NewTenant {
                name: name.to_string(),
                description,
            },
            actor,
            now,
        )
        .await?;
    info!(tenant_id = %tenant.id, user_id = %actor.id, "company created");
    Ok(tenant)
}

/// Tenants the caller belongs to, with the caller's entry in each.
pub async fn my_tenants(store: &dyn Store, actor: &Identity) -> CoreResult<Vec<MemberTenant>> {
    store.tenants_for_user(actor.id).await
}

pub async fn get_tenant(store: &dyn Store, actor: &Identity, tenant_id: Uuid) -> CoreResult<Tenant> {
    readable_tenant(store, actor, tenant_id).await
}

pub async fn list_members(
    store: &dyn Store,
    actor: &Identity,
    tenant_id: Uuid,
) -> CoreResult<Vec<TenantMember>> {
    Ok(readable_tenant(store, actor, tenant_id).await?.members)
}

/// The caller's role in the tenant and what it allows.
pub async fn permissions_for(
    store: &dyn Store,
    actor: &Identity,
    tenant_id: Uuid,
) -> CoreResult<(TenantRole, RolePermissions)> {
    live_tenant(store, tenant_id).await?;
    let role = role_in(store, actor.id, tenant_id)
        .await?
        .ok_or_else(|| CoreError::Forbidden("not a member of this company".into()))?;
    Ok((role, RolePermissions::for_role(role)))
}

// ---------------------------------------------------------------------------
// Invites
// ---------------------------------------------------------------------------

/// Who to invite, where, and at which role.
#[derive(Debug, Clone)]
pub struct InviteRequest {
    pub tenant_id: Uuid,
    pub email: String,
    pub role: TenantRole,
}

/// Queue an invite and mail the invitee.
///
/// An unknown email gets a placeholder identity. The invite is persisted
/// before the mail is sent; a delivery failure is returned but nothing is
/// rolled back.
pub async fn invite_member(
    store: &dyn Store,
    mailer: &dyn Mailer,
    app_url: &str,
    actor: &Identity,
    request: InviteRequest,
    now: DateTime<Utc>,
) -> CoreResult<Invite> {
    let InviteRequest {
        tenant_id,
        email,
        role,
    } = request;
    if !is_valid_email(&email) {
        return Err(CoreError::Validation("A valid email is required".into()));
    }
    if !role.is_invitable() {
        return Err(CoreError::Validation(
            "Invites may only propose the member or creator role".into(),
        ));
    }
    let email = fold_email(&email);
    let (tenant, _) = authorize(store, actor, tenant_id, permissions::can_invite, "invite").await?;

    let placeholder = match store.identity_by_email(&email).await? {
        Some(_) => None,
        None => Some(placeholder_identity(&email, Some(actor.id))?),
    };
    let created = store
        .create_invite(
            NewInvite {
                tenant_id,
                email: email.clone(),
                invited_by: actor.id,
                role,
            },
            placeholder,
            now,
        )
        .await?;
    if let Some(p) = &created.placeholder {
        info!(user_id = %p.id, tenant_id = %tenant_id, "placeholder identity created for invite");
    }
    info!(invite_id = %created.invite.id, tenant_id = %tenant_id, role = %role, "invite queued");

    let accept_url = format!(
        "{}/invite/{}",
        app_url.trim_end_matches('/'),
        created.invite.id
    );
    if let Err(e) = mailer
        .send(invite_email(&email, &tenant.name, &accept_url))
        .await
    {
        warn!(invite_id = %created.invite.id, error = %e, "invite email not delivered");
        return Err(e.into());
    }
    Ok(created.invite)
}

/// Pending invites addressed to the caller.
pub async fn pending_invites(store: &dyn Store, actor: &Identity) -> CoreResult<Vec<PendingInvite>> {
    store.pending_invites_for_email(&actor.email).await
}

/// Load the invite and check the caller may act on it.
///
/// Authenticated callers must own the invite's email. Anonymous callers are
/// trusted to be the invitee only when `allow_anonymous` is set.
async fn owned_invite(
    store: &dyn Store,
    actor: Option<&Identity>,
    invite_id: Uuid,
    allow_anonymous: bool,
) -> CoreResult<Invite> {
    let invite = store
        .invite_by_id(invite_id)
        .await?
        .ok_or(CoreError::InviteNotFound)?;
    match actor {
        Some(actor) if fold_email(&actor.email) != invite.email => Err(CoreError::InviteMismatch),
        Some(_) => Ok(invite),
        None if allow_anonymous => Ok(invite),
        None => Err(CoreError::AuthenticationRequired),
    }
}

/// Accept an invite, creating the ledger entry with the proposed role.
pub async fn accept_invite(
    store: &dyn Store,
    actor: Option<&Identity>,
    invite_id: Uuid,
    allow_anonymous: bool,
    now: DateTime<Utc>,
) -> CoreResult<InviteAccepted> {
    let invite = owned_invite(store, actor, invite_id, allow_anonymous).await?;
    if invite.status != InviteStatus::Pending {
        return Err(CoreError::InviteNotPending(invite.status));
    }

    let identity = match actor {
        Some(actor) => actor.clone(),
        None => match store.identity_by_email(&invite.email).await? {
            Some(identity) => identity,
            None => {
                let new = placeholder_identity(&invite.email, Some(invite.invited_by))?;
                match store.create_identity(new).await {
                    Ok(identity) => {
                        info!(user_id = %identity.id, "placeholder identity created on accept");
                        identity
                    }
                    Err(CoreError::EmailInUse) => store
                        .identity_by_email(&invite.email)
                        .await?
                        .ok_or(CoreError::UserNotFound)?,
                    Err(e) => return Err(e),
                }
            }
        },
    };

    let accepted = store.accept_invite(invite.id, &identity, now).await?;
    info!(
        invite_id = %invite.id,
        tenant_id = %invite.tenant_id,
        user_id = %identity.id,
        anonymous = actor.is_none(),
        "invite accepted"
    );
    Ok(accepted)
}

/// Decline an invite. The record is kept with status `declined`.
pub async fn decline_invite(
    store: &dyn Store,
    actor: Option<&Identity>,
    invite_id: Uuid,
    allow_anonymous: bool,
) -> CoreResult<Invite> {
    owned_invite(store, actor, invite_id, allow_anonymous).await?;
    let invite = store.decline_invite(invite_id).await?;
    info!(invite_id = %invite_id, tenant_id = %invite.tenant_id, "invite declined");
    Ok(invite)
}

// ---------------------------------------------------------------------------
// Members
// ---------------------------------------------------------------------------

/// Change another member's role. Admins cannot demote themselves.
pub async fn update_member_role(
    store: &dyn Store,
    actor: &Identity,
    tenant_id: Uuid,
    user_id: Uuid,
    role: TenantRole,
) -> CoreResult<Membership> {
    authorize(store, actor, tenant_id, permissions::can_manage_members, "change roles").await?;
    if user_id == actor.id && role != TenantRole::Admin {
        return Err(CoreError::SelfDemotion);
    }
    let entry = store.update_member_role(tenant_id, user_id, role).await?;
    info!(tenant_id = %tenant_id, user_id = %user_id, role = %role, "member role updated");
    Ok(entry)
}

/// Move a member between `accepted` and `inactive`.
pub async fn set_member_active(
    store: &dyn Store,
    actor: &Identity,
    tenant_id: Uuid,
    user_id: Uuid,
    active: bool,
) -> CoreResult<Membership> {
    authorize(store, actor, tenant_id, permissions::can_manage_members, "change member status")
        .await?;
    if user_id == actor.id && !active {
        return Err(CoreError::SelfRemoval);
    }
    let entry = store.set_member_active(tenant_id, user_id, active).await?;
    info!(tenant_id = %tenant_id, user_id = %user_id, active, "member status updated");
    Ok(entry)
}

/// Remove a member, their pending invites for the tenant, and the identity
/// itself when it is an unverified placeholder with nowhere else to go.
pub async fn remove_member(
    store: &dyn Store,
    actor: &Identity,
    tenant_id: Uuid,
    user_id: Uuid,
) -> CoreResult<MemberRemoval> {
    authorize(store, actor, tenant_id, permissions::can_manage_members, "remove members").await?;
    if user_id == actor.id {
        return Err(CoreError::SelfRemoval);
    }
    let removal = store.remove_member(tenant_id, user_id).await?;
    info!(
        tenant_id = %tenant_id,
        user_id = %user_id,
        invites_deleted = removal.invites_deleted,
        identity_purged = removal.identity_purged,
        "member removed"
    );
    Ok(removal)
}
