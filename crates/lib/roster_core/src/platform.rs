//! Platform administration: user CRUD across all tenants, restricted to
//! super-admins, and the bootstrap/maintenance commands.
//!
//! The "at least one super-admin" invariant lives in the store methods
//! ([`IdentityStore::update_identity`](crate::store::IdentityStore::update_identity),
//! [`IdentityStore::delete_identity`](crate::store::IdentityStore::delete_identity)),
//! where it is checked atomically with the write.

use tracing::info;
use uuid::Uuid;

use crate::accounts::normalize_email;
use crate::auth::password::{hash_password, validate_password};
use crate::error::{CoreError, CoreResult};
use crate::models::identity::{Identity, IdentityPatch, NewIdentity, PlatformRole, fold_username};
use crate::models::{Page, Pagination};
use crate::store::Store;

/// Admin-created user.
#[derive(Debug, Clone, Default)]
pub struct NewUser {
    pub email: String,
    pub username: Option<String>,
    pub password: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub role: PlatformRole,
    pub email_verified: bool,
}

pub fn require_super_admin(actor: &Identity) -> CoreResult<()> {
    if actor.is_super_admin() {
        Ok(())
    } else {
        Err(CoreError::SuperAdminRequired)
    }
}

pub async fn create_user(store: &dyn Store, actor: &Identity, input: NewUser) -> CoreResult<Identity> {
    require_super_admin(actor)?;
    let email = normalize_email(&input.email)?;
    validate_password(&input.password)?;
    let identity = store
        .create_identity(NewIdentity {
            email,
            username: input
                .username
                .as_deref()
                .map(fold_username)
                .filter(|u| !u.is_empty()),
            first_name: input.first_name,
            last_name: input.last_name,
            time_zone: None,
            password_hash: hash_password(&input.password)?,
            email_verified: input.email_verified,
            platform_role: input.role,
            must_rotate_password: false,
            created_by: Some(actor.id),
        })
        .await?;
    info!(user_id = %identity.id, by = %actor.id, role = %identity.platform_role, "user created by admin");
    Ok(identity)
}

pub async fn list_users(
    store: &dyn Store,
    actor: &Identity,
    page: Pagination,
) -> CoreResult<Page<Identity>> {
    require_super_admin(actor)?;
    store.list_identities(page).await
}

pub async fn get_user(store: &dyn Store, actor: &Identity, user_id: Uuid) -> CoreResult<Identity> {
    require_super_admin(actor)?;
    store
        .identity_by_id(user_id)
        .await?
        .ok_or(CoreError::UserNotFound)
}

/// Patch role and/or verification. An empty patch is `NoUpdates`.
pub async fn update_user(
    store: &dyn Store,
    actor: &Identity,
    user_id: Uuid,
    patch: IdentityPatch,
) -> CoreResult<Identity> {
    require_super_admin(actor)?;
    if patch.is_empty() {
        return Err(CoreError::NoUpdates);
    }
    let identity = store.update_identity(user_id, patch.clone()).await?;
    info!(
        user_id = %user_id,
        by = %actor.id,
        role = ?patch.platform_role,
        email_verified = ?patch.email_verified,
        "user updated by admin"
    );
    Ok(identity)
}

pub async fn set_user_role(
    store: &dyn Store,
    actor: &Identity,
    user_id: Uuid,
    role: PlatformRole,
) -> CoreResult<Identity> {
    update_user(
        store,
        actor,
        user_id,
        IdentityPatch {
            platform_role: Some(role),
            email_verified: None,
        },
    )
    .await
}

/// Hard delete.
pub async fn delete_user(store: &dyn Store, actor: &Identity, user_id: Uuid) -> CoreResult<()> {
    require_super_admin(actor)?;
    store.delete_identity(user_id).await?;
    info!(user_id = %user_id, by = %actor.id, "user deleted by admin");
    Ok(())
}

/// Create the first super-admin, or promote and verify an existing identity
/// with that email. Returns the identity and whether it was newly created.
pub async fn bootstrap_super_admin(
    store: &dyn Store,
    email: &str,
    password: &str,
    username: Option<&str>,
) -> CoreResult<(Identity, bool)> {
    let email = normalize_email(email)?;
    if let Some(existing) = store.identity_by_email(&email).await? {
        let identity = store
            .update_identity(
                existing.id,
                IdentityPatch {
                    platform_role: Some(PlatformRole::SuperAdmin),
                    email_verified: Some(true),
                },
            )
            .await?;
        info!(user_id = %identity.id, "existing identity promoted to super-admin");
        return Ok((identity, false));
    }
    validate_password(password)?;
    let identity = store
        .create_identity(NewIdentity {
            email,
            username: username.map(fold_username).filter(|u| !u.is_empty()),
            first_name: None,
            last_name: None,
            time_zone: None,
            password_hash: hash_password(password)?,
            email_verified: true,
            platform_role: PlatformRole::SuperAdmin,
            must_rotate_password: false,
            created_by: None,
        })
        .await?;
    info!(user_id = %identity.id, "super-admin created");
    Ok((identity, true))
}

/// One pass over stored platform roles rewriting legacy spellings.
pub async fn normalize_roles(store: &dyn Store) -> CoreResult<u64> {
    store.normalize_platform_roles().await
}
