//! Storage traits.
//!
//! One trait per entity family, combined into [`Store`]. Every method is a
//! single atomic unit: implementations either run it inside one database
//! transaction ([`PgStore`]) or under one lock ([`MemoryStore`]), so the
//! invariants checked inside a method cannot race with other writers.
//!
//! The membership ledger is the only record of who belongs to a tenant.
//! [`Tenant::members`] is always derived from ledger entries whose status is
//! `accepted` or `inactive`.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::CoreResult;
use crate::models::action::{
    Action, ActionFilter, ActionPatch, AggregateQuery, BillingGroup, DistinctField, NewAction,
};
use crate::models::identity::{Identity, IdentityPatch, NewIdentity};
use crate::models::invite::{Invite, NewInvite, PendingInvite};
use crate::models::membership::{MemberRemoval, Membership};
use crate::models::team::{NewTeam, Team};
use crate::models::tenant::{NewTenant, Tenant, TenantRole};
use crate::models::verification::{CodePurpose, VerificationCode};
use crate::models::{Page, Pagination};

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// A tenant together with the caller's ledger entry in it.
#[derive(Debug, Clone)]
pub struct MemberTenant {
    pub tenant: Tenant,
    pub membership: Membership,
}

/// Outcome of queueing an invite.
#[derive(Debug, Clone)]
pub struct InviteCreated {
    pub invite: Invite,
    /// Placeholder identity created for an unknown email.
    pub placeholder: Option<Identity>,
}

/// Outcome of accepting an invite.
#[derive(Debug, Clone)]
pub struct InviteAccepted {
    pub membership: Membership,
    pub tenant_name: String,
}

#[async_trait]
pub trait IdentityStore: Send + Sync {
    /// Insert a new identity. Fails with `EmailInUse` / `UsernameInUse`.
    async fn create_identity(&self, new: NewIdentity) -> CoreResult<Identity>;

    async fn identity_by_id(&self, id: Uuid) -> CoreResult<Option<Identity>>;

    /// Lookup by case-folded email.
    async fn identity_by_email(&self, email: &str) -> CoreResult<Option<Identity>>;

    /// Lookup by case-folded username.
    async fn identity_by_username(&self, username: &str) -> CoreResult<Option<Identity>>;

    /// Newest first.
    async fn list_identities(&self, page: Pagination) -> CoreResult<Page<Identity>>;

    /// Apply an administrative patch. Fails with `LastSuperAdmin` when the
    /// patch would leave no super-admin.
    async fn update_identity(&self, id: Uuid, patch: IdentityPatch) -> CoreResult<Identity>;

    /// Hard delete, cascading to ledger entries. Fails with `LastSuperAdmin`
    /// when deleting the only super-admin.
    async fn delete_identity(&self, id: Uuid) -> CoreResult<()>;

    /// Mark the email verified and, when given, replace the password hash and
    /// clear the rotation flag.
    async fn mark_verified(&self, id: Uuid, password_hash: Option<String>) -> CoreResult<()>;

    async fn count_super_admins(&self) -> CoreResult<u64>;

    /// Rewrite legacy platform role spellings to canonical tags. Returns the
    /// number of rows changed.
    async fn normalize_platform_roles(&self) -> CoreResult<u64>;
}

#[async_trait]
pub trait TenantStore: Send + Sync {
    /// Create the tenant and the creator's `admin` ledger entry together.
    async fn create_tenant(
        &self,
        new: NewTenant,
        creator: &Identity,
        at: DateTime<Utc>,
    ) -> CoreResult<Tenant>;

    /// Live (non-removed) tenant with its derived member list.
    async fn tenant_by_id(&self, id: Uuid) -> CoreResult<Option<Tenant>>;

    /// Live tenants the user belongs to (accepted or inactive).
    async fn tenants_for_user(&self, user_id: Uuid) -> CoreResult<Vec<MemberTenant>>;

    async fn membership(&self, user_id: Uuid, tenant_id: Uuid) -> CoreResult<Option<Membership>>;

    async fn memberships_for_user(&self, user_id: Uuid) -> CoreResult<Vec<Membership>>;

    /// Fails with `MemberNotFound` unless the user is a member of the tenant.
    async fn update_member_role(
        &self,
        tenant_id: Uuid,
        user_id: Uuid,
        role: TenantRole,
    ) -> CoreResult<Membership>;

    /// Toggle between `accepted` and `inactive`.
    async fn set_member_active(
        &self,
        tenant_id: Uuid,
        user_id: Uuid,
        active: bool,
    ) -> CoreResult<Membership>;

    /// Delete the ledger entry and pending invites for the member's email in
    /// this tenant. An unverified identity left with no memberships is purged.
    async fn remove_member(&self, tenant_id: Uuid, user_id: Uuid) -> CoreResult<MemberRemoval>;

    /// Stamp `last_login_at` on every ledger entry of the user.
    async fn touch_last_login(&self, user_id: Uuid, at: DateTime<Utc>) -> CoreResult<()>;
}

#[async_trait]
pub trait TeamStore: Send + Sync {
    /// Create the team with the creator as its `admin`.
    async fn create_team(&self, new: NewTeam, creator: &Identity, at: DateTime<Utc>)
    -> CoreResult<Team>;

    /// Live teams the user belongs to, oldest first, with their members.
    async fn teams_for_user(&self, user_id: Uuid) -> CoreResult<Vec<Team>>;
}

#[async_trait]
pub trait InviteStore: Send + Sync {
    /// Queue a pending invite. Fails with `AlreadyMember` when the email
    /// already belongs to a member and `DuplicateInvite` when a pending invite
    /// exists for the pair. `placeholder` is inserted only when no identity
    /// owns the email yet.
    async fn create_invite(
        &self,
        new: NewInvite,
        placeholder: Option<NewIdentity>,
        at: DateTime<Utc>,
    ) -> CoreResult<InviteCreated>;

    async fn invite_by_id(&self, id: Uuid) -> CoreResult<Option<Invite>>;

    /// Pending invites for a case-folded email, joined with tenant names.
    async fn pending_invites_for_email(&self, email: &str) -> CoreResult<Vec<PendingInvite>>;

    /// Resolve a pending invite into an `accepted` ledger entry for
    /// `identity` and delete the invite.
    async fn accept_invite(
        &self,
        invite_id: Uuid,
        identity: &Identity,
        at: DateTime<Utc>,
    ) -> CoreResult<InviteAccepted>;

    /// Mark a pending invite declined. The record is kept.
    async fn decline_invite(&self, invite_id: Uuid) -> CoreResult<Invite>;
}

#[async_trait]
pub trait CodeStore: Send + Sync {
    /// Delete every code for `(email, purpose)` and insert `code`.
    async fn replace_code(&self, code: VerificationCode) -> CoreResult<()>;

    /// The live code for `(email, purpose)` at `now`, if any.
    async fn live_code(
        &self,
        email: &str,
        purpose: CodePurpose,
        now: DateTime<Utc>,
    ) -> CoreResult<Option<VerificationCode>>;

    /// Increment the failure counter, returning the new value.
    async fn record_failed_attempt(&self, id: Uuid) -> CoreResult<i32>;

    /// Flip `verified` if it is still unset. Returns whether this call
    /// consumed the code.
    async fn consume_code(&self, id: Uuid) -> CoreResult<bool>;

    async fn delete_code(&self, id: Uuid) -> CoreResult<()>;

    /// Delete codes expired at `now`.
    async fn purge_expired_codes(&self, now: DateTime<Utc>) -> CoreResult<u64>;
}

#[async_trait]
pub trait ActionStore: Send + Sync {
    async fn insert_action(&self, new: NewAction) -> CoreResult<Action>;

    async fn action_by_id(&self, id: Uuid) -> CoreResult<Option<Action>>;

    /// Filtered listing, newest `created` first.
    async fn list_actions(&self, filter: &ActionFilter, page: Pagination)
    -> CoreResult<Page<Action>>;

    async fn update_action(&self, id: Uuid, patch: &ActionPatch) -> CoreResult<Action>;

    async fn delete_action(&self, id: Uuid) -> CoreResult<()>;

    async fn delete_all_actions(&self) -> CoreResult<u64>;

    /// Groups over non-removed actions in `[from, to)`, ordered by key.
    async fn aggregate_actions(&self, query: &AggregateQuery) -> CoreResult<Vec<BillingGroup>>;

    /// Sorted distinct values over non-removed actions.
    async fn distinct_action_values(&self, field: DistinctField) -> CoreResult<Vec<String>>;
}

/// Everything the services need.
#[async_trait]
pub trait Store:
    IdentityStore + TenantStore + TeamStore + InviteStore + CodeStore + ActionStore
{
    /// Cheap liveness check.
    async fn ping(&self) -> bool;
}
