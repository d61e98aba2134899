//! In-process store over plain maps.
//!
//! Every method takes the lock once and holds it for its whole body, which
//! makes each call atomic in the same way a Postgres transaction is.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
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

#[derive(Default)]
struct State {
    identities: HashMap<Uuid, Identity>,
    /// Stored with an empty `members` list; members are derived on read.
    tenants: HashMap<Uuid, Tenant>,
    /// Keyed by `(user_id, tenant_id)`.
    memberships: BTreeMap<(Uuid, Uuid), Membership>,
    invites: HashMap<Uuid, Invite>,
    codes: HashMap<Uuid, VerificationCode>,
    actions: HashMap<Uuid, Action>,
    /// Stored with an empty `members` list, like tenants.
    teams: HashMap<Uuid, Team>,
    /// Keyed by `(team_id, user_id)`.
    team_members: BTreeMap<(Uuid, Uuid), (TenantRole, DateTime<Utc>)>,
}

impl State {
    fn identity_with_email(&self, email: &str) -> Option<&Identity> {
        self.identities.values().find(|i| i.email == email)
    }

    fn insert_identity(&mut self, new: NewIdentity) -> CoreResult<Identity> {
        if self.identity_with_email(&new.email).is_some() {
            return Err(CoreError::EmailInUse);
        }
        if let Some(username) = &new.username
            && self
                .identities
                .values()
                .any(|i| i.username.as_deref() == Some(username.as_str()))
        {
            return Err(CoreError::UsernameInUse);
        }
        let identity = Identity {
            id: new_id(),
            email: new.email,
            username: new.username,
            first_name: new.first_name,
            last_name: new.last_name,
            time_zone: new.time_zone,
            password_hash: new.password_hash,
            email_verified: new.email_verified,
            platform_role: new.platform_role,
            must_rotate_password: new.must_rotate_password,
            removed: false,
            created_at: Utc::now(),
            created_by: new.created_by,
        };
        self.identities.insert(identity.id, identity.clone());
        Ok(identity)
    }

    fn super_admin_count(&self) -> usize {
        self.identities
            .values()
            .filter(|i| !i.removed && i.is_super_admin())
            .count()
    }

    fn live_tenant(&self, id: Uuid) -> Option<&Tenant> {
        self.tenants.get(&id).filter(|t| !t.removed)
    }

    fn members_of(&self, tenant_id: Uuid) -> Vec<TenantMember> {
        let mut members: Vec<TenantMember> = self
            .memberships
            .values()
            .filter(|m| m.tenant_id == tenant_id && m.status.is_member())
            .map(Membership::as_member)
            .collect();
        members.sort_by(|a, b| {
            a.joined_at
                .cmp(&b.joined_at)
                .then(a.user_id.cmp(&b.user_id))
        });
        members
    }

    fn with_members(&self, tenant: &Tenant) -> Tenant {
        Tenant {
            members: self.members_of(tenant.id),
            ..tenant.clone()
        }
    }

    fn team_view(&self, team: &Team) -> Team {
        let mut members: Vec<TeamMember> = self
            .team_members
            .iter()
            .filter(|((team_id, _), _)| *team_id == team.id)
            .filter_map(|(&(_, user_id), &(role, joined_at))| {
                self.identities.get(&user_id).map(|i| TeamMember {
                    user_id,
                    email: i.email.clone(),
                    username: i.username.clone(),
                    first_name: i.first_name.clone(),
                    last_name: i.last_name.clone(),
                    role,
                    joined_at,
                })
            })
            .collect();
        members.sort_by(|a, b| a.joined_at.cmp(&b.joined_at).then(a.user_id.cmp(&b.user_id)));
        Team {
            members,
            ..team.clone()
        }
    }

    fn member_entry_mut(&mut self, tenant_id: Uuid, user_id: Uuid) -> CoreResult<&mut Membership> {
        self.memberships
            .get_mut(&(user_id, tenant_id))
            .filter(|m| m.status.is_member())
            .ok_or(CoreError::MemberNotFound)
    }
}

/// Map-backed [`Store`] for tests and `--in-memory` runs.
#[derive(Default)]
pub struct MemoryStore {
    state: RwLock<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl IdentityStore for MemoryStore {
    async fn create_identity(&self, new: NewIdentity) -> CoreResult<Identity> {
        self.state.write().await.insert_identity(new)
    }

    async fn identity_by_id(&self, id: Uuid) -> CoreResult<Option<Identity>> {
        Ok(self.state.read().await.identities.get(&id).cloned())
    }

    async fn identity_by_email(&self, email: &str) -> CoreResult<Option<Identity>> {
        Ok(self.state.read().await.identity_with_email(email).cloned())
    }

    async fn identity_by_username(&self, username: &str) -> CoreResult<Option<Identity>> {
        Ok(self
            .state
            .read()
            .await
            .identities
            .values()
            .find(|i| i.username.as_deref() == Some(username))
            .cloned())
    }

    async fn list_identities(&self, page: Pagination) -> CoreResult<Page<Identity>> {
        let state = self.state.read().await;
        let mut all: Vec<&Identity> = state.identities.values().collect();
        all.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        let items = all
            .iter()
            .skip(page.offset() as usize)
            .take(page.limit as usize)
            .map(|i| (*i).clone())
            .collect();
        Ok(Page::new(items, all.len() as u64, page))
    }

    async fn update_identity(&self, id: Uuid, patch: IdentityPatch) -> CoreResult<Identity> {
        let mut state = self.state.write().await;
        let super_admins = state.super_admin_count();
        let identity = state
            .identities
            .get_mut(&id)
            .ok_or(CoreError::UserNotFound)?;
        if identity.is_super_admin()
            && patch.platform_role == Some(PlatformRole::None)
            && super_admins <= 1
        {
            warn!(user_id = %id, "refusing to demote the last super-admin");
            return Err(CoreError::LastSuperAdmin);
        }
        if let Some(role) = patch.platform_role {
            identity.platform_role = role;
        }
        if let Some(verified) = patch.email_verified {
            identity.email_verified = verified;
        }
        Ok(identity.clone())
    }

    async fn delete_identity(&self, id: Uuid) -> CoreResult<()> {
        let mut state = self.state.write().await;
        let identity = state.identities.get(&id).ok_or(CoreError::UserNotFound)?;
        if identity.is_super_admin() && state.super_admin_count() <= 1 {
            warn!(user_id = %id, "refusing to delete the last super-admin");
            return Err(CoreError::LastSuperAdmin);
        }
        state.identities.remove(&id);
        state.memberships.retain(|(user_id, _), _| *user_id != id);
        state.team_members.retain(|(_, user_id), _| *user_id != id);
        Ok(())
    }

    async fn mark_verified(&self, id: Uuid, password_hash: Option<String>) -> CoreResult<()> {
        let mut state = self.state.write().await;
        let identity = state
            .identities
            .get_mut(&id)
            .ok_or(CoreError::UserNotFound)?;
        identity.email_verified = true;
        if let Some(hash) = password_hash {
            identity.password_hash = hash;
            identity.must_rotate_password = false;
        }
        Ok(())
    }

    async fn count_super_admins(&self) -> CoreResult<u64> {
        Ok(self.state.read().await.super_admin_count() as u64)
    }

    async fn normalize_platform_roles(&self) -> CoreResult<u64> {
        // Roles are held as typed values here; nothing to rewrite.
        Ok(0)
    }
}

#[async_trait]
impl TenantStore for MemoryStore {
    async fn create_tenant(
        &self,
        new: NewTenant,
        creator: &Identity,
        at: DateTime<Utc>,
    ) -> CoreResult<Tenant> {
        let mut state = self.state.write().await;
        let tenant = Tenant {
            id: new_id(),
            name: new.name,
            description: new.description,
            created_by: creator.id,
            created_at: at,
            removed: false,
            members: Vec::new(),
        };
        state.tenants.insert(tenant.id, tenant.clone());
        state.memberships.insert(
            (creator.id, tenant.id),
            Membership {
                user_id: creator.id,
                tenant_id: tenant.id,
                status: MembershipStatus::Accepted,
                role: TenantRole::Admin,
                invited_by: None,
                started_at: at,
                last_login_at: None,
                email: creator.email.clone(),
                name: creator.display_name(),
                active: true,
                enabled: BTreeMap::new(),
            },
        );
        Ok(state.with_members(&tenant))
    }

    async fn tenant_by_id(&self, id: Uuid) -> CoreResult<Option<Tenant>> {
        let state = self.state.read().await;
        Ok(state.live_tenant(id).map(|t| state.with_members(t)))
    }

    async fn tenants_for_user(&self, user_id: Uuid) -> CoreResult<Vec<MemberTenant>> {
        let state = self.state.read().await;
        let mut out: Vec<MemberTenant> = state
            .memberships
            .values()
            .filter(|m| m.user_id == user_id && m.status.is_member())
            .filter_map(|m| {
                state.live_tenant(m.tenant_id).map(|t| MemberTenant {
                    tenant: state.with_members(t),
                    membership: m.clone(),
                })
            })
            .collect();
        out.sort_by(|a, b| a.tenant.created_at.cmp(&b.tenant.created_at));
        Ok(out)
    }

    async fn membership(&self, user_id: Uuid, tenant_id: Uuid) -> CoreResult<Option<Membership>> {
        Ok(self
            .state
            .read()
            .await
            .memberships
            .get(&(user_id, tenant_id))
            .cloned())
    }

    async fn memberships_for_user(&self, user_id: Uuid) -> CoreResult<Vec<Membership>> {
        Ok(self
            .state
            .read()
            .await
            .memberships
            .values()
            .filter(|m| m.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn update_member_role(
        &self,
        tenant_id: Uuid,
        user_id: Uuid,
        role: TenantRole,
    ) -> CoreResult<Membership> {
        let mut state = self.state.write().await;
        let entry = state.member_entry_mut(tenant_id, user_id)?;
        entry.role = role;
        Ok(entry.clone())
    }

    async fn set_member_active(
        &self,
        tenant_id: Uuid,
        user_id: Uuid,
        active: bool,
    ) -> CoreResult<Membership> {
        let mut state = self.state.write().await;
        let entry = state.member_entry_mut(tenant_id, user_id)?;
        entry.active = active;
        entry.status = if active {
            MembershipStatus::Accepted
        } else {
            MembershipStatus::Inactive
        };
        Ok(entry.clone())
    }

    async fn remove_member(&self, tenant_id: Uuid, user_id: Uuid) -> CoreResult<MemberRemoval> {
        let mut state = self.state.write().await;
        let entry = state
            .memberships
            .remove(&(user_id, tenant_id))
            .ok_or(CoreError::MemberNotFound)?;
        let email = state
            .identities
            .get(&user_id)
            .map(|i| i.email.clone())
            .unwrap_or(entry.email);

        let before = state.invites.len();
        state.invites.retain(|_, inv| {
            !(inv.tenant_id == tenant_id && inv.email == email && inv.status == InviteStatus::Pending)
        });
        let invites_deleted = (before - state.invites.len()) as u64;

        let has_other = state.memberships.keys().any(|(uid, _)| *uid == user_id);
        let purge = !has_other
            && state
                .identities
                .get(&user_id)
                .is_some_and(|i| !i.email_verified && !i.is_super_admin());
        if purge {
            state.identities.remove(&user_id);
            info!(user_id = %user_id, "purged unverified placeholder identity");
        }
        Ok(MemberRemoval {
            invites_deleted,
            identity_purged: purge,
        })
    }

    async fn touch_last_login(&self, user_id: Uuid, at: DateTime<Utc>) -> CoreResult<()> {
        let mut state = self.state.write().await;
        for entry in state.memberships.values_mut().filter(|m| m.user_id == user_id) {
            entry.last_login_at = Some(at);
        }
        Ok(())
    }
}

#[async_trait]
impl InviteStore for MemoryStore {
    async fn create_invite(
        &self,
        new: NewInvite,
        placeholder: Option<NewIdentity>,
        at: DateTime<Utc>,
    ) -> CoreResult<InviteCreated> {
        let mut state = self.state.write().await;
        if state.live_tenant(new.tenant_id).is_none() {
            return Err(CoreError::TenantNotFound);
        }
        let existing = state.identity_with_email(&new.email).map(|i| i.id);
        if let Some(uid) = existing
            && state
                .memberships
                .get(&(uid, new.tenant_id))
                .is_some_and(|m| m.status.is_member())
        {
            return Err(CoreError::AlreadyMember);
        }
        if state.invites.values().any(|inv| {
            inv.tenant_id == new.tenant_id
                && inv.email == new.email
                && inv.status == InviteStatus::Pending
        }) {
            return Err(CoreError::DuplicateInvite);
        }
        let placeholder = match (existing, placeholder) {
            (None, Some(p)) => Some(state.insert_identity(p)?),
            _ => None,
        };
        let invite = Invite {
            id: new_id(),
            tenant_id: new.tenant_id,
            email: new.email,
            invited_by: new.invited_by,
            invited_at: at,
            status: InviteStatus::Pending,
            accepted_at: None,
            role: new.role,
        };
        state.invites.insert(invite.id, invite.clone());
        Ok(InviteCreated {
            invite,
            placeholder,
        })
    }

    async fn invite_by_id(&self, id: Uuid) -> CoreResult<Option<Invite>> {
        Ok(self.state.read().await.invites.get(&id).cloned())
    }

    async fn pending_invites_for_email(&self, email: &str) -> CoreResult<Vec<PendingInvite>> {
        let state = self.state.read().await;
        let mut out: Vec<PendingInvite> = state
            .invites
            .values()
            .filter(|inv| inv.email == email && inv.status == InviteStatus::Pending)
            .filter_map(|inv| {
                state.live_tenant(inv.tenant_id).map(|t| PendingInvite {
                    invite: inv.clone(),
                    tenant_name: t.name.clone(),
                })
            })
            .collect();
        out.sort_by(|a, b| a.invite.invited_at.cmp(&b.invite.invited_at));
        Ok(out)
    }

    async fn accept_invite(
        &self,
        invite_id: Uuid,
        identity: &Identity,
        at: DateTime<Utc>,
    ) -> CoreResult<InviteAccepted> {
        let mut state = self.state.write().await;
        let invite = state
            .invites
            .get(&invite_id)
            .cloned()
            .ok_or(CoreError::InviteNotFound)?;
        if invite.status != InviteStatus::Pending {
            return Err(CoreError::InviteNotPending(invite.status));
        }
        let tenant_name = state
            .live_tenant(invite.tenant_id)
            .map(|t| t.name.clone())
            .ok_or(CoreError::TenantNotFound)?;
        let key = (identity.id, invite.tenant_id);
        if state
            .memberships
            .get(&key)
            .is_some_and(|m| m.status.is_member())
        {
            return Err(CoreError::AlreadyMember);
        }
        let membership = Membership {
            user_id: identity.id,
            tenant_id: invite.tenant_id,
            status: MembershipStatus::Accepted,
            role: invite.role,
            invited_by: Some(invite.invited_by),
            started_at: at,
            last_login_at: None,
            email: identity.email.clone(),
            name: identity.display_name(),
            active: true,
            enabled: BTreeMap::new(),
        };
        state.memberships.insert(key, membership.clone());
        state.invites.remove(&invite_id);
        Ok(InviteAccepted {
            membership,
            tenant_name,
        })
    }

    async fn decline_invite(&self, invite_id: Uuid) -> CoreResult<Invite> {
        let mut state = self.state.write().await;
        let invite = state
            .invites
            .get_mut(&invite_id)
            .ok_or(CoreError::InviteNotFound)?;
        if invite.status != InviteStatus::Pending {
            return Err(CoreError::InviteNotPending(invite.status));
        }
        invite.status = InviteStatus::Declined;
        Ok(invite.clone())
    }
}

#[async_trait]
impl CodeStore for MemoryStore {
    async fn replace_code(&self, code: VerificationCode) -> CoreResult<()> {
        let mut state = self.state.write().await;
        state
            .codes
            .retain(|_, c| !(c.email == code.email && c.purpose == code.purpose));
        state.codes.insert(code.id, code);
        Ok(())
    }

    async fn live_code(
        &self,
        email: &str,
        purpose: CodePurpose,
        now: DateTime<Utc>,
    ) -> CoreResult<Option<VerificationCode>> {
        Ok(self
            .state
            .read()
            .await
            .codes
            .values()
            .filter(|c| c.email == email && c.purpose == purpose && c.is_live(now))
            .max_by_key(|c| c.created_at)
            .cloned())
    }

    async fn record_failed_attempt(&self, id: Uuid) -> CoreResult<i32> {
        let mut state = self.state.write().await;
        let code = state.codes.get_mut(&id).ok_or(CoreError::InvalidCode)?;
        code.attempts += 1;
        Ok(code.attempts)
    }

    async fn consume_code(&self, id: Uuid) -> CoreResult<bool> {
        let mut state = self.state.write().await;
        match state.codes.get_mut(&id) {
            Some(code) if !code.verified => {
                code.verified = true;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn delete_code(&self, id: Uuid) -> CoreResult<()> {
        self.state.write().await.codes.remove(&id);
        Ok(())
    }

    async fn purge_expired_codes(&self, now: DateTime<Utc>) -> CoreResult<u64> {
        let mut state = self.state.write().await;
        let before = state.codes.len();
        state.codes.retain(|_, c| c.expires_at > now);
        Ok((before - state.codes.len()) as u64)
    }
}

#[async_trait]
impl ActionStore for MemoryStore {
    async fn insert_action(&self, new: NewAction) -> CoreResult<Action> {
        let action = Action {
            id: new_id(),
            kind: new.kind,
            collection: new.collection,
            read_type: new.read_type,
            user_id: new.user_id,
            tenant_id: new.tenant_id,
            count: new.count,
            host: new.host,
            doc_id: new.doc_id,
            created: new.created,
            removed: new.removed,
        };
        self.state
            .write()
            .await
            .actions
            .insert(action.id, action.clone());
        Ok(action)
    }

    async fn action_by_id(&self, id: Uuid) -> CoreResult<Option<Action>> {
        Ok(self.state.read().await.actions.get(&id).cloned())
    }

    async fn list_actions(
        &self,
        filter: &ActionFilter,
        page: Pagination,
    ) -> CoreResult<Page<Action>> {
        let state = self.state.read().await;
        let mut hits: Vec<&Action> = state.actions.values().filter(|a| filter.matches(a)).collect();
        hits.sort_by(|a, b| b.created.cmp(&a.created).then(b.id.cmp(&a.id)));
        let items = hits
            .iter()
            .skip(page.offset() as usize)
            .take(page.limit as usize)
            .map(|a| (*a).clone())
            .collect();
        Ok(Page::new(items, hits.len() as u64, page))
    }

    async fn update_action(&self, id: Uuid, patch: &ActionPatch) -> CoreResult<Action> {
        let mut state = self.state.write().await;
        let action = state.actions.get_mut(&id).ok_or(CoreError::ActionNotFound)?;
        patch.apply(action);
        Ok(action.clone())
    }

    async fn delete_action(&self, id: Uuid) -> CoreResult<()> {
        self.state
            .write()
            .await
            .actions
            .remove(&id)
            .map(|_| ())
            .ok_or(CoreError::ActionNotFound)
    }

    async fn delete_all_actions(&self) -> CoreResult<u64> {
        let mut state = self.state.write().await;
        let n = state.actions.len() as u64;
        state.actions.clear();
        Ok(n)
    }

    async fn aggregate_actions(&self, query: &AggregateQuery) -> CoreResult<Vec<BillingGroup>> {
        let state = self.state.read().await;
        let mut groups: BTreeMap<String, (i64, i64)> = BTreeMap::new();
        for action in state.actions.values().filter(|a| query.matches(a)) {
            let slot = groups
                .entry(query.group_by.value_of(action).to_string())
                .or_default();
            slot.0 = slot
                .0
                .checked_add(query.sum.value_of(action))
                .ok_or(CoreError::SumOutOfRange)?;
            slot.1 += 1;
        }
        Ok(groups
            .into_iter()
            .map(|(key, (total_sum, document_count))| BillingGroup {
                key,
                total_sum,
                document_count,
            })
            .collect())
    }

    async fn distinct_action_values(&self, field: DistinctField) -> CoreResult<Vec<String>> {
        let state = self.state.read().await;
        let values: BTreeSet<&str> = state
            .actions
            .values()
            .filter(|a| !a.removed)
            .map(|a| field.value_of(a))
            .collect();
        Ok(values.into_iter().map(str::to_owned).collect())
    }
}

#[async_trait]
impl TeamStore for MemoryStore {
    async fn create_team(
        &self,
        new: NewTeam,
        creator: &Identity,
        at: DateTime<Utc>,
    ) -> CoreResult<Team> {
        let mut state = self.state.write().await;
        let team = Team {
            id: new_id(),
            name: new.name,
            description: new.description,
            created_by: creator.id,
            created_at: at,
            removed: false,
            members: Vec::new(),
        };
        state.teams.insert(team.id, team.clone());
        state
            .team_members
            .insert((team.id, creator.id), (TenantRole::Admin, at));
        Ok(state.team_view(&team))
    }

    async fn teams_for_user(&self, user_id: Uuid) -> CoreResult<Vec<Team>> {
        let state = self.state.read().await;
        let mut teams: Vec<Team> = state
            .team_members
            .keys()
            .filter(|(_, uid)| *uid == user_id)
            .filter_map(|(team_id, _)| state.teams.get(team_id).filter(|t| !t.removed))
            .map(|t| state.team_view(t))
            .collect();
        teams.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(teams)
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn ping(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_identity(email: &str, role: PlatformRole) -> NewIdentity {
        NewIdentity {
            email: email.into(),
            username: None,
            first_name: None,
            last_name: None,
            time_zone: None,
            password_hash: "x".into(),
            email_verified: true,
            platform_role: role,
            must_rotate_password: false,
            created_by: None,
        }
    }

    #[tokio::test]
    async fn duplicate_email_conflicts() {
        let store = MemoryStore::new();
        store
            .create_identity(new_identity("a@b.co", PlatformRole::None))
            .await
            .unwrap();
        let err = store
            .create_identity(new_identity("a@b.co", PlatformRole::None))
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::EmailInUse));
    }

    #[tokio::test]
    async fn members_are_derived_from_the_ledger() {
        let store = MemoryStore::new();
        let owner = store
            .create_identity(new_identity("o@b.co", PlatformRole::None))
            .await
            .unwrap();
        let tenant = store
            .create_tenant(
                NewTenant {
                    name: "Acme".into(),
                    description: None,
                },
                &owner,
                Utc::now(),
            )
            .await
            .unwrap();
        store
            .set_member_active(tenant.id, owner.id, false)
            .await
            .unwrap();
        let tenant = store.tenant_by_id(tenant.id).await.unwrap().unwrap();
        assert_eq!(tenant.members.len(), 1);
        assert!(!tenant.members[0].active);
    }

    #[tokio::test]
    async fn consume_is_single_shot() {
        let store = MemoryStore::new();
        let now = Utc::now();
        let code = VerificationCode {
            id: new_id(),
            email: "a@b.co".into(),
            code_hash: "h".into(),
            purpose: CodePurpose::Signup,
            password_hash: None,
            created_at: now,
            expires_at: now + CodePurpose::Signup.ttl(),
            verified: false,
            attempts: 0,
        };
        let id = code.id;
        store.replace_code(code).await.unwrap();
        assert!(store.consume_code(id).await.unwrap());
        assert!(!store.consume_code(id).await.unwrap());
        assert!(
            store
                .live_code("a@b.co", CodePurpose::Signup, now)
                .await
                .unwrap()
                .is_none()
        );
    }
}
