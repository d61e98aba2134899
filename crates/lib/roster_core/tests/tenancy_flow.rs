//! Membership lifecycle against the in-memory store.

use chrono::Utc;
use roster_core::CoreError;
use roster_core::auth::password::hash_password;
use roster_core::mailer::OutboxMailer;
use roster_core::models::identity::{Identity, IdentityPatch, NewIdentity, PlatformRole};
use roster_core::models::membership::MembershipStatus;
use roster_core::models::tenant::TenantRole;
use roster_core::platform;
use roster_core::store::{IdentityStore, InviteStore, MemoryStore, TenantStore};
use roster_core::tenancy::{self, InviteRequest};

const APP_URL: &str = "http://app.test";

async fn user(store: &MemoryStore, email: &str, role: PlatformRole) -> Identity {
    store
        .create_identity(NewIdentity {
            email: email.into(),
            username: None,
            first_name: None,
            last_name: None,
            time_zone: None,
            password_hash: hash_password("password123").unwrap(),
            email_verified: true,
            platform_role: role,
            must_rotate_password: false,
            created_by: None,
        })
        .await
        .unwrap()
}

fn invite(tenant_id: uuid::Uuid, email: &str, role: TenantRole) -> InviteRequest {
    InviteRequest {
        tenant_id,
        email: email.into(),
        role,
    }
}

#[tokio::test]
async fn creating_a_tenant_makes_the_creator_its_only_admin() {
    let store = MemoryStore::new();
    let u = user(&store, "u@acme.io", PlatformRole::None).await;

    let tenant = tenancy::create_tenant(&store, &u, "Acme", None, Utc::now())
        .await
        .unwrap();

    assert_eq!(tenant.members.len(), 1);
    assert_eq!(tenant.members[0].user_id, u.id);
    assert_eq!(tenant.members[0].role, TenantRole::Admin);
    let entry = store.membership(u.id, tenant.id).await.unwrap().unwrap();
    assert_eq!(entry.role, TenantRole::Admin);
    assert_eq!(entry.status, MembershipStatus::Accepted);
}

#[tokio::test]
async fn blank_tenant_names_are_rejected() {
    let store = MemoryStore::new();
    let u = user(&store, "u@acme.io", PlatformRole::None).await;
    let res = tenancy::create_tenant(&store, &u, "   ", None, Utc::now()).await;
    assert!(matches!(res, Err(CoreError::Validation(_))));
}

#[tokio::test]
async fn invite_then_accept_creates_one_creator_entry() {
    let store = MemoryStore::new();
    let mailer = OutboxMailer::new();
    let admin = user(&store, "admin@acme.io", PlatformRole::None).await;
    let tenant = tenancy::create_tenant(&store, &admin, "Acme", None, Utc::now())
        .await
        .unwrap();

    let inv = tenancy::invite_member(
        &store,
        &mailer,
        APP_URL,
        &admin,
        invite(tenant.id, "X@Y.com", TenantRole::Creator),
        Utc::now(),
    )
    .await
    .unwrap();
    assert_eq!(inv.email, "x@y.com");
    assert_eq!(mailer.sent().len(), 1);
    assert!(mailer.sent()[0].body.contains(&format!("{APP_URL}/invite/{}", inv.id)));

    let placeholder = store.identity_by_email("x@y.com").await.unwrap().unwrap();
    assert!(placeholder.must_rotate_password);
    assert!(!placeholder.email_verified);

    let accepted = tenancy::accept_invite(&store, None, inv.id, true, Utc::now())
        .await
        .unwrap();
    assert_eq!(accepted.tenant_name, "Acme");
    assert_eq!(accepted.membership.user_id, placeholder.id);
    assert_eq!(accepted.membership.role, TenantRole::Creator);
    assert_eq!(accepted.membership.status, MembershipStatus::Accepted);

    assert!(store.invite_by_id(inv.id).await.unwrap().is_none());
    assert!(store.pending_invites_for_email("x@y.com").await.unwrap().is_empty());
    let members = tenancy::list_members(&store, &admin, tenant.id).await.unwrap();
    assert_eq!(members.len(), 2);
}

#[tokio::test]
async fn second_pending_invite_for_the_same_pair_conflicts() {
    let store = MemoryStore::new();
    let mailer = OutboxMailer::new();
    let admin = user(&store, "admin@acme.io", PlatformRole::None).await;
    let tenant = tenancy::create_tenant(&store, &admin, "Acme", None, Utc::now())
        .await
        .unwrap();

    let req = invite(tenant.id, "x@y.com", TenantRole::Member);
    tenancy::invite_member(&store, &mailer, APP_URL, &admin, req.clone(), Utc::now())
        .await
        .unwrap();
    let again =
        tenancy::invite_member(&store, &mailer, APP_URL, &admin, req, Utc::now()).await;
    assert!(matches!(again, Err(CoreError::DuplicateInvite)));
}

#[tokio::test]
async fn invites_cannot_propose_admin_or_come_from_non_admins() {
    let store = MemoryStore::new();
    let mailer = OutboxMailer::new();
    let admin = user(&store, "admin@acme.io", PlatformRole::None).await;
    let outsider = user(&store, "out@acme.io", PlatformRole::SuperAdmin).await;
    let tenant = tenancy::create_tenant(&store, &admin, "Acme", None, Utc::now())
        .await
        .unwrap();

    let res = tenancy::invite_member(
        &store,
        &mailer,
        APP_URL,
        &admin,
        invite(tenant.id, "x@y.com", TenantRole::Admin),
        Utc::now(),
    )
    .await;
    assert!(matches!(res, Err(CoreError::Validation(_))));

    // Platform role does not grant tenant-scoped rights.
    let res = tenancy::invite_member(
        &store,
        &mailer,
        APP_URL,
        &outsider,
        invite(tenant.id, "x@y.com", TenantRole::Member),
        Utc::now(),
    )
    .await;
    assert!(matches!(res, Err(CoreError::Forbidden(_))));
    assert!(mailer.sent().is_empty());
}

#[tokio::test]
async fn inviting_an_existing_member_conflicts() {
    let store = MemoryStore::new();
    let mailer = OutboxMailer::new();
    let admin = user(&store, "admin@acme.io", PlatformRole::None).await;
    let tenant = tenancy::create_tenant(&store, &admin, "Acme", None, Utc::now())
        .await
        .unwrap();
    let res = tenancy::invite_member(
        &store,
        &mailer,
        APP_URL,
        &admin,
        invite(tenant.id, "ADMIN@acme.io", TenantRole::Member),
        Utc::now(),
    )
    .await;
    assert!(matches!(res, Err(CoreError::AlreadyMember)));
}

#[tokio::test]
async fn invite_survives_mail_failure() {
    let store = MemoryStore::new();
    let admin = user(&store, "admin@acme.io", PlatformRole::None).await;
    let tenant = tenancy::create_tenant(&store, &admin, "Acme", None, Utc::now())
        .await
        .unwrap();
    let res = tenancy::invite_member(
        &store,
        &OutboxMailer::failing(),
        APP_URL,
        &admin,
        invite(tenant.id, "x@y.com", TenantRole::Member),
        Utc::now(),
    )
    .await;
    assert!(matches!(res, Err(CoreError::Mail(_))));
    assert_eq!(store.pending_invites_for_email("x@y.com").await.unwrap().len(), 1);
}

#[tokio::test]
async fn accept_checks_ownership() {
    let store = MemoryStore::new();
    let mailer = OutboxMailer::new();
    let admin = user(&store, "admin@acme.io", PlatformRole::None).await;
    let other = user(&store, "other@acme.io", PlatformRole::None).await;
    let invitee = user(&store, "x@y.com", PlatformRole::None).await;
    let tenant = tenancy::create_tenant(&store, &admin, "Acme", None, Utc::now())
        .await
        .unwrap();
    let inv = tenancy::invite_member(
        &store,
        &mailer,
        APP_URL,
        &admin,
        invite(tenant.id, "x@y.com", TenantRole::Member),
        Utc::now(),
    )
    .await
    .unwrap();

    let res = tenancy::accept_invite(&store, Some(&other), inv.id, true, Utc::now()).await;
    assert!(matches!(res, Err(CoreError::InviteMismatch)));
    let res = tenancy::accept_invite(&store, None, inv.id, false, Utc::now()).await;
    assert!(matches!(res, Err(CoreError::AuthenticationRequired)));

    let accepted = tenancy::accept_invite(&store, Some(&invitee), inv.id, false, Utc::now())
        .await
        .unwrap();
    assert_eq!(accepted.membership.user_id, invitee.id);
    let res = tenancy::accept_invite(&store, Some(&invitee), inv.id, false, Utc::now()).await;
    assert!(matches!(res, Err(CoreError::InviteNotFound)));
}

#[tokio::test]
async fn declined_invites_are_kept_but_not_pending() {
    let store = MemoryStore::new();
    let mailer = OutboxMailer::new();
    let admin = user(&store, "admin@acme.io", PlatformRole::None).await;
    let invitee = user(&store, "x@y.com", PlatformRole::None).await;
    let tenant = tenancy::create_tenant(&store, &admin, "Acme", None, Utc::now())
        .await
        .unwrap();
    let inv = tenancy::invite_member(
        &store,
        &mailer,
        APP_URL,
        &admin,
        invite(tenant.id, "x@y.com", TenantRole::Member),
        Utc::now(),
    )
    .await
    .unwrap();
    assert_eq!(tenancy::pending_invites(&store, &invitee).await.unwrap().len(), 1);

    tenancy::decline_invite(&store, Some(&invitee), inv.id, false)
        .await
        .unwrap();
    assert!(tenancy::pending_invites(&store, &invitee).await.unwrap().is_empty());
    assert!(store.invite_by_id(inv.id).await.unwrap().is_some());
    let res = tenancy::accept_invite(&store, Some(&invitee), inv.id, false, Utc::now()).await;
    assert!(matches!(res, Err(CoreError::InviteNotPending(_))));
}

#[tokio::test]
async fn removing_a_placeholder_member_purges_it() {
    let store = MemoryStore::new();
    let mailer = OutboxMailer::new();
    let admin = user(&store, "admin@acme.io", PlatformRole::None).await;
    let tenant = tenancy::create_tenant(&store, &admin, "Acme", None, Utc::now())
        .await
        .unwrap();
    let inv = tenancy::invite_member(
        &store,
        &mailer,
        APP_URL,
        &admin,
        invite(tenant.id, "x@y.com", TenantRole::Member),
        Utc::now(),
    )
    .await
    .unwrap();
    let accepted = tenancy::accept_invite(&store, None, inv.id, true, Utc::now())
        .await
        .unwrap();

    let removal = tenancy::remove_member(&store, &admin, tenant.id, accepted.membership.user_id)
        .await
        .unwrap();
    assert!(removal.identity_purged);
    assert!(store.identity_by_email("x@y.com").await.unwrap().is_none());
    let tenant = tenancy::get_tenant(&store, &admin, tenant.id).await.unwrap();
    assert_eq!(tenant.members.len(), 1);
}

#[tokio::test]
async fn admins_cannot_demote_or_remove_themselves() {
    let store = MemoryStore::new();
    let admin = user(&store, "admin@acme.io", PlatformRole::None).await;
    let tenant = tenancy::create_tenant(&store, &admin, "Acme", None, Utc::now())
        .await
        .unwrap();

    let res =
        tenancy::update_member_role(&store, &admin, tenant.id, admin.id, TenantRole::Member).await;
    assert!(matches!(res, Err(CoreError::SelfDemotion)));
    let res = tenancy::remove_member(&store, &admin, tenant.id, admin.id).await;
    assert!(matches!(res, Err(CoreError::SelfRemoval)));
    let res = tenancy::set_member_active(&store, &admin, tenant.id, admin.id, false).await;
    assert!(matches!(res, Err(CoreError::SelfRemoval)));
}

#[tokio::test]
async fn role_changes_and_deactivation_flow_through_the_ledger() {
    let store = MemoryStore::new();
    let admin = user(&store, "admin@acme.io", PlatformRole::None).await;
    let bob = user(&store, "bob@acme.io", PlatformRole::None).await;
    let tenant = tenancy::create_tenant(&store, &admin, "Acme", None, Utc::now())
        .await
        .unwrap();
    let inv = tenancy::invite_member(
        &store,
        &OutboxMailer::new(),
        APP_URL,
        &admin,
        invite(tenant.id, "bob@acme.io", TenantRole::Member),
        Utc::now(),
    )
    .await
    .unwrap();
    tenancy::accept_invite(&store, Some(&bob), inv.id, false, Utc::now())
        .await
        .unwrap();

    tenancy::update_member_role(&store, &admin, tenant.id, bob.id, TenantRole::Creator)
        .await
        .unwrap();
    let (role, perms) = tenancy::permissions_for(&store, &bob, tenant.id).await.unwrap();
    assert_eq!(role, TenantRole::Creator);
    assert!(perms.can_access_creation_tools);
    assert!(!perms.can_invite);

    // Bob has no management rights.
    let res = tenancy::remove_member(&store, &bob, tenant.id, admin.id).await;
    assert!(matches!(res, Err(CoreError::Forbidden(_))));

    tenancy::set_member_active(&store, &admin, tenant.id, bob.id, false)
        .await
        .unwrap();
    assert_eq!(tenancy::role_in(&store, bob.id, tenant.id).await.unwrap(), None);
    let members = tenancy::list_members(&store, &admin, tenant.id).await.unwrap();
    let shown = members.iter().find(|m| m.user_id == bob.id).unwrap();
    assert!(!shown.active);
    assert_eq!(tenancy::my_tenants(&store, &bob).await.unwrap().len(), 1);
}

#[tokio::test]
async fn the_last_super_admin_cannot_be_removed() {
    let store = MemoryStore::new();
    let root = user(&store, "root@acme.io", PlatformRole::SuperAdmin).await;

    let res = platform::set_user_role(&store, &root, root.id, PlatformRole::None).await;
    assert!(matches!(res, Err(CoreError::LastSuperAdmin)));
    let res = platform::delete_user(&store, &root, root.id).await;
    assert!(matches!(res, Err(CoreError::LastSuperAdmin)));

    let second = user(&store, "second@acme.io", PlatformRole::SuperAdmin).await;
    platform::set_user_role(&store, &root, second.id, PlatformRole::None)
        .await
        .unwrap();
    platform::set_user_role(&store, &root, second.id, PlatformRole::SuperAdmin)
        .await
        .unwrap();
    platform::delete_user(&store, &root, second.id).await.unwrap();
    assert_eq!(store.count_super_admins().await.unwrap(), 1);
}

#[tokio::test]
async fn platform_admin_requires_super_admin() {
    let store = MemoryStore::new();
    let plain = user(&store, "plain@acme.io", PlatformRole::None).await;
    let res = platform::update_user(
        &store,
        &plain,
        plain.id,
        IdentityPatch {
            platform_role: Some(PlatformRole::SuperAdmin),
            email_verified: None,
        },
    )
    .await;
    assert!(matches!(res, Err(CoreError::SuperAdminRequired)));

    let root = user(&store, "root@acme.io", PlatformRole::SuperAdmin).await;
    let res = platform::update_user(&store, &root, plain.id, IdentityPatch::default()).await;
    assert!(matches!(res, Err(CoreError::NoUpdates)));
}

#[tokio::test]
async fn bootstrap_is_idempotent() {
    let store = MemoryStore::new();
    let (first, created) = platform::bootstrap_super_admin(&store, "Root@Acme.io", "password123", None)
        .await
        .unwrap();
    assert!(created);
    assert!(first.is_super_admin());
    assert!(first.email_verified);

    let (again, created) = platform::bootstrap_super_admin(&store, "root@acme.io", "ignored!!", None)
        .await
        .unwrap();
    assert!(!created);
    assert_eq!(again.id, first.id);
    assert_eq!(store.count_super_admins().await.unwrap(), 1);
}
