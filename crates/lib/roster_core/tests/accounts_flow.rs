//! Signup, verification, login and password reset against the in-memory
//! store, reading codes back out of the outbox.

use chrono::{Duration, Utc};
use roster_core::CoreError;
use roster_core::accounts::{self, Signup, SignupOutcome};
use roster_core::auth::password::hash_password;
use roster_core::mailer::OutboxMailer;
use roster_core::models::tenant::TenantRole;
use roster_core::models::identity::{NewIdentity, PlatformRole};
use roster_core::store::{IdentityStore, MemoryStore};
use roster_core::tenancy::{self, InviteRequest};

fn signup(email: &str, password: &str) -> Signup {
    Signup {
        email: email.into(),
        password: password.into(),
        first_name: Some("Ada".into()),
        ..Default::default()
    }
}

#[tokio::test]
async fn signup_verify_login() {
    let store = MemoryStore::new();
    let mailer = OutboxMailer::new();
    let now = Utc::now();

    let outcome = accounts::signup(&store, &mailer, signup("Ada@Example.com", "password123"), now)
        .await
        .unwrap();
    let SignupOutcome::Created(identity) = outcome else {
        panic!("expected a new identity");
    };
    assert_eq!(identity.email, "ada@example.com");
    assert!(!identity.email_verified);

    let code = mailer.last_code_for("ada@example.com").unwrap();
    let verified = accounts::validate_email(&store, "ada@example.com", &code, now)
        .await
        .unwrap();
    assert!(verified.email_verified);

    // Codes are single use.
    let again = accounts::validate_email(&store, "ada@example.com", &code, now).await;
    assert!(matches!(again, Err(CoreError::InvalidCode)));

    let logged_in = accounts::login(&store, "ADA@example.com", "password123", now)
        .await
        .unwrap();
    assert_eq!(logged_in.id, identity.id);
    let wrong = accounts::login(&store, "ada@example.com", "password124", now).await;
    assert!(matches!(wrong, Err(CoreError::InvalidCredentials)));
    let unknown = accounts::login(&store, "nobody@example.com", "password123", now).await;
    assert!(matches!(unknown, Err(CoreError::InvalidCredentials)));
}

#[tokio::test]
async fn duplicate_signups_conflict() {
    let store = MemoryStore::new();
    let mailer = OutboxMailer::new();
    let now = Utc::now();
    accounts::signup(&store, &mailer, signup("a@b.co", "password123"), now)
        .await
        .unwrap();
    let res = accounts::signup(&store, &mailer, signup("A@B.CO", "password123"), now).await;
    assert!(matches!(res, Err(CoreError::EmailInUse)));

    let named = Signup {
        username: Some("Ada".into()),
        ..signup("c@d.co", "password123")
    };
    accounts::signup(&store, &mailer, named.clone(), now)
        .await
        .unwrap();
    let clash = Signup {
        email: "e@f.co".into(),
        username: Some("ada".into()),
        ..named
    };
    let res = accounts::signup(&store, &mailer, clash, now).await;
    assert!(matches!(res, Err(CoreError::UsernameInUse)));
}

#[tokio::test]
async fn signup_validates_input() {
    let store = MemoryStore::new();
    let mailer = OutboxMailer::new();
    let res = accounts::signup(&store, &mailer, signup("not-an-email", "password123"), Utc::now()).await;
    assert!(matches!(res, Err(CoreError::Validation(_))));
    let res = accounts::signup(&store, &mailer, signup("a@b.co", "short"), Utc::now()).await;
    assert!(matches!(res, Err(CoreError::Validation(_))));
    assert!(mailer.sent().is_empty());
}

#[tokio::test]
async fn signup_code_is_kept_when_mail_fails() {
    let store = MemoryStore::new();
    let now = Utc::now();
    let res = accounts::signup(
        &store,
        &OutboxMailer::failing(),
        signup("a@b.co", "password123"),
        now,
    )
    .await;
    assert!(matches!(res, Err(CoreError::Mail(_))));
    assert!(store.identity_by_email("a@b.co").await.unwrap().is_some());

    // The user can still get a fresh code.
    let mailer = OutboxMailer::new();
    accounts::resend_verification(&store, &mailer, "a@b.co", now)
        .await
        .unwrap();
    assert!(mailer.last_code_for("a@b.co").is_some());
}

#[tokio::test]
async fn expired_signup_code_is_rejected() {
    let store = MemoryStore::new();
    let mailer = OutboxMailer::new();
    let t = Utc::now();
    accounts::signup(&store, &mailer, signup("a@b.co", "password123"), t)
        .await
        .unwrap();
    let code = mailer.last_code_for("a@b.co").unwrap();
    let late = t + Duration::minutes(10) + Duration::seconds(1);
    let res = accounts::validate_email(&store, "a@b.co", &code, late).await;
    assert!(matches!(res, Err(CoreError::InvalidCode)));
}

#[tokio::test]
async fn placeholder_activation_applies_the_password_after_verification() {
    let store = MemoryStore::new();
    let mailer = OutboxMailer::new();
    let now = Utc::now();

    let admin = match accounts::signup(&store, &mailer, signup("admin@acme.io", "password123"), now)
        .await
        .unwrap()
    {
        SignupOutcome::Created(identity) => identity,
        SignupOutcome::PendingActivation(_) => panic!("admin is not a placeholder"),
    };
    let tenant = tenancy::create_tenant(&store, &admin, "Acme", None, now)
        .await
        .unwrap();
    tenancy::invite_member(
        &store,
        &mailer,
        "http://app.test",
        &admin,
        InviteRequest {
            tenant_id: tenant.id,
            email: "new@acme.io".into(),
            role: TenantRole::Member,
        },
        now,
    )
    .await
    .unwrap();

    // An invited address looks exactly like an unknown one.
    let res = accounts::login(&store, "new@acme.io", "anything-at-all", now).await;
    assert!(matches!(res, Err(CoreError::InvalidCredentials)));
    let res = accounts::login(&store, "nobody@acme.io", "anything-at-all", now).await;
    assert!(matches!(res, Err(CoreError::InvalidCredentials)));

    let outcome = accounts::signup(&store, &mailer, signup("new@acme.io", "chosen-pass"), now)
        .await
        .unwrap();
    assert!(matches!(outcome, SignupOutcome::PendingActivation(_)));
    // Not applied until the mailbox is proven.
    let res = accounts::login(&store, "new@acme.io", "chosen-pass", now).await;
    assert!(matches!(res, Err(CoreError::InvalidCredentials)));

    let code = mailer.last_code_for("new@acme.io").unwrap();
    let identity = accounts::validate_email(&store, "new@acme.io", &code, now)
        .await
        .unwrap();
    assert!(identity.email_verified);
    assert!(!identity.must_rotate_password);
    accounts::login(&store, "new@acme.io", "chosen-pass", now)
        .await
        .unwrap();
}

#[tokio::test]
async fn password_reset_round_trip() {
    let store = MemoryStore::new();
    let mailer = OutboxMailer::new();
    let now = Utc::now();
    accounts::signup(&store, &mailer, signup("a@b.co", "password123"), now)
        .await
        .unwrap();

    accounts::forgot_password(&store, &mailer, "a@b.co", now)
        .await
        .unwrap();
    let code = mailer.last_code_for("a@b.co").unwrap();
    accounts::reset_password(&store, "a@b.co", &code, "new-password", now)
        .await
        .unwrap();

    let identity = accounts::login(&store, "a@b.co", "new-password", now)
        .await
        .unwrap();
    assert!(identity.email_verified);
    let old = accounts::login(&store, "a@b.co", "password123", now).await;
    assert!(matches!(old, Err(CoreError::InvalidCredentials)));
}

#[tokio::test]
async fn rotation_is_only_reported_after_a_password_match() {
    let store = MemoryStore::new();
    store
        .create_identity(NewIdentity {
            email: "stale@acme.io".into(),
            username: None,
            first_name: None,
            last_name: None,
            time_zone: None,
            password_hash: hash_password("known-pass").unwrap(),
            email_verified: true,
            platform_role: PlatformRole::None,
            must_rotate_password: true,
            created_by: None,
        })
        .await
        .unwrap();

    let res = accounts::login(&store, "stale@acme.io", "wrong-pass", Utc::now()).await;
    assert!(matches!(res, Err(CoreError::InvalidCredentials)));
    let res = accounts::login(&store, "stale@acme.io", "known-pass", Utc::now()).await;
    assert!(matches!(res, Err(CoreError::PasswordRotationRequired)));
}

#[tokio::test]
async fn unknown_emails_do_not_leak() {
    let store = MemoryStore::new();
    let mailer = OutboxMailer::new();
    accounts::forgot_password(&store, &mailer, "ghost@b.co", Utc::now())
        .await
        .unwrap();
    accounts::resend_verification(&store, &mailer, "ghost@b.co", Utc::now())
        .await
        .unwrap();
    assert!(mailer.sent().is_empty());
}

#[tokio::test]
async fn me_lists_memberships() {
    let store = MemoryStore::new();
    let mailer = OutboxMailer::new();
    let now = Utc::now();
    let SignupOutcome::Created(identity) =
        accounts::signup(&store, &mailer, signup("a@b.co", "password123"), now)
            .await
            .unwrap()
    else {
        panic!("expected a new identity");
    };
    tenancy::create_tenant(&store, &identity, "Acme", Some("widgets"), now)
        .await
        .unwrap();

    let profile = accounts::me(&store, identity.id).await.unwrap();
    assert_eq!(profile.identity.id, identity.id);
    assert_eq!(profile.tenants.len(), 1);
    assert_eq!(profile.tenants[0].tenant.description.as_deref(), Some("widgets"));
    assert_eq!(profile.tenants[0].membership.role, TenantRole::Admin);
}
