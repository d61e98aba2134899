//! Team creation and listing against the in-memory store.

use chrono::{Duration, Utc};
use roster_core::CoreError;
use roster_core::auth::password::hash_password;
use roster_core::models::identity::{Identity, NewIdentity, PlatformRole};
use roster_core::models::tenant::TenantRole;
use roster_core::store::{IdentityStore, MemoryStore};
use roster_core::teams;

async fn user(store: &MemoryStore, email: &str) -> Identity {
    store
        .create_identity(NewIdentity {
            email: email.into(),
            username: Some(email.split('@').next().unwrap_or_default().into()),
            first_name: Some("Ada".into()),
            last_name: Some("Lovelace".into()),
            time_zone: None,
            password_hash: hash_password("password123").unwrap(),
            email_verified: true,
            platform_role: PlatformRole::None,
            must_rotate_password: false,
            created_by: None,
        })
        .await
        .unwrap()
}

#[tokio::test]
async fn creator_is_the_team_admin() {
    let store = MemoryStore::new();
    let ada = user(&store, "ada@acme.io").await;

    let team = teams::create_team(&store, &ada, "  Core  ", Some("  "), Utc::now())
        .await
        .unwrap();
    assert_eq!(team.name, "Core");
    assert_eq!(team.description, None);
    assert_eq!(team.created_by, ada.id);
    assert_eq!(team.members.len(), 1);
    let me = team.member(ada.id).unwrap();
    assert_eq!(me.role, TenantRole::Admin);
    assert_eq!(me.email, "ada@acme.io");
    assert_eq!(me.username.as_deref(), Some("ada"));
}

#[tokio::test]
async fn team_name_is_validated() {
    let store = MemoryStore::new();
    let ada = user(&store, "ada@acme.io").await;

    let res = teams::create_team(&store, &ada, "   ", None, Utc::now()).await;
    assert!(matches!(res, Err(CoreError::Validation(_))));
    let long = "x".repeat(121);
    let res = teams::create_team(&store, &ada, &long, None, Utc::now()).await;
    assert!(matches!(res, Err(CoreError::Validation(_))));
}

#[tokio::test]
async fn my_teams_lists_only_the_callers_teams_oldest_first() {
    let store = MemoryStore::new();
    let ada = user(&store, "ada@acme.io").await;
    let bob = user(&store, "bob@acme.io").await;
    let now = Utc::now();

    assert!(teams::my_teams(&store, &ada).await.unwrap().is_empty());

    teams::create_team(&store, &ada, "Second", None, now)
        .await
        .unwrap();
    teams::create_team(&store, &ada, "First", Some("platform"), now - Duration::hours(1))
        .await
        .unwrap();
    teams::create_team(&store, &bob, "Other", None, now)
        .await
        .unwrap();

    let mine = teams::my_teams(&store, &ada).await.unwrap();
    let names: Vec<&str> = mine.iter().map(|t| t.name.as_str()).collect();
    assert_eq!(names, ["First", "Second"]);
    assert_eq!(mine[0].description.as_deref(), Some("platform"));
    assert!(mine.iter().all(|t| t.member(ada.id).is_some()));
}

#[tokio::test]
async fn deleted_identities_leave_their_teams() {
    let store = MemoryStore::new();
    let ada = user(&store, "ada@acme.io").await;
    teams::create_team(&store, &ada, "Core", None, Utc::now())
        .await
        .unwrap();

    store.delete_identity(ada.id).await.unwrap();
    assert!(teams::my_teams(&store, &ada).await.unwrap().is_empty());
}
