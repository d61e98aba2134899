//! Usage ledger recording, access control and billing aggregation.

use chrono::Utc;
use roster_core::CoreError;
use roster_core::auth::password::hash_password;
use roster_core::models::Pagination;
use roster_core::models::action::{
    ActionFilter, ActionPatch, AggregateQuery, BillingGroup, BillingSummary, DistinctField,
    GroupField, MAX_ACTION_COUNT, SumField,
};
use roster_core::models::identity::{Identity, NewIdentity, PlatformRole};
use roster_core::store::{IdentityStore, MemoryStore};
use roster_core::tenancy;
use roster_core::usage::{self, RecordAction};

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

fn event(tenant: &str, count: i64, created: i64) -> RecordAction {
    RecordAction {
        kind: "read".into(),
        collection: "docs".into(),
        tenant_id: tenant.into(),
        count: Some(count),
        created: Some(created),
        ..Default::default()
    }
}

fn range(tenant: Option<&str>) -> AggregateQuery {
    AggregateQuery {
        from: 1_000,
        to: 2_000,
        tenant_id: tenant.map(str::to_owned),
        group_by: GroupField::Tenant,
        sum: SumField::Count,
    }
}

async fn seeded() -> (MemoryStore, Identity) {
    let store = MemoryStore::new();
    let root = user(&store, "root@acme.io", PlatformRole::SuperAdmin).await;
    let now = Utc::now();
    for count in [3, 5, 7] {
        usage::record(&store, &root, event("T1", count, 1_500), now)
            .await
            .unwrap();
    }
    usage::record(&store, &root, event("T2", 4, 1_999), now)
        .await
        .unwrap();
    // Outside the half-open range.
    usage::record(&store, &root, event("T1", 100, 2_000), now)
        .await
        .unwrap();
    (store, root)
}

#[tokio::test]
async fn aggregation_for_one_tenant() {
    let (store, root) = seeded().await;
    let summary = usage::aggregate(&store, &root, &range(Some("T1"))).await.unwrap();
    assert_eq!(
        summary,
        BillingSummary::Tenant(BillingGroup {
            key: "T1".into(),
            total_sum: 15,
            document_count: 3,
        })
    );
}

#[tokio::test]
async fn aggregation_across_tenants() {
    let (store, root) = seeded().await;
    let summary = usage::aggregate(&store, &root, &range(None)).await.unwrap();
    let BillingSummary::All(groups) = summary else {
        panic!("expected every group");
    };
    assert_eq!(
        groups,
        vec![
            BillingGroup {
                key: "T1".into(),
                total_sum: 15,
                document_count: 3,
            },
            BillingGroup {
                key: "T2".into(),
                total_sum: 4,
                document_count: 1,
            },
        ]
    );
}

#[tokio::test]
async fn tenant_without_data_aggregates_to_zero() {
    let (store, root) = seeded().await;
    let summary = usage::aggregate(&store, &root, &range(Some("T3"))).await.unwrap();
    assert_eq!(
        summary,
        BillingSummary::Tenant(BillingGroup {
            key: "T3".into(),
            total_sum: 0,
            document_count: 0,
        })
    );
}

#[tokio::test]
async fn removed_actions_are_not_billed() {
    let (store, root) = seeded().await;
    let page = usage::list(
        &store,
        &root,
        &ActionFilter {
            tenant_id: Some("T2".into()),
            ..Default::default()
        },
        Pagination::default(),
    )
    .await
    .unwrap();
    let id = page.items[0].id;
    usage::update(
        &store,
        &root,
        id,
        &ActionPatch {
            removed: Some(true),
            ..Default::default()
        },
    )
    .await
    .unwrap();
    let summary = usage::aggregate(&store, &root, &range(None)).await.unwrap();
    let BillingSummary::All(groups) = summary else {
        panic!("expected every group");
    };
    assert_eq!(groups.len(), 1);
    assert_eq!(
        usage::distinct(&store, &root, DistinctField::Tenant)
            .await
            .unwrap(),
        vec!["T1".to_string()]
    );
}

#[tokio::test]
async fn empty_range_is_rejected() {
    let (store, root) = seeded().await;
    let query = AggregateQuery {
        from: 2_000,
        to: 2_000,
        ..range(None)
    };
    let res = usage::aggregate(&store, &root, &query).await;
    assert!(matches!(res, Err(CoreError::Validation(_))));
}

#[tokio::test]
async fn listing_is_newest_first_and_paginated() {
    let (store, root) = seeded().await;
    let page = usage::list(&store, &root, &ActionFilter::default(), Pagination::new(1, 2))
        .await
        .unwrap();
    assert_eq!(page.total, 5);
    assert_eq!(page.items.len(), 2);
    assert_eq!(page.items[0].created, 2_000);
    assert_eq!(page.items[1].created, 1_999);
}

#[tokio::test]
async fn members_record_into_their_own_tenant_only() {
    let store = MemoryStore::new();
    let admin = user(&store, "admin@acme.io", PlatformRole::None).await;
    let stranger = user(&store, "x@y.com", PlatformRole::None).await;
    let tenant = tenancy::create_tenant(&store, &admin, "Acme", None, Utc::now())
        .await
        .unwrap();
    let tid = tenant.id.to_string();

    let recorded = usage::record(
        &store,
        &admin,
        RecordAction {
            kind: "write".into(),
            collection: "docs".into(),
            tenant_id: tid.clone(),
            ..Default::default()
        },
        Utc::now(),
    )
    .await
    .unwrap();
    assert_eq!(recorded.user_id, admin.id.to_string());
    assert_eq!(recorded.read_type, "docChange");
    assert_eq!(recorded.count, 0);

    let res = usage::record(&store, &stranger, event(&tid, 1, 1), Utc::now()).await;
    assert!(matches!(res, Err(CoreError::Forbidden(_))));
    let res = usage::record(
        &store,
        &admin,
        RecordAction {
            user_id: Some(stranger.id.to_string()),
            ..event(&tid, 1, 1)
        },
        Utc::now(),
    )
    .await;
    assert!(matches!(res, Err(CoreError::Forbidden(_))));
    let res = usage::record(&store, &admin, event(&tid, -1, 1), Utc::now()).await;
    assert!(matches!(res, Err(CoreError::Validation(_))));

    // Tenant admins read their own tenant; nobody but super-admins reads everything.
    let filter = ActionFilter {
        tenant_id: Some(tid.clone()),
        ..Default::default()
    };
    assert_eq!(
        usage::list(&store, &admin, &filter, Pagination::default())
            .await
            .unwrap()
            .total,
        1
    );
    let res = usage::list(&store, &stranger, &filter, Pagination::default()).await;
    assert!(matches!(res, Err(CoreError::Forbidden(_))));
    let res = usage::list(&store, &admin, &ActionFilter::default(), Pagination::default()).await;
    assert!(matches!(res, Err(CoreError::SuperAdminRequired)));
    let res = usage::delete_all(&store, &admin).await;
    assert!(matches!(res, Err(CoreError::SuperAdminRequired)));
}

#[tokio::test]
async fn administrative_crud() {
    let (store, root) = seeded().await;
    let page = usage::list(&store, &root, &ActionFilter::default(), Pagination::default())
        .await
        .unwrap();
    let id = page.items[0].id;
    assert_eq!(usage::get(&store, &root, id).await.unwrap().id, id);

    usage::delete(&store, &root, id).await.unwrap();
    assert!(matches!(
        usage::get(&store, &root, id).await,
        Err(CoreError::ActionNotFound)
    ));
    assert_eq!(usage::delete_all(&store, &root).await.unwrap(), 4);
    assert!(
        usage::distinct(&store, &root, DistinctField::Collection)
            .await
            .unwrap()
            .is_empty()
    );
}

#[tokio::test]
async fn listing_range_excludes_its_end() {
    let (store, root) = seeded().await;
    let filter = ActionFilter {
        from: Some(1_000),
        to: Some(2_000),
        ..Default::default()
    };
    let page = usage::list(&store, &root, &filter, Pagination::default())
        .await
        .unwrap();
    assert_eq!(page.total, 4);
    assert!(page.items.iter().all(|a| a.created < 2_000));

    let filter = ActionFilter {
        from: Some(2_000),
        to: Some(2_001),
        ..Default::default()
    };
    let page = usage::list(&store, &root, &filter, Pagination::default())
        .await
        .unwrap();
    assert_eq!(page.total, 1);
    assert_eq!(page.items[0].created, 2_000);
}

#[tokio::test]
async fn oversized_count_is_rejected() {
    let (store, root) = seeded().await;
    let res = usage::record(&store, &root, event("T1", MAX_ACTION_COUNT + 1, 1_500), Utc::now()).await;
    assert!(matches!(res, Err(CoreError::Validation(_))));
    let res = usage::record(&store, &root, event("T1", i64::MAX, 1_500), Utc::now()).await;
    assert!(matches!(res, Err(CoreError::Validation(_))));
}

#[tokio::test]
async fn sum_past_i64_is_an_error_not_a_panic() {
    let store = MemoryStore::new();
    let root = user(&store, "root@acme.io", PlatformRole::SuperAdmin).await;
    let late = i64::MAX / 2 + 1;
    for _ in 0..2 {
        usage::record(&store, &root, event("T1", 1, late), Utc::now())
            .await
            .unwrap();
    }
    let query = AggregateQuery {
        from: 0,
        to: i64::MAX,
        sum: SumField::Created,
        ..range(None)
    };
    let res = usage::aggregate(&store, &root, &query).await;
    assert!(matches!(res, Err(CoreError::SumOutOfRange)));
    let res = usage::aggregate(
        &store,
        &root,
        &AggregateQuery {
            tenant_id: Some("T1".into()),
            ..query
        },
    )
    .await;
    assert!(matches!(res, Err(CoreError::SumOutOfRange)));
}
