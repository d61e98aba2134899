//! Usage ledger: recording, browsing and billing aggregation.

use chrono::{DateTime, Utc};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{CoreError, CoreResult};
use crate::ids::parse_id;
use crate::models::action::{
    Action, ActionFilter, ActionPatch, AggregateQuery, BillingGroup, BillingSummary,
    DEFAULT_READ_TYPE, DistinctField, MAX_ACTION_COUNT, NewAction,
};
use crate::models::identity::Identity;
use crate::models::tenant::TenantRole;
use crate::models::{Page, Pagination};
use crate::permissions;
use crate::platform::require_super_admin;
use crate::store::Store;
use crate::tenancy::role_in;

/// Recording input; unset fields take their defaults.
#[derive(Debug, Clone, Default)]
pub struct RecordAction {
    pub kind: String,
    pub collection: String,
    pub read_type: Option<String>,
    /// Defaults to the caller.
    pub user_id: Option<String>,
    pub tenant_id: String,
    pub count: Option<i64>,
    pub host: Option<String>,
    pub doc_id: Option<String>,
    /// Epoch millis; defaults to now.
    pub created: Option<i64>,
}

fn check_count(count: Option<i64>) -> CoreResult<()> {
    match count {
        Some(c) if c < 0 => Err(CoreError::Validation("count must not be negative".into())),
        Some(c) if c > MAX_ACTION_COUNT => Err(CoreError::Validation(format!(
            "count must not exceed {MAX_ACTION_COUNT}"
        ))),
        _ => Ok(()),
    }
}

fn require_field(value: &str, name: &str) -> CoreResult<()> {
    if value.trim().is_empty() {
        return Err(CoreError::Validation(format!("{name} is required")));
    }
    Ok(())
}

/// The caller's effective role in a tenant named by its ledger string.
async fn role_in_named(
    store: &dyn Store,
    actor: &Identity,
    tenant: &str,
) -> CoreResult<Option<TenantRole>> {
    match parse_id(tenant) {
        Some(tenant_id) => role_in(store, actor.id, tenant_id).await,
        None => Ok(None),
    }
}

/// Reading the ledger needs super-admin, or `admin` in the named tenant.
async fn authorize_read(store: &dyn Store, actor: &Identity, tenant: Option<&str>) -> CoreResult<()> {
    if actor.is_super_admin() {
        return Ok(());
    }
    let Some(tenant) = tenant else {
        return Err(CoreError::SuperAdminRequired);
    };
    let role = role_in_named(store, actor, tenant).await?;
    permissions::require(role, permissions::can_view_audit_log, "view usage")?;
    Ok(())
}

/// Append an event. Members record into their own tenants; super-admins
/// may record anywhere and on behalf of anyone.
pub async fn record(
    store: &dyn Store,
    actor: &Identity,
    input: RecordAction,
    now: DateTime<Utc>,
) -> CoreResult<Action> {
    require_field(&input.kind, "type")?;
    require_field(&input.collection, "collection")?;
    require_field(&input.tenant_id, "companyId")?;
    check_count(input.count)?;

    let caller = actor.id.to_string();
    if !actor.is_super_admin() {
        if role_in_named(store, actor, &input.tenant_id).await?.is_none() {
            return Err(CoreError::Forbidden("not a member of this company".into()));
        }
        if input.user_id.as_deref().is_some_and(|u| u != caller) {
            return Err(CoreError::Forbidden("cannot record actions for another user".into()));
        }
    }

    let action = store
        .insert_action(NewAction {
            kind: input.kind,
            collection: input.collection,
            read_type: input
                .read_type
                .filter(|r| !r.is_empty())
                .unwrap_or_else(|| DEFAULT_READ_TYPE.to_string()),
            user_id: input.user_id.unwrap_or(caller),
            tenant_id: input.tenant_id,
            count: input.count.unwrap_or(0),
            host: input.host.unwrap_or_default(),
            doc_id: input.doc_id.unwrap_or_default(),
            created: input.created.unwrap_or_else(|| now.timestamp_millis()),
            removed: false,
        })
        .await?;
    debug!(action_id = %action.id, tenant = %action.tenant_id, kind = %action.kind, "action recorded");
    Ok(action)
}

/// Paginated listing, newest first.
pub async fn list(
    store: &dyn Store,
    actor: &Identity,
    filter: &ActionFilter,
    page: Pagination,
) -> CoreResult<Page<Action>> {
    authorize_read(store, actor, filter.tenant_id.as_deref()).await?;
    if let (Some(from), Some(to)) = (filter.from, filter.to)
        && from > to
    {
        return Err(CoreError::Validation("fromDate must not be after toDate".into()));
    }
    store.list_actions(filter, page).await
}

/// Billing aggregation over `[from, to)`.
///
/// With a tenant named the result is that tenant's single group, zero
/// valued when nothing matched. Without one it is every group in range.
pub async fn aggregate(
    store: &dyn Store,
    actor: &Identity,
    query: &AggregateQuery,
) -> CoreResult<BillingSummary> {
    authorize_read(store, actor, query.tenant_id.as_deref()).await?;
    if query.from >= query.to {
        return Err(CoreError::Validation("fromDate must be before toDate".into()));
    }
    let groups = store.aggregate_actions(query).await?;
    summarize(query, groups)
}

/// Fold store groups into the response shape.
pub fn summarize(query: &AggregateQuery, groups: Vec<BillingGroup>) -> CoreResult<BillingSummary> {
    match &query.tenant_id {
        Some(tenant) => {
            let (mut total_sum, mut document_count) = (0i64, 0i64);
            for g in &groups {
                total_sum = total_sum
                    .checked_add(g.total_sum)
                    .ok_or(CoreError::SumOutOfRange)?;
                document_count += g.document_count;
            }
            Ok(BillingSummary::Tenant(BillingGroup {
                key: tenant.clone(),
                total_sum,
                document_count,
            }))
        }
        None => Ok(BillingSummary::All(groups)),
    }
}

/// Sorted distinct values across the whole ledger.
pub async fn distinct(
    store: &dyn Store,
    actor: &Identity,
    field: DistinctField,
) -> CoreResult<Vec<String>> {
    require_super_admin(actor)?;
    store.distinct_action_values(field).await
}

pub async fn get(store: &dyn Store, actor: &Identity, id: Uuid) -> CoreResult<Action> {
    require_super_admin(actor)?;
    store
        .action_by_id(id)
        .await?
        .ok_or(CoreError::ActionNotFound)
}

pub async fn update(
    store: &dyn Store,
    actor: &Identity,
    id: Uuid,
    patch: &ActionPatch,
) -> CoreResult<Action> {
    require_super_admin(actor)?;
    check_count(patch.count)?;
    let action = store.update_action(id, patch).await?;
    info!(action_id = %id, by = %actor.id, "action updated");
    Ok(action)
}

pub async fn delete(store: &dyn Store, actor: &Identity, id: Uuid) -> CoreResult<()> {
    require_super_admin(actor)?;
    store.delete_action(id).await?;
    info!(action_id = %id, by = %actor.id, "action deleted");
    Ok(())
}

pub async fn delete_all(store: &dyn Store, actor: &Identity) -> CoreResult<u64> {
    require_super_admin(actor)?;
    let deleted = store.delete_all_actions().await?;
    info!(deleted, by = %actor.id, "usage ledger cleared");
    Ok(deleted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::action::{GroupField, SumField};

    fn query(tenant: Option<&str>) -> AggregateQuery {
        AggregateQuery {
            from: 0,
            to: 10,
            tenant_id: tenant.map(str::to_owned),
            group_by: GroupField::Tenant,
            sum: SumField::Count,
        }
    }

    #[test]
    fn named_tenant_without_data_is_zero() {
        let summary = summarize(&query(Some("T9")), Vec::new()).unwrap();
        assert_eq!(
            summary,
            BillingSummary::Tenant(BillingGroup {
                key: "T9".into(),
                total_sum: 0,
                document_count: 0,
            })
        );
    }

    #[test]
    fn unnamed_tenant_keeps_groups() {
        let groups = vec![BillingGroup {
            key: "T1".into(),
            total_sum: 4,
            document_count: 2,
        }];
        assert_eq!(
            summarize(&query(None), groups.clone()).unwrap(),
            BillingSummary::All(groups)
        );
    }

    #[test]
    fn tenant_total_past_i64_is_an_error() {
        let group = |key: &str| BillingGroup {
            key: key.into(),
            total_sum: i64::MAX,
            document_count: 1,
        };
        let err = summarize(&query(Some("T1")), vec![group("T1"), group("T1")]).unwrap_err();
        assert!(matches!(err, CoreError::SumOutOfRange));
    }

    #[test]
    fn count_is_bounded() {
        assert!(check_count(None).is_ok());
        assert!(check_count(Some(MAX_ACTION_COUNT)).is_ok());
        assert!(check_count(Some(-1)).is_err());
        assert!(check_count(Some(MAX_ACTION_COUNT + 1)).is_err());
    }
}
