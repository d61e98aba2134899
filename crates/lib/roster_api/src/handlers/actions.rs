//! Usage ledger handlers.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::{Extension, Json};
use chrono::Utc;
use roster_core::CoreError;
use roster_core::models::Pagination;
use roster_core::models::action::{
    ActionFilter, ActionPatch, AggregateQuery, BillingSummary, DistinctField, GroupField,
    SumField,
};
use roster_core::usage::{self, RecordAction};

use crate::AppState;
use crate::error::{AppError, AppResult};
use crate::extract::{ApiJson, ApiPath, ApiQuery, parse_id};
use crate::middleware::auth::AuthenticatedUser;
use crate::models::{
    ActionListResponse, ActionsQuery, AggregateResponse, AggregateResult, DeletedResponse,
    Envelope, MessageResponse, Period, RecordActionRequest,
};

/// `POST /api/actions`
pub async fn record_action_handler(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    ApiJson(body): ApiJson<RecordActionRequest>,
) -> AppResult<impl IntoResponse> {
    let action = usage::record(
        state.store.as_ref(),
        &user.identity,
        RecordAction {
            kind: body.kind,
            collection: body.collection,
            read_type: body.read_type,
            user_id: body.uid,
            tenant_id: body.company_id,
            count: body.count,
            host: body.host,
            doc_id: body.doc_id,
            created: body.created,
        },
        Utc::now(),
    )
    .await?;
    Ok((StatusCode::CREATED, Json(Envelope::ok(action))))
}

/// `GET /api/actions`: paginated listing, or billing aggregation with
/// `aggregate=true`.
pub async fn list_actions_handler(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    ApiQuery(query): ApiQuery<ActionsQuery>,
) -> AppResult<Response> {
    if query.aggregate.unwrap_or(false) {
        return aggregate(&state, &user, query).await;
    }
    let defaults = Pagination::default();
    let page = Pagination::new(
        query.page.unwrap_or(defaults.page),
        query.limit.unwrap_or(defaults.limit),
    );
    let filter = ActionFilter {
        user_id: query.uid,
        tenant_id: query.company_id,
        kind: query.kind,
        collection: query.collection,
        removed: query.removed,
        from: query.from_date,
        to: query.to_date,
        since: query.since,
    };
    let result = usage::list(state.store.as_ref(), &user.identity, &filter, page).await?;
    let pages = result.pages();
    Ok(Json(Envelope::ok(ActionListResponse {
        actions: result.items,
        total: result.total,
        page: result.page,
        limit: result.limit,
        pages,
    }))
    .into_response())
}

async fn aggregate(
    state: &AppState,
    user: &AuthenticatedUser,
    query: ActionsQuery,
) -> AppResult<Response> {
    let (Some(from), Some(to)) = (query.from_date, query.to_date) else {
        return Err(AppError::validation(
            "fromDate and toDate are required for aggregation",
        ));
    };
    let group_by = match query.group_by.as_deref() {
        Some(raw) => GroupField::parse(raw)
            .ok_or_else(|| AppError::validation(format!("Unsupported groupBy: {raw}")))?,
        None => GroupField::default(),
    };
    let sum = match query.sum.as_deref() {
        Some(raw) => SumField::parse(raw)
            .ok_or_else(|| AppError::validation(format!("Unsupported sum: {raw}")))?,
        None => SumField::default(),
    };
    let request = AggregateQuery {
        from,
        to,
        tenant_id: query.company_id,
        group_by,
        sum,
    };
    let summary = usage::aggregate(state.store.as_ref(), &user.identity, &request).await?;
    let result = match summary {
        BillingSummary::Tenant(group) => AggregateResult::One(group),
        BillingSummary::All(groups) => AggregateResult::Many(groups),
    };
    Ok(Json(Envelope::ok(AggregateResponse {
        group_by: group_by.wire_name(),
        sum: sum.column(),
        period: Period {
            from_date: from,
            to_date: to,
        },
        result,
    }))
    .into_response())
}

/// `GET /api/actions/companies`
pub async fn distinct_companies_handler(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
) -> AppResult<Json<Envelope<Vec<String>>>> {
    let values =
        usage::distinct(state.store.as_ref(), &user.identity, DistinctField::Tenant).await?;
    Ok(Json(Envelope::ok(values)))
}

/// `GET /api/actions/collections`
pub async fn distinct_collections_handler(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
) -> AppResult<Json<Envelope<Vec<String>>>> {
    let values =
        usage::distinct(state.store.as_ref(), &user.identity, DistinctField::Collection).await?;
    Ok(Json(Envelope::ok(values)))
}

/// `GET /api/actions/{id}`
pub async fn get_action_handler(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    ApiPath(id): ApiPath<String>,
) -> AppResult<impl IntoResponse> {
    let id = parse_id(&id, CoreError::ActionNotFound)?;
    let action = usage::get(state.store.as_ref(), &user.identity, id).await?;
    Ok(Json(Envelope::ok(action)))
}

/// `PUT /api/actions/{id}`: partial update.
pub async fn update_action_handler(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    ApiPath(id): ApiPath<String>,
    ApiJson(patch): ApiJson<ActionPatch>,
) -> AppResult<impl IntoResponse> {
    let id = parse_id(&id, CoreError::ActionNotFound)?;
    let action = usage::update(state.store.as_ref(), &user.identity, id, &patch).await?;
    Ok(Json(Envelope::ok(action)))
}

/// `DELETE /api/actions/{id}`
pub async fn delete_action_handler(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    ApiPath(id): ApiPath<String>,
) -> AppResult<Json<Envelope<MessageResponse>>> {
    let id = parse_id(&id, CoreError::ActionNotFound)?;
    usage::delete(state.store.as_ref(), &user.identity, id).await?;
    Ok(Json(Envelope::ok(MessageResponse::new("Action deleted"))))
}

/// `DELETE /api/actions`: clears the whole ledger.
pub async fn delete_all_actions_handler(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
) -> AppResult<Json<Envelope<DeletedResponse>>> {
    let deleted = usage::delete_all(state.store.as_ref(), &user.identity).await?;
    Ok(Json(Envelope::ok(DeletedResponse { deleted })))
}
