//! Tenant ("company") and membership handlers.

use axum::extract::State;
use axum::http::StatusCode;
use axum::{Extension, Json};
use chrono::Utc;
use roster_core::CoreError;
use roster_core::models::tenant::TenantRole;
use roster_core::tenancy;

use crate::AppState;
use crate::error::{AppError, AppResult};
use crate::extract::{ApiJson, ApiPath, parse_id};
use crate::middleware::auth::AuthenticatedUser;
use crate::models::{
    AcceptInviteResponse, CompanyDto, CreateCompanyRequest, Envelope, InviteDto, InviteRequest,
    MemberDto, MyCompanyDto, PermissionsResponse, RemoveMemberRequest, RemoveMemberResponse,
    RoleRequest, StatusRequest,
};

fn parse_role(raw: &str) -> AppResult<TenantRole> {
    TenantRole::parse(raw).ok_or_else(|| AppError::validation(format!("Unknown role: {raw}")))
}

/// `POST /api/companies`: the caller becomes the company's admin.
pub async fn create_company_handler(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    ApiJson(body): ApiJson<CreateCompanyRequest>,
) -> AppResult<(StatusCode, Json<Envelope<CompanyDto>>)> {
    let tenant = tenancy::create_tenant(
        state.store.as_ref(),
        &user.identity,
        &body.name,
        body.description.as_deref(),
        Utc::now(),
    )
    .await?;
    Ok((StatusCode::CREATED, Json(Envelope::ok(CompanyDto::from(&tenant)))))
}

/// `GET /api/companies/my-companies`
pub async fn my_companies_handler(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
) -> AppResult<Json<Envelope<Vec<MyCompanyDto>>>> {
    let tenants = tenancy::my_tenants(state.store.as_ref(), &user.identity).await?;
    Ok(Json(Envelope::ok(
        tenants.iter().map(MyCompanyDto::from).collect(),
    )))
}

/// `GET /api/companies/{id}`
pub async fn get_company_handler(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    ApiPath(id): ApiPath<String>,
) -> AppResult<Json<Envelope<CompanyDto>>> {
    let id = parse_id(&id, CoreError::TenantNotFound)?;
    let tenant = tenancy::get_tenant(state.store.as_ref(), &user.identity, id).await?;
    Ok(Json(Envelope::ok(CompanyDto::from(&tenant))))
}

/// `GET /api/companies/{id}/members`
pub async fn list_members_handler(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    ApiPath(id): ApiPath<String>,
) -> AppResult<Json<Envelope<Vec<MemberDto>>>> {
    let id = parse_id(&id, CoreError::TenantNotFound)?;
    let members = tenancy::list_members(state.store.as_ref(), &user.identity, id).await?;
    Ok(Json(Envelope::ok(members.iter().map(MemberDto::from).collect())))
}

/// `GET /api/companies/{id}/permissions`
pub async fn permissions_handler(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    ApiPath(id): ApiPath<String>,
) -> AppResult<Json<Envelope<PermissionsResponse>>> {
    let id = parse_id(&id, CoreError::TenantNotFound)?;
    let (role, permissions) =
        tenancy::permissions_for(state.store.as_ref(), &user.identity, id).await?;
    Ok(Json(Envelope::ok(PermissionsResponse {
        role: role.as_str().to_string(),
        permissions,
    })))
}

/// `POST /api/companies/invite`: `{companyId, email, role}`; role defaults
/// to `member`.
pub async fn invite_handler(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    ApiJson(body): ApiJson<InviteRequest>,
) -> AppResult<(StatusCode, Json<Envelope<InviteDto>>)> {
    let tenant_id = parse_id(&body.company_id, CoreError::TenantNotFound)?;
    let role = match body.role.as_deref() {
        Some(raw) => parse_role(raw)?,
        None => TenantRole::Member,
    };
    let invite = tenancy::invite_member(
        state.store.as_ref(),
        state.mailer.as_ref(),
        &state.config.app_url,
        &user.identity,
        tenancy::InviteRequest {
            tenant_id,
            email: body.email,
            role,
        },
        Utc::now(),
    )
    .await?;
    Ok((StatusCode::CREATED, Json(Envelope::ok(InviteDto::from(&invite)))))
}

/// `GET /api/companies/invites/pending`: invites addressed to the caller.
pub async fn pending_invites_handler(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
) -> AppResult<Json<Envelope<Vec<InviteDto>>>> {
    let invites = tenancy::pending_invites(state.store.as_ref(), &user.identity).await?;
    Ok(Json(Envelope::ok(invites.iter().map(InviteDto::from).collect())))
}

/// `POST /api/companies/invite/{id}/accept`: bearer token optional.
pub async fn accept_invite_handler(
    State(state): State<AppState>,
    user: Option<Extension<AuthenticatedUser>>,
    ApiPath(id): ApiPath<String>,
) -> AppResult<Json<Envelope<AcceptInviteResponse>>> {
    let id = parse_id(&id, CoreError::InviteNotFound)?;
    let actor = user.as_ref().map(|Extension(u)| &u.identity);
    let accepted = tenancy::accept_invite(
        state.store.as_ref(),
        actor,
        id,
        state.config.allow_anonymous_invite_accept,
        Utc::now(),
    )
    .await?;
    Ok(Json(Envelope::ok(AcceptInviteResponse::from(&accepted))))
}

/// `POST /api/companies/invite/{id}/decline`: bearer token optional.
pub async fn decline_invite_handler(
    State(state): State<AppState>,
    user: Option<Extension<AuthenticatedUser>>,
    ApiPath(id): ApiPath<String>,
) -> AppResult<Json<Envelope<InviteDto>>> {
    let id = parse_id(&id, CoreError::InviteNotFound)?;
    let actor = user.as_ref().map(|Extension(u)| &u.identity);
    let invite = tenancy::decline_invite(
        state.store.as_ref(),
        actor,
        id,
        state.config.allow_anonymous_invite_accept,
    )
    .await?;
    Ok(Json(Envelope::ok(InviteDto::from(&invite))))
}

/// `PATCH /api/companies/{id}/members/{uid}/role`: `{role}`
pub async fn update_member_role_handler(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    ApiPath((id, uid)): ApiPath<(String, String)>,
    ApiJson(body): ApiJson<RoleRequest>,
) -> AppResult<Json<Envelope<MemberDto>>> {
    let id = parse_id(&id, CoreError::TenantNotFound)?;
    let uid = parse_id(&uid, CoreError::MemberNotFound)?;
    let role = parse_role(&body.role)?;
    let entry =
        tenancy::update_member_role(state.store.as_ref(), &user.identity, id, uid, role).await?;
    Ok(Json(Envelope::ok(MemberDto::from(&entry.as_member()))))
}

/// `PATCH /api/companies/{id}/members/{uid}/status`: `{active}`
pub async fn set_member_status_handler(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    ApiPath((id, uid)): ApiPath<(String, String)>,
    ApiJson(body): ApiJson<StatusRequest>,
) -> AppResult<Json<Envelope<MemberDto>>> {
    let id = parse_id(&id, CoreError::TenantNotFound)?;
    let uid = parse_id(&uid, CoreError::MemberNotFound)?;
    let entry =
        tenancy::set_member_active(state.store.as_ref(), &user.identity, id, uid, body.active)
            .await?;
    Ok(Json(Envelope::ok(MemberDto::from(&entry.as_member()))))
}

/// `POST /api/companies/{id}/members/delete`: `{userId}`
pub async fn remove_member_handler(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    ApiPath(id): ApiPath<String>,
    ApiJson(body): ApiJson<RemoveMemberRequest>,
) -> AppResult<Json<Envelope<RemoveMemberResponse>>> {
    let id = parse_id(&id, CoreError::TenantNotFound)?;
    let uid = parse_id(&body.user_id, CoreError::MemberNotFound)?;
    let removal = tenancy::remove_member(state.store.as_ref(), &user.identity, id, uid).await?;
    Ok(Json(Envelope::ok(RemoveMemberResponse {
        invites_deleted: removal.invites_deleted,
        identity_purged: removal.identity_purged,
    })))
}
