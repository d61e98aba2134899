//! Platform administration handlers. Every route requires super-admin; the
//! check lives in `roster_core::platform`.

use axum::extract::State;
use axum::http::StatusCode;
use axum::{Extension, Json};
use roster_core::CoreError;
use roster_core::models::Pagination;
use roster_core::models::identity::{IdentityPatch, PlatformRole};
use roster_core::platform::{self, NewUser};

use crate::AppState;
use crate::error::{AppError, AppResult};
use crate::extract::{ApiJson, ApiPath, ApiQuery, parse_id};
use crate::middleware::auth::AuthenticatedUser;
use crate::models::{
    CreateUserRequest, Envelope, MessageResponse, PageQuery, RoleRequest, UpdateUserRequest,
    UserDto, UserListResponse,
};

fn parse_role(raw: &str) -> AppResult<PlatformRole> {
    PlatformRole::parse(raw).ok_or_else(|| AppError::validation(format!("Unknown role: {raw}")))
}

/// `POST /api/admin/users`
pub async fn create_user_handler(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    ApiJson(body): ApiJson<CreateUserRequest>,
) -> AppResult<(StatusCode, Json<Envelope<UserDto>>)> {
    let role = body.role.as_deref().map(parse_role).transpose()?;
    let created = platform::create_user(
        state.store.as_ref(),
        &user.identity,
        NewUser {
            email: body.email,
            username: body.username,
            password: body.password,
            first_name: body.first_name,
            last_name: body.last_name,
            role: role.unwrap_or_default(),
            email_verified: body.email_verified.unwrap_or(false),
        },
    )
    .await?;
    Ok((StatusCode::CREATED, Json(Envelope::ok(UserDto::from(&created)))))
}

/// `GET /api/admin/users?page=&limit=`
pub async fn list_users_handler(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    ApiQuery(query): ApiQuery<PageQuery>,
) -> AppResult<Json<Envelope<UserListResponse>>> {
    let defaults = Pagination::default();
    let page = Pagination::new(
        query.page.unwrap_or(defaults.page),
        query.limit.unwrap_or(defaults.limit),
    );
    let result = platform::list_users(state.store.as_ref(), &user.identity, page).await?;
    Ok(Json(Envelope::ok(UserListResponse {
        users: result.items.iter().map(UserDto::from).collect(),
        total: result.total,
        page: result.page,
        limit: result.limit,
        pages: result.pages(),
    })))
}

/// `GET /api/admin/users/{uid}`
pub async fn get_user_handler(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    ApiPath(uid): ApiPath<String>,
) -> AppResult<Json<Envelope<UserDto>>> {
    let uid = parse_id(&uid, CoreError::UserNotFound)?;
    let found = platform::get_user(state.store.as_ref(), &user.identity, uid).await?;
    Ok(Json(Envelope::ok(UserDto::from(&found))))
}

/// `PATCH /api/admin/users/{uid}`: `{role?, emailVerified?}`
pub async fn update_user_handler(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    ApiPath(uid): ApiPath<String>,
    ApiJson(body): ApiJson<UpdateUserRequest>,
) -> AppResult<Json<Envelope<UserDto>>> {
    let uid = parse_id(&uid, CoreError::UserNotFound)?;
    let patch = IdentityPatch {
        platform_role: body.role.as_deref().map(parse_role).transpose()?,
        email_verified: body.email_verified,
    };
    let updated = platform::update_user(state.store.as_ref(), &user.identity, uid, patch).await?;
    Ok(Json(Envelope::ok(UserDto::from(&updated))))
}

/// `PATCH /api/admin/users/{uid}/role`
pub async fn set_role_handler(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    ApiPath(uid): ApiPath<String>,
    ApiJson(body): ApiJson<RoleRequest>,
) -> AppResult<Json<Envelope<UserDto>>> {
    let uid = parse_id(&uid, CoreError::UserNotFound)?;
    let role = parse_role(&body.role)?;
    let updated =
        platform::set_user_role(state.store.as_ref(), &user.identity, uid, role).await?;
    Ok(Json(Envelope::ok(UserDto::from(&updated))))
}

/// `DELETE /api/admin/users/{uid}`: hard delete.
pub async fn delete_user_handler(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    ApiPath(uid): ApiPath<String>,
) -> AppResult<Json<Envelope<MessageResponse>>> {
    let uid = parse_id(&uid, CoreError::UserNotFound)?;
    platform::delete_user(state.store.as_ref(), &user.identity, uid).await?;
    Ok(Json(Envelope::ok(MessageResponse::new("User deleted"))))
}
