//! Authentication middleware: Bearer token extraction, JWT verification and
//! identity lookup.

use axum::http::HeaderMap;
use axum::http::header::AUTHORIZATION;
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use roster_core::CoreError;
use roster_core::accounts::current_identity;
use roster_core::auth::jwt::TokenError;
use roster_core::models::identity::Identity;
use tracing::debug;

use crate::AppState;
use crate::error::{AppError, AppResult};
use crate::services::auth::{TokenClaims, verify_access_token};

/// Stored in request extensions once the bearer token checks out.
///
/// `identity` is loaded fresh on every request, so role changes and deletions
/// take effect before the token expires.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub claims: TokenClaims,
    pub identity: Identity,
}

/// Resolve the caller from the `Authorization` header. No header is `None`;
/// a header that does not verify is an error.
async fn authenticate(state: &AppState, headers: &HeaderMap) -> AppResult<Option<AuthenticatedUser>> {
    let Some(header) = headers.get(AUTHORIZATION) else {
        return Ok(None);
    };
    let token = header
        .to_str()
        .ok()
        .and_then(|h| h.strip_prefix("Bearer "))
        .ok_or(CoreError::Token(TokenError::Invalid))?;

    let claims = verify_access_token(token, state.config.jwt_secret.as_bytes())
        .map_err(CoreError::from)?;

    let identity = match current_identity(state.store.as_ref(), claims.sub).await {
        Ok(identity) => identity,
        Err(CoreError::UserNotFound) => {
            debug!(user_id = %claims.sub, "token subject no longer exists");
            return Err(CoreError::Token(TokenError::Invalid).into());
        }
        Err(e) => return Err(e.into()),
    };
    Ok(Some(AuthenticatedUser { claims, identity }))
}

/// Axum middleware: rejects the request unless it carries a valid bearer
/// token, and injects [`AuthenticatedUser`].
pub async fn require_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let user = authenticate(&state, request.headers())
        .await?
        .ok_or(CoreError::AuthenticationRequired)?;
    request.extensions_mut().insert(user);
    Ok(next.run(request).await)
}

/// Axum middleware: like [`require_auth`] but lets anonymous requests
/// through without the extension.
pub async fn optional_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    if let Some(user) = authenticate(&state, request.headers()).await? {
        request.extensions_mut().insert(user);
    }
    Ok(next.run(request).await)
}

/// Axum middleware for the platform administration routes. Runs after
/// [`require_auth`].
pub async fn require_super_admin(request: Request, next: Next) -> Result<Response, AppError> {
    let allowed = request
        .extensions()
        .get::<AuthenticatedUser>()
        .is_some_and(|user| user.identity.is_super_admin());
    if !allowed {
        return Err(CoreError::SuperAdminRequired.into());
    }
    Ok(next.run(request).await)
}
