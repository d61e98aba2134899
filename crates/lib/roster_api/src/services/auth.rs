//! Token issuance for the auth handlers.

use roster_core::CoreError;
use roster_core::auth::jwt::generate_access_token;
use roster_core::models::identity::Identity;

use crate::AppState;
use crate::error::AppResult;
use crate::models::{AuthResponse, UserDto};

pub use roster_core::auth::jwt::{TokenClaims, resolve_jwt_secret, verify_access_token};

/// Sign a bearer token for `identity` with the configured secret and TTL.
pub fn issue_token(state: &AppState, identity: &Identity) -> AppResult<String> {
    let token = generate_access_token(
        identity.id,
        &identity.email,
        identity.platform_role,
        state.config.jwt_secret.as_bytes(),
        state.config.jwt_ttl_secs,
    )
    .map_err(CoreError::from)?;
    Ok(token)
}

/// `{token, user}` for a freshly authenticated identity.
pub fn token_response(state: &AppState, identity: &Identity) -> AppResult<AuthResponse> {
    Ok(AuthResponse {
        token: issue_token(state, identity)?,
        user: UserDto::from(identity),
    })
}
