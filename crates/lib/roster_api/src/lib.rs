//! # roster_api
//!
//! HTTP API library for Roster.

pub mod config;
pub mod error;
pub mod extract;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;

use std::sync::Arc;

use axum::Router;
use axum::middleware::{from_fn, from_fn_with_state};
use axum::routing::{get, patch, post};
use roster_core::mailer::Mailer;
use roster_core::store::Store;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::ApiConfig;
use crate::handlers::{actions, admin, auth, companies, health, teams};
use crate::middleware::auth::{optional_auth, require_auth, require_super_admin};

/// Shared application state passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Persistence backend.
    pub store: Arc<dyn Store>,
    /// Outbound mail.
    pub mailer: Arc<dyn Mailer>,
    /// API configuration.
    pub config: ApiConfig,
}

/// Builds the Axum router with all routes and shared state.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Public routes (no auth required)
    let public = Router::new()
        .route(routes::GET_HEALTH, get(health::health_handler))
        .route(routes::POST_AUTH_SIGNUP, post(auth::signup_handler))
        .route(routes::POST_AUTH_LOGIN, post(auth::login_handler))
        .route(
            routes::POST_AUTH_VALIDATE_EMAIL,
            post(auth::validate_email_handler),
        )
        .route(
            routes::POST_AUTH_RESEND_VERIFICATION,
            post(auth::resend_verification_handler),
        )
        .route(
            routes::POST_AUTH_FORGOT_PASSWORD,
            post(auth::forgot_password_handler),
        )
        .route(
            routes::POST_AUTH_RESET_PASSWORD,
            post(auth::reset_password_handler),
        );

    // Invite responses work with or without a bearer token
    let invite_responses = Router::new()
        .route(
            routes::POST_COMPANIES_INVITE_ID_ACCEPT,
            post(companies::accept_invite_handler),
        )
        .route(
            routes::POST_COMPANIES_INVITE_ID_DECLINE,
            post(companies::decline_invite_handler),
        )
        .layer(from_fn_with_state(state.clone(), optional_auth));

    // Protected routes (require auth)
    let protected = Router::new()
        .route(routes::GET_AUTH_ME, get(auth::me_handler))
        .route(routes::POST_COMPANIES, post(companies::create_company_handler))
        .route(
            routes::GET_COMPANIES_MY_COMPANIES,
            get(companies::my_companies_handler),
        )
        .route(routes::POST_COMPANIES_INVITE, post(companies::invite_handler))
        .route(
            routes::GET_COMPANIES_INVITES_PENDING,
            get(companies::pending_invites_handler),
        )
        .route(routes::GET_COMPANIES_ID, get(companies::get_company_handler))
        .route(
            routes::GET_COMPANIES_ID_MEMBERS,
            get(companies::list_members_handler),
        )
        .route(
            routes::GET_COMPANIES_ID_PERMISSIONS,
            get(companies::permissions_handler),
        )
        .route(
            routes::PATCH_COMPANIES_ID_MEMBERS_UID_ROLE,
            patch(companies::update_member_role_handler),
        )
        .route(
            routes::PATCH_COMPANIES_ID_MEMBERS_UID_STATUS,
            patch(companies::set_member_status_handler),
        )
        .route(
            routes::POST_COMPANIES_ID_MEMBERS_DELETE,
            post(companies::remove_member_handler),
        )
        .route(routes::POST_TEAMS, post(teams::create_team_handler))
        .route(routes::GET_TEAMS_MY_TEAMS, get(teams::my_teams_handler))
        .route(
            routes::ACTIONS,
            get(actions::list_actions_handler)
                .post(actions::record_action_handler)
                .delete(actions::delete_all_actions_handler),
        )
        .route(
            routes::GET_ACTIONS_COMPANIES,
            get(actions::distinct_companies_handler),
        )
        .route(
            routes::GET_ACTIONS_COLLECTIONS,
            get(actions::distinct_collections_handler),
        )
        .route(
            routes::ACTIONS_ID,
            get(actions::get_action_handler)
                .put(actions::update_action_handler)
                .delete(actions::delete_action_handler),
        )
        .layer(from_fn_with_state(state.clone(), require_auth));

    // Platform administration (require auth + super-admin)
    let admin = Router::new()
        .route(
            routes::ADMIN_USERS,
            get(admin::list_users_handler).post(admin::create_user_handler),
        )
        .route(
            routes::ADMIN_USERS_UID,
            get(admin::get_user_handler)
                .patch(admin::update_user_handler)
                .delete(admin::delete_user_handler),
        )
        .route(
            routes::PATCH_ADMIN_USERS_UID_ROLE,
            patch(admin::set_role_handler),
        )
        .route_layer(from_fn(require_super_admin))
        .layer(from_fn_with_state(state.clone(), require_auth));

    Router::new()
        .merge(public)
        .merge(invite_responses)
        .merge(protected)
        .merge(admin)
        .fallback(health::not_found_handler)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
