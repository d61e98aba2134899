//! Account request handlers.

use axum::extract::State;
use axum::http::StatusCode;
use axum::{Extension, Json};
use chrono::Utc;
use roster_core::accounts::{self, Signup, SignupOutcome};

use crate::AppState;
use crate::error::AppResult;
use crate::extract::ApiJson;
use crate::middleware::auth::AuthenticatedUser;
use crate::models::{
    AuthResponse, EmailRequest, Envelope, LoginRequest, MeResponse, MessageResponse,
    ResetPasswordRequest, SignupRequest, SignupResponse, UserDto, ValidateEmailRequest,
};
use crate::services::auth::{issue_token, token_response};

/// `POST /api/auth/signup`: register and mail a verification code.
pub async fn signup_handler(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<SignupRequest>,
) -> AppResult<(StatusCode, Json<Envelope<SignupResponse>>)> {
    let outcome = accounts::signup(
        state.store.as_ref(),
        state.mailer.as_ref(),
        Signup {
            email: body.email,
            username: body.username,
            password: body.password,
            first_name: body.first_name,
            last_name: body.last_name,
            time_zone: body.time_zone,
        },
        Utc::now(),
    )
    .await?;
    let resp = match outcome {
        SignupOutcome::Created(identity) => SignupResponse {
            token: Some(issue_token(&state, &identity)?),
            user: UserDto::from(&identity),
            activation_pending: false,
        },
        SignupOutcome::PendingActivation(identity) => SignupResponse {
            token: None,
            user: UserDto::from(&identity),
            activation_pending: true,
        },
    };
    Ok((StatusCode::CREATED, Json(Envelope::ok(resp))))
}

/// `POST /api/auth/login`: authenticate with email + password.
pub async fn login_handler(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<LoginRequest>,
) -> AppResult<Json<Envelope<AuthResponse>>> {
    let identity =
        accounts::login(state.store.as_ref(), &body.email, &body.password, Utc::now()).await?;
    Ok(Json(Envelope::ok(token_response(&state, &identity)?)))
}

/// `POST /api/auth/validate-email`: consume a signup code.
pub async fn validate_email_handler(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<ValidateEmailRequest>,
) -> AppResult<Json<Envelope<AuthResponse>>> {
    let identity =
        accounts::validate_email(state.store.as_ref(), &body.email, &body.code, Utc::now())
            .await?;
    Ok(Json(Envelope::ok(token_response(&state, &identity)?)))
}

/// `POST /api/auth/resend-verification`
pub async fn resend_verification_handler(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<EmailRequest>,
) -> AppResult<Json<Envelope<MessageResponse>>> {
    accounts::resend_verification(
        state.store.as_ref(),
        state.mailer.as_ref(),
        &body.email,
        Utc::now(),
    )
    .await?;
    Ok(Json(Envelope::ok(MessageResponse::new(
        "If the account exists, a new code has been sent",
    ))))
}

/// `POST /api/auth/forgot-password`: same answer whether or not the email
/// is known.
pub async fn forgot_password_handler(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<EmailRequest>,
) -> AppResult<Json<Envelope<MessageResponse>>> {
    accounts::forgot_password(
        state.store.as_ref(),
        state.mailer.as_ref(),
        &body.email,
        Utc::now(),
    )
    .await?;
    Ok(Json(Envelope::ok(MessageResponse::new(
        "If the account exists, a reset code has been sent",
    ))))
}

/// `POST /api/auth/reset-password`
pub async fn reset_password_handler(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<ResetPasswordRequest>,
) -> AppResult<Json<Envelope<MessageResponse>>> {
    accounts::reset_password(
        state.store.as_ref(),
        &body.email,
        &body.code,
        &body.new_password,
        Utc::now(),
    )
    .await?;
    Ok(Json(Envelope::ok(MessageResponse::new("Password updated"))))
}

/// `GET /api/auth/me`
pub async fn me_handler(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
) -> AppResult<Json<Envelope<MeResponse>>> {
    let profile = accounts::me(state.store.as_ref(), user.identity.id).await?;
    Ok(Json(Envelope::ok(MeResponse::from(&profile))))
}
