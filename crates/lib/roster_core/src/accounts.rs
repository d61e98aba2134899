//! Self-service account flows: signup, login, email verification and
//! password reset.

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::auth::password::{hash_password, validate_password, verify_password};
use crate::codes;
use crate::error::{CoreError, CoreResult};
use crate::mailer::{Mailer, password_reset_email, validation_code_email};
use crate::models::identity::{
    Identity, NewIdentity, PlatformRole, fold_email, fold_username, is_valid_email,
};
use crate::models::verification::CodePurpose;
use crate::store::{MemberTenant, Store};

/// Signup input.
#[derive(Debug, Clone, Default)]
pub struct Signup {
    pub email: String,
    pub username: Option<String>,
    pub password: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub time_zone: Option<String>,
}

/// What a signup did.
#[derive(Debug, Clone)]
pub enum SignupOutcome {
    /// A new, unverified identity.
    Created(Identity),
    /// The email belonged to an invite placeholder. The chosen password is
    /// applied once the mailed code is verified.
    PendingActivation(Identity),
}

/// The caller's identity and the tenants they belong to.
#[derive(Debug, Clone)]
pub struct Profile {
    pub identity: Identity,
    pub tenants: Vec<MemberTenant>,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Validate and fold a submitted email.
pub fn normalize_email(email: &str) -> CoreResult<String> {
    if !is_valid_email(email) {
        return Err(CoreError::Validation("A valid email is required".into()));
    }
    Ok(fold_email(email))
}

/// Live identity for an authenticated user id.
pub async fn current_identity(store: &dyn Store, user_id: Uuid) -> CoreResult<Identity> {
    store
        .identity_by_id(user_id)
        .await?
        .filter(|i| !i.removed)
        .ok_or(CoreError::UserNotFound)
}

async fn send_code(
    mailer: &dyn Mailer,
    identity: &Identity,
    purpose: CodePurpose,
    code: &str,
) -> CoreResult<()> {
    let name = identity.display_name();
    let email = match purpose {
        CodePurpose::Signup => validation_code_email(&identity.email, &name, code),
        CodePurpose::PasswordReset => password_reset_email(&identity.email, &name, code),
    };
    mailer.send(email).await.map_err(|e| {
        warn!(user_id = %identity.id, purpose = purpose.as_str(), error = %e, "code email not delivered");
        CoreError::from(e)
    })
}

/// Register a new identity and mail a signup code.
pub async fn signup(
    store: &dyn Store,
    mailer: &dyn Mailer,
    input: Signup,
    now: DateTime<Utc>,
) -> CoreResult<SignupOutcome> {
    let email = normalize_email(&input.email)?;
    validate_password(&input.password)?;
    let username = non_empty(input.username).map(|u| fold_username(&u));

    if let Some(existing) = store.identity_by_email(&email).await? {
        if !(existing.must_rotate_password && !existing.email_verified) {
            return Err(CoreError::EmailInUse);
        }
        // Invite placeholder: hold the password until the mailbox is proven.
        let password_hash = hash_password(&input.password)?;
        let code = codes::issue(store, &email, CodePurpose::Signup, Some(password_hash), now).await?;
        info!(user_id = %existing.id, "placeholder activation requested");
        send_code(mailer, &existing, CodePurpose::Signup, &code).await?;
        return Ok(SignupOutcome::PendingActivation(existing));
    }
    if let Some(username) = &username
        && store.identity_by_username(username).await?.is_some()
    {
        return Err(CoreError::UsernameInUse);
    }

    let identity = store
        .create_identity(NewIdentity {
            email: email.clone(),
            username,
            first_name: non_empty(input.first_name),
            last_name: non_empty(input.last_name),
            time_zone: non_empty(input.time_zone),
            password_hash: hash_password(&input.password)?,
            email_verified: false,
            platform_role: PlatformRole::None,
            must_rotate_password: false,
            created_by: None,
        })
        .await?;
    info!(user_id = %identity.id, "identity created");

    let code = codes::issue(store, &email, CodePurpose::Signup, None, now).await?;
    send_code(mailer, &identity, CodePurpose::Signup, &code).await?;
    Ok(SignupOutcome::Created(identity))
}

/// Check credentials. Every failure that could reveal whether the account
/// exists is reported as `InvalidCredentials`.
pub async fn login(
    store: &dyn Store,
    email: &str,
    password: &str,
    now: DateTime<Utc>,
) -> CoreResult<Identity> {
    let identity = store
        .identity_by_email(&fold_email(email))
        .await?
        .filter(|i| !i.removed)
        .ok_or(CoreError::InvalidCredentials)?;
    if !verify_password(password, &identity.password_hash)? {
        debug!(user_id = %identity.id, "password mismatch");
        return Err(CoreError::InvalidCredentials);
    }
    // Only a caller who already knows the password learns about the flag.
    if identity.must_rotate_password {
        return Err(CoreError::PasswordRotationRequired);
    }
    store.touch_last_login(identity.id, now).await?;
    info!(user_id = %identity.id, "login");
    Ok(identity)
}

/// Consume a signup code and mark the email verified. A password held by a
/// placeholder activation is applied here.
pub async fn validate_email(
    store: &dyn Store,
    email: &str,
    code: &str,
    now: DateTime<Utc>,
) -> CoreResult<Identity> {
    let email = normalize_email(email)?;
    let redeemed = codes::redeem(store, &email, CodePurpose::Signup, code, now).await?;
    let identity = store
        .identity_by_email(&email)
        .await?
        .ok_or(CoreError::UserNotFound)?;
    let activated = redeemed.password_hash.is_some();
    store.mark_verified(identity.id, redeemed.password_hash).await?;
    info!(user_id = %identity.id, activated, "email verified");
    current_identity(store, identity.id).await
}

/// Reissue the signup code. Unknown emails succeed silently.
pub async fn resend_verification(
    store: &dyn Store,
    mailer: &dyn Mailer,
    email: &str,
    now: DateTime<Utc>,
) -> CoreResult<()> {
    let email = normalize_email(email)?;
    let Some(identity) = store.identity_by_email(&email).await? else {
        debug!("resend requested for unknown email");
        return Ok(());
    };
    if identity.email_verified {
        return Err(CoreError::Validation("Email is already verified".into()));
    }
    // Keep a pending placeholder activation password across resends.
    let held = store
        .live_code(&email, CodePurpose::Signup, now)
        .await?
        .and_then(|c| c.password_hash);
    let code = codes::issue(store, &email, CodePurpose::Signup, held, now).await?;
    send_code(mailer, &identity, CodePurpose::Signup, &code).await
}

/// Mail a password reset code. Unknown emails succeed silently.
pub async fn forgot_password(
    store: &dyn Store,
    mailer: &dyn Mailer,
    email: &str,
    now: DateTime<Utc>,
) -> CoreResult<()> {
    let email = normalize_email(email)?;
    let Some(identity) = store
        .identity_by_email(&email)
        .await?
        .filter(|i| !i.removed)
    else {
        debug!("password reset requested for unknown email");
        return Ok(());
    };
    let code = codes::issue(store, &email, CodePurpose::PasswordReset, None, now).await?;
    info!(user_id = %identity.id, "password reset code issued");
    send_code(mailer, &identity, CodePurpose::PasswordReset, &code).await
}

/// Consume a reset code and set a new password. Also clears the rotation
/// flag and marks the email verified.
pub async fn reset_password(
    store: &dyn Store,
    email: &str,
    code: &str,
    new_password: &str,
    now: DateTime<Utc>,
) -> CoreResult<()> {
    let email = normalize_email(email)?;
    validate_password(new_password)?;
    codes::redeem(store, &email, CodePurpose::PasswordReset, code, now).await?;
    let identity = store
        .identity_by_email(&email)
        .await?
        .ok_or(CoreError::UserNotFound)?;
    store
        .mark_verified(identity.id, Some(hash_password(new_password)?))
        .await?;
    info!(user_id = %identity.id, "password reset");
    Ok(())
}

pub async fn me(store: &dyn Store, user_id: Uuid) -> CoreResult<Profile> {
    let identity = current_identity(store, user_id).await?;
    let tenants = store.tenants_for_user(user_id).await?;
    Ok(Profile { identity, tenants })
}
