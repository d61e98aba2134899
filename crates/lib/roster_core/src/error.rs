//! Domain error type shared by every Roster service.
//!
//! Each variant belongs to exactly one [`ErrorKind`] and carries a stable,
//! machine-readable code that the HTTP layer returns verbatim.

use thiserror::Error;

use crate::auth::jwt::TokenError;
use crate::mailer::MailError;
use crate::models::invite::InviteStatus;

/// Convenience alias used across the crate.
pub type CoreResult<T> = Result<T, CoreError>;

/// Error taxonomy. The API layer maps each kind to an HTTP status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    Authentication,
    Authorization,
    NotFound,
    Conflict,
    InvariantViolation,
    Upstream,
}

/// Domain errors.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("No updates provided")]
    NoUpdates,

    #[error("Authentication required")]
    AuthenticationRequired,

    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error(transparent)]
    Token(#[from] TokenError),

    #[error("Password must be changed before signing in")]
    PasswordRotationRequired,

    #[error("Insufficient permissions: {0}")]
    Forbidden(String),

    #[error("Super Admin access required")]
    SuperAdminRequired,

    #[error("This invite is not for your email")]
    InviteMismatch,

    #[error("User not found")]
    UserNotFound,

    #[error("Company not found")]
    TenantNotFound,

    #[error("Member not found")]
    MemberNotFound,

    #[error("Invite not found")]
    InviteNotFound,

    #[error("Action not found")]
    ActionNotFound,

    #[error("Email already in use")]
    EmailInUse,

    #[error("Username already in use")]
    UsernameInUse,

    #[error("User is already a member of this company")]
    AlreadyMember,

    #[error("An invite has already been sent to this email")]
    DuplicateInvite,

    #[error("Invite has already been {0}")]
    InviteNotPending(InviteStatus),

    #[error("Cannot remove the last Super Admin")]
    LastSuperAdmin,

    #[error("Admins cannot demote themselves")]
    SelfDemotion,

    #[error("Admins cannot remove or deactivate themselves")]
    SelfRemoval,

    #[error("Verification code is invalid, expired or already used")]
    InvalidCode,

    #[error("Too many incorrect attempts, request a new code")]
    TooManyAttempts,

    #[error("Billing total does not fit in a 64-bit integer")]
    SumOutOfRange,

    #[error(transparent)]
    Mail(#[from] MailError),

    #[error("Database error: {0}")]
    Db(#[from] sqlx::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    /// Taxonomy bucket of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            CoreError::Validation(_) | CoreError::NoUpdates => ErrorKind::Validation,
            CoreError::AuthenticationRequired
            | CoreError::InvalidCredentials
            | CoreError::Token(TokenError::Expired | TokenError::Invalid)
            | CoreError::PasswordRotationRequired => ErrorKind::Authentication,
            CoreError::Forbidden(_) | CoreError::SuperAdminRequired | CoreError::InviteMismatch => {
                ErrorKind::Authorization
            }
            CoreError::UserNotFound
            | CoreError::TenantNotFound
            | CoreError::MemberNotFound
            | CoreError::InviteNotFound
            | CoreError::ActionNotFound
            | CoreError::InvalidCode => ErrorKind::NotFound,
            CoreError::EmailInUse
            | CoreError::UsernameInUse
            | CoreError::AlreadyMember
            | CoreError::DuplicateInvite
            | CoreError::InviteNotPending(_) => ErrorKind::Conflict,
            CoreError::LastSuperAdmin
            | CoreError::SelfDemotion
            | CoreError::SelfRemoval
            | CoreError::TooManyAttempts
            | CoreError::SumOutOfRange => ErrorKind::InvariantViolation,
            CoreError::Token(TokenError::Encode(_))
            | CoreError::Mail(_)
            | CoreError::Db(_)
            | CoreError::Internal(_) => ErrorKind::Upstream,
        }
    }

    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            CoreError::Validation(_) => "VALIDATION_ERROR",
            CoreError::NoUpdates => "NO_UPDATES",
            CoreError::AuthenticationRequired => "NO_TOKEN",
            CoreError::InvalidCredentials => "INVALID_CREDENTIALS",
            CoreError::Token(TokenError::Expired) => "TOKEN_EXPIRED",
            CoreError::Token(TokenError::Invalid) => "INVALID_TOKEN",
            CoreError::Token(TokenError::Encode(_)) => "INTERNAL_ERROR",
            CoreError::PasswordRotationRequired => "PASSWORD_ROTATION_REQUIRED",
            CoreError::Forbidden(_) => "INSUFFICIENT_PERMISSIONS",
            CoreError::SuperAdminRequired => "SUPERADMIN_REQUIRED",
            CoreError::InviteMismatch => "INVITE_MISMATCH",
            CoreError::UserNotFound => "USER_NOT_FOUND",
            CoreError::TenantNotFound => "COMPANY_NOT_FOUND",
            CoreError::MemberNotFound => "MEMBER_NOT_FOUND",
            CoreError::InviteNotFound => "INVITE_NOT_FOUND",
            CoreError::ActionNotFound => "ACTION_NOT_FOUND",
            CoreError::EmailInUse => "EMAIL_IN_USE",
            CoreError::UsernameInUse => "USERNAME_IN_USE",
            CoreError::AlreadyMember => "ALREADY_MEMBER",
            CoreError::DuplicateInvite => "INVITE_EXISTS",
            CoreError::InviteNotPending(_) => "INVITE_NOT_PENDING",
            CoreError::LastSuperAdmin => "LAST_SUPERADMIN",
            CoreError::SelfDemotion => "SELF_DEMOTION",
            CoreError::SelfRemoval => "SELF_REMOVAL",
            CoreError::InvalidCode => "INVALID_CODE",
            CoreError::TooManyAttempts => "TOO_MANY_ATTEMPTS",
            CoreError::SumOutOfRange => "SUM_OUT_OF_RANGE",
            CoreError::Mail(_) => "EMAIL_DELIVERY_FAILED",
            CoreError::Db(_) | CoreError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Map a Postgres unique violation onto the matching conflict variant.
    ///
    /// Constraint names come from `migrations/0001_init.sql`.
    pub(crate) fn from_unique_violation(e: sqlx::Error) -> Self {
        let constraint = e
            .as_database_error()
            .filter(|db| db.is_unique_violation())
            .and_then(|db| db.constraint().map(str::to_owned));
        match constraint.as_deref() {
            Some("identities_email_key") => CoreError::EmailInUse,
            Some("identities_username_key") => CoreError::UsernameInUse,
            Some("invites_pending_email_tenant_idx") => CoreError::DuplicateInvite,
            Some("memberships_pkey") => CoreError::AlreadyMember,
            _ => CoreError::Db(e),
        }
    }
}
