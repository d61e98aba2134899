//! Route path constants.

/// GET /health: liveness and store reachability
pub const GET_HEALTH: &str = "/health";

/// POST /api/auth/signup
pub const POST_AUTH_SIGNUP: &str = "/api/auth/signup";
/// POST /api/auth/login
pub const POST_AUTH_LOGIN: &str = "/api/auth/login";
/// POST /api/auth/validate-email
pub const POST_AUTH_VALIDATE_EMAIL: &str = "/api/auth/validate-email";
/// POST /api/auth/resend-verification
pub const POST_AUTH_RESEND_VERIFICATION: &str = "/api/auth/resend-verification";
/// POST /api/auth/forgot-password
pub const POST_AUTH_FORGOT_PASSWORD: &str = "/api/auth/forgot-password";
/// POST /api/auth/reset-password
pub const POST_AUTH_RESET_PASSWORD: &str = "/api/auth/reset-password";
/// GET /api/auth/me
pub const GET_AUTH_ME: &str = "/api/auth/me";

/// GET|POST /api/admin/users
pub const ADMIN_USERS: &str = "/api/admin/users";
/// GET|PATCH|DELETE /api/admin/users/{uid}
pub const ADMIN_USERS_UID: &str = "/api/admin/users/{uid}";
/// PATCH /api/admin/users/{uid}/role
pub const PATCH_ADMIN_USERS_UID_ROLE: &str = "/api/admin/users/{uid}/role";

/// POST /api/companies
pub const POST_COMPANIES: &str = "/api/companies";
/// GET /api/companies/my-companies
pub const GET_COMPANIES_MY_COMPANIES: &str = "/api/companies/my-companies";
/// POST /api/companies/invite
pub const POST_COMPANIES_INVITE: &str = "/api/companies/invite";
/// GET /api/companies/invites/pending
pub const GET_COMPANIES_INVITES_PENDING: &str = "/api/companies/invites/pending";
/// POST /api/companies/invite/{id}/accept
pub const POST_COMPANIES_INVITE_ID_ACCEPT: &str = "/api/companies/invite/{id}/accept";
/// POST /api/companies/invite/{id}/decline
pub const POST_COMPANIES_INVITE_ID_DECLINE: &str = "/api/companies/invite/{id}/decline";
/// GET /api/companies/{id}
pub const GET_COMPANIES_ID: &str = "/api/companies/{id}";
/// GET /api/companies/{id}/members
pub const GET_COMPANIES_ID_MEMBERS: &str = "/api/companies/{id}/members";
/// PATCH /api/companies/{id}/members/{uid}/role
pub const PATCH_COMPANIES_ID_MEMBERS_UID_ROLE: &str = "/api/companies/{id}/members/{uid}/role";
/// PATCH /api/companies/{id}/members/{uid}/status
pub const PATCH_COMPANIES_ID_MEMBERS_UID_STATUS: &str =
    "/api/companies/{id}/members/{uid}/status";
/// POST /api/companies/{id}/members/delete
pub const POST_COMPANIES_ID_MEMBERS_DELETE: &str = "/api/companies/{id}/members/delete";
/// GET /api/companies/{id}/permissions
pub const GET_COMPANIES_ID_PERMISSIONS: &str = "/api/companies/{id}/permissions";

/// POST /api/teams
pub const POST_TEAMS: &str = "/api/teams";
/// GET /api/teams/my-teams
pub const GET_TEAMS_MY_TEAMS: &str = "/api/teams/my-teams";

/// GET|POST|DELETE /api/actions
pub const ACTIONS: &str = "/api/actions";
/// GET /api/actions/companies
pub const GET_ACTIONS_COMPANIES: &str = "/api/actions/companies";
/// GET /api/actions/collections
pub const GET_ACTIONS_COLLECTIONS: &str = "/api/actions/collections";
/// GET|PUT|DELETE /api/actions/{id}
pub const ACTIONS_ID: &str = "/api/actions/{id}";
