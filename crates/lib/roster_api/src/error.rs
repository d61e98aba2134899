//! Application error types.

use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use roster_core::{CoreError, ErrorKind};
use thiserror::Error;
use tracing::error;

use crate::models::ErrorBody;

/// Convenience alias for handler return types.
pub type AppResult<T> = Result<T, AppError>;

/// Application-level errors with HTTP status mapping.
#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("Route not found")]
    RouteNotFound,
}

impl AppError {
    pub fn validation(message: impl Into<String>) -> Self {
        AppError::Core(CoreError::Validation(message.into()))
    }
}

fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::Validation | ErrorKind::InvariantViolation => StatusCode::BAD_REQUEST,
        ErrorKind::Authentication => StatusCode::UNAUTHORIZED,
        ErrorKind::Authorization => StatusCode::FORBIDDEN,
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::Conflict => StatusCode::CONFLICT,
        ErrorKind::Upstream => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::RouteNotFound => (StatusCode::NOT_FOUND, "NOT_FOUND", self.to_string()),
            AppError::Core(e) => {
                let kind = e.kind();
                let message = if kind == ErrorKind::Upstream {
                    error!(error = %e, code = e.code(), "request failed");
                    "Internal server error".to_string()
                } else {
                    e.to_string()
                };
                (status_for(kind), e.code(), message)
            }
        };
        let body = Json(ErrorBody {
            success: false,
            error: message,
            code: code.to_string(),
        });
        (status, body).into_response()
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::validation(rejection.body_text())
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        AppError::validation(rejection.body_text())
    }
}

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        AppError::validation(rejection.body_text())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_map_to_statuses() {
        let status = |e: CoreError| AppError::from(e).into_response().status();
        assert_eq!(status(CoreError::LastSuperAdmin), StatusCode::BAD_REQUEST);
        assert_eq!(status(CoreError::EmailInUse), StatusCode::CONFLICT);
        assert_eq!(status(CoreError::SuperAdminRequired), StatusCode::FORBIDDEN);
        assert_eq!(status(CoreError::InvalidCredentials), StatusCode::UNAUTHORIZED);
        assert_eq!(
            status(CoreError::Internal("boom".into())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            AppError::RouteNotFound.into_response().status(),
            StatusCode::NOT_FOUND
        );
    }
}
