//! Extractors whose rejections use the JSON error envelope.

use axum::extract::{FromRequest, FromRequestParts};
use roster_core::{CoreError, ids};
use uuid::Uuid;

use crate::error::AppError;

/// `axum::Json` with [`AppError`] rejections.
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct ApiJson<T>(pub T);

/// `axum::extract::Query` with [`AppError`] rejections.
#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(AppError))]
pub struct ApiQuery<T>(pub T);

/// `axum::extract::Path` with [`AppError`] rejections.
#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(AppError))]
pub struct ApiPath<T>(pub T);

/// Parse a path or body id. Ids that are not UUIDs cannot name anything, so
/// they fail with the caller's not-found error.
pub fn parse_id(raw: &str, missing: CoreError) -> Result<Uuid, AppError> {
    ids::parse_id(raw).ok_or(AppError::Core(missing))
}
