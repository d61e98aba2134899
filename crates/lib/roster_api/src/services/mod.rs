//! Shared helpers for handlers.

pub mod auth;
