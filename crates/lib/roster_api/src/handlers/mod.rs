//! Request handlers.

pub mod actions;
pub mod admin;
pub mod auth;
pub mod companies;
pub mod health;
pub mod teams;
