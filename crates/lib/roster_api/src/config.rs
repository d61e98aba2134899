//! API server configuration.

use std::sync::Arc;

use roster_core::auth::jwt::DEFAULT_TOKEN_TTL_SECS;
use roster_core::mailer::{HttpMailer, LogMailer, Mailer};
use tracing::warn;
use url::Url;

use crate::services::auth::resolve_jwt_secret;

/// Configuration for the API server.
#[derive(Clone, Debug)]
pub struct ApiConfig {
    /// Address to bind the HTTP listener (e.g. "127.0.0.1:3100").
    pub bind_addr: String,
    /// PostgreSQL connection URL.
    pub database_url: String,
    /// JWT signing secret.
    pub jwt_secret: String,
    /// Bearer token lifetime in seconds.
    pub jwt_ttl_secs: i64,
    /// Mail relay endpoint. `None` logs mail instead of sending it.
    pub mail_endpoint: Option<Url>,
    /// Frontend base URL, used in invite links.
    pub app_url: String,
    /// Let unauthenticated callers accept or decline an invite by id.
    pub allow_anonymous_invite_accept: bool,
}

impl ApiConfig {
    /// Reads configuration from environment variables with sensible defaults.
    ///
    /// | Variable                        | Default                              |
    /// |---------------------------------|--------------------------------------|
    /// | `BIND_ADDR`                     | `127.0.0.1:3100`                     |
    /// | `DATABASE_URL`                  | `postgres://localhost:5432/roster`   |
    /// | `JWT_SECRET` / `AUTH_SECRET`    | generated & persisted to file        |
    /// | `JWT_TTL_SECS`                  | `604800`                             |
    /// | `MAIL_ENDPOINT`                 | unset (log only)                     |
    /// | `APP_URL`                       | `http://localhost:4200`              |
    /// | `ALLOW_ANONYMOUS_INVITE_ACCEPT` | `true`                               |
    pub fn from_env() -> Self {
        Self {
            bind_addr: std::env::var("BIND_ADDR").unwrap_or_else(|_| "127.0.0.1:3100".into()),
            database_url: std::env::var("DATABASE_URL")
                .unwrap_or_else(|_| "postgres://localhost:5432/roster".into()),
            jwt_secret: resolve_jwt_secret(),
            jwt_ttl_secs: std::env::var("JWT_TTL_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .filter(|secs| *secs > 0)
                .unwrap_or(DEFAULT_TOKEN_TTL_SECS),
            mail_endpoint: std::env::var("MAIL_ENDPOINT")
                .ok()
                .filter(|v| !v.is_empty())
                .and_then(|v| match Url::parse(&v) {
                    Ok(url) => Some(url),
                    Err(e) => {
                        warn!(error = %e, "ignoring malformed MAIL_ENDPOINT");
                        None
                    }
                }),
            app_url: std::env::var("APP_URL").unwrap_or_else(|_| "http://localhost:4200".into()),
            allow_anonymous_invite_accept: std::env::var("ALLOW_ANONYMOUS_INVITE_ACCEPT")
                .ok()
                .and_then(|v| parse_flag(&v))
                .unwrap_or(true),
        }
    }

    /// The mail collaborator this configuration selects.
    pub fn mailer(&self) -> Arc<dyn Mailer> {
        match &self.mail_endpoint {
            Some(endpoint) => Arc::new(HttpMailer::new(endpoint.clone())),
            None => Arc::new(LogMailer),
        }
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_accept_common_spellings() {
        assert_eq!(parse_flag("TRUE"), Some(true));
        assert_eq!(parse_flag(" off "), Some(false));
        assert_eq!(parse_flag("maybe"), None);
    }
}
