//! Email delivery collaborator.
//!
//! Delivery is best effort: callers persist their state change first and
//! then send, so a failed send never rolls anything back.

use std::sync::Mutex;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};
use url::Url;

/// Delivery failures.
#[derive(Debug, Error)]
pub enum MailError {
    #[error("Email delivery failed: {0}")]
    Delivery(String),

    #[error("Email transport error: {0}")]
    Transport(#[from] reqwest::Error),
}

/// A rendered message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Email {
    pub to: String,
    pub subject: String,
    pub body: String,
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, email: Email) -> Result<(), MailError>;
}

/// Posts `{to, subject, message}` JSON to an HTTP relay and expects
/// `{success: true}` back.
pub struct HttpMailer {
    client: reqwest::Client,
    endpoint: Url,
}

#[derive(Debug, Deserialize)]
struct RelayResponse {
    #[serde(default)]
    success: bool,
    message: Option<String>,
}

impl HttpMailer {
    pub fn new(endpoint: Url) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint,
        }
    }
}

#[async_trait]
impl Mailer for HttpMailer {
    async fn send(&self, email: Email) -> Result<(), MailError> {
        let resp = self
            .client
            .post(self.endpoint.clone())
            .json(&serde_json::json!({
                "to": email.to,
                "subject": email.subject,
                "message": email.body,
            }))
            .send()
            .await?;
        let status = resp.status();
        let body: RelayResponse = resp.json().await.unwrap_or(RelayResponse {
            success: false,
            message: None,
        });
        if !status.is_success() || !body.success {
            let reason = body
                .message
                .unwrap_or_else(|| format!("relay responded with {status}"));
            warn!(to = %email.to, %reason, "email relay rejected message");
            return Err(MailError::Delivery(reason));
        }
        info!(to = %email.to, subject = %email.subject, "email sent");
        Ok(())
    }
}

/// Logs messages instead of sending them. Used when no relay is configured.
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, email: Email) -> Result<(), MailError> {
        info!(to = %email.to, subject = %email.subject, "email delivery disabled, logging only");
        debug!(body = %email.body, "email body");
        Ok(())
    }
}

/// Keeps every message in memory. Tests read codes back out of it.
#[derive(Default)]
pub struct OutboxMailer {
    sent: Mutex<Vec<Email>>,
    fail: bool,
}

impl OutboxMailer {
    pub fn new() -> Self {
        Self::default()
    }

    /// A mailer whose every send fails after recording nothing.
    pub fn failing() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    pub fn sent(&self) -> Vec<Email> {
        self.sent.lock().map(|s| s.clone()).unwrap_or_default()
    }

    /// Last 4-digit code mailed to `to`, if any.
    pub fn last_code_for(&self, to: &str) -> Option<String> {
        self.sent()
            .iter()
            .rev()
            .filter(|e| e.to == to)
            .find_map(|e| extract_code(&e.body))
    }
}

#[async_trait]
impl Mailer for OutboxMailer {
    async fn send(&self, email: Email) -> Result<(), MailError> {
        if self.fail {
            return Err(MailError::Delivery("outbox configured to fail".into()));
        }
        if let Ok(mut sent) = self.sent.lock() {
            sent.push(email);
        }
        Ok(())
    }
}

fn extract_code(body: &str) -> Option<String> {
    body.split(|c: char| !c.is_ascii_digit())
        .find(|s| s.len() == 4)
        .map(str::to_owned)
}

// ---------------------------------------------------------------------------
// Templates
// ---------------------------------------------------------------------------

fn wrap(inner: &str) -> String {
    format!(
        "<!DOCTYPE html><html><head><meta charset=\"UTF-8\"></head>\
         <body style=\"font-family: Arial, sans-serif; color: #333\">\
         <div style=\"max-width: 600px; margin: 0 auto; padding: 20px\">{inner}</div>\
         </body></html>"
    )
}

/// Signup verification code.
pub fn validation_code_email(to: &str, name: &str, code: &str) -> Email {
    Email {
        to: to.to_string(),
        subject: "Email Validation".into(),
        body: wrap(&format!(
            "<p>Hi {name},</p><p>Your validation code is:</p>\
             <p style=\"font-size: 32px; font-weight: bold\">{code}</p>\
             <p>This code expires in 10 minutes.</p>"
        )),
    }
}

/// Password reset code.
pub fn password_reset_email(to: &str, name: &str, code: &str) -> Email {
    Email {
        to: to.to_string(),
        subject: "Password Reset".into(),
        body: wrap(&format!(
            "<p>Hi {name},</p><p>Use this code to reset your password:</p>\
             <p style=\"font-size: 32px; font-weight: bold\">{code}</p>\
             <p>This code expires in 30 minutes. If you did not ask for a reset, \
             ignore this email.</p>"
        )),
    }
}

/// Invitation to join a tenant.
pub fn invite_email(to: &str, tenant_name: &str, accept_url: &str) -> Email {
    Email {
        to: to.to_string(),
        subject: format!("You have been invited to join {tenant_name}"),
        body: wrap(&format!(
            "<p>You have been invited to join <strong>{tenant_name}</strong>.</p>\
             <p><a href=\"{accept_url}\">Accept the invitation</a></p>"
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn outbox_records_and_extracts_codes() {
        let outbox = OutboxMailer::new();
        outbox
            .send(validation_code_email("a@b.co", "A", "0427"))
            .await
            .unwrap();
        assert_eq!(outbox.sent().len(), 1);
        assert_eq!(outbox.last_code_for("a@b.co").as_deref(), Some("0427"));
        assert_eq!(outbox.last_code_for("c@d.co"), None);
    }

    #[tokio::test]
    async fn failing_outbox_errors() {
        let outbox = OutboxMailer::failing();
        let err = outbox
            .send(invite_email("a@b.co", "Acme", "http://x/accept"))
            .await
            .unwrap_err();
        assert!(matches!(err, MailError::Delivery(_)));
        assert!(outbox.sent().is_empty());
    }
}
