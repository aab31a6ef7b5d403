//! # Mail
//!
//! Best-effort email for order confirmations and status updates.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  mail_outbox row ──► MailDispatcher ──► templates ──► dyn Mailer       │
//! │                            │                            │               │
//! │                            │                  ┌─────────┴─────────┐     │
//! │                            │                  │ LogMailer         │     │
//! │                            │                  │ HttpMailer (relay)│     │
//! │                            │                  └───────────────────┘     │
//! │                            ▼                                            │
//! │                 mark_sent / mark_failed                                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! A [`MailError`] never reaches an HTTP caller. The dispatcher records it on
//! the outbox row and moves on.

pub mod dispatcher;
pub mod templates;

pub use dispatcher::{MailDispatcher, MailDispatcherHandle};

use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use crate::config::{MailMode, MailSettings};

/// A rendered email.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MailMessage {
    pub from: String,
    pub to: String,
    pub subject: String,
    /// Plain-text body.
    pub body: String,
}

/// Delivery failures.
#[derive(Debug, thiserror::Error)]
pub enum MailError {
    #[error("Mail relay unreachable: {0}")]
    Transport(String),

    #[error("Mail relay rejected message: HTTP {status}")]
    Rejected { status: u16 },

    #[error("Cannot render email: {0}")]
    Render(String),
}

/// Hands rendered emails to whatever actually delivers them.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, message: &MailMessage) -> Result<(), MailError>;
}

/// Writes emails to the log. Default for development.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, message: &MailMessage) -> Result<(), MailError> {
        info!(to = %message.to, subject = %message.subject, "Email (log mailer)");
        Ok(())
    }
}

/// POSTs each email as JSON to a relay.
pub struct HttpMailer {
    client: reqwest::Client,
    relay_url: String,
}

impl HttpMailer {
    pub fn new(relay_url: impl Into<String>, timeout: Duration) -> Result<Self, MailError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| MailError::Transport(e.to_string()))?;

        Ok(HttpMailer {
            client,
            relay_url: relay_url.into(),
        })
    }
}

#[async_trait]
impl Mailer for HttpMailer {
    async fn send(&self, message: &MailMessage) -> Result<(), MailError> {
        let response = self
            .client
            .post(&self.relay_url)
            .json(message)
            .send()
            .await
            .map_err(|e| MailError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(MailError::Rejected {
                status: status.as_u16(),
            });
        }
        Ok(())
    }
}

/// Builds the mailer selected by `[mail] mode`.
pub fn mailer_from_settings(settings: &MailSettings) -> Result<Arc<dyn Mailer>, MailError> {
    match settings.mode {
        MailMode::Log => Ok(Arc::new(LogMailer)),
        MailMode::Http => {
            let url = settings
                .relay_url
                .clone()
                .ok_or_else(|| MailError::Transport("no relay_url configured".into()))?;
            Ok(Arc::new(HttpMailer::new(url, settings.timeout())?))
        }
    }
}

// =============================================================================
// Test Mailers
// =============================================================================
