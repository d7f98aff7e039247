//! Outbound e-mail notification senders.

use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;
use tracing::info;

use crate::error::InvoicingError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EmailMessage {
    pub to: String,
    pub subject: String,
    pub body: String,
}

#[derive(Debug, Error)]
pub enum SendError {
    #[error("transport error: {0}")]
    Transport(String),
    #[error("notification service returned {status}: {body}")]
    Rejected { status: u16, body: String },
}

/// A single delivery attempt. Retrying is the dispatcher's job.
#[async_trait]
pub trait NotificationSender: Send + Sync {
    async fn send(&self, message: &EmailMessage) -> Result<(), SendError>;
}

#[derive(Debug, Serialize)]
struct SendEmailRequest<'a> {
    to: &'a str,
    subject: &'a str,
    body_text: &'a str,
}

/// Sends through notification-service's `POST /notifications/email`.
#[derive(Clone)]
pub struct HttpNotificationSender {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpNotificationSender {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, InvoicingError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| {
                InvoicingError::CollaboratorFailure(anyhow::anyhow!(
                    "Failed to build notification client: {}",
                    e
                ))
            })?;

        Ok(Self {
            client,
            endpoint: format!("{}/notifications/email", base_url.trim_end_matches('/')),
        })
    }
}

#[async_trait]
impl NotificationSender for HttpNotificationSender {
    async fn send(&self, message: &EmailMessage) -> Result<(), SendError> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(&SendEmailRequest {
                to: &message.to,
                subject: &message.subject,
                body_text: &message.body,
            })
            .send()
            .await
            .map_err(|e| SendError::Transport(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        Err(SendError::Rejected {
            status: status.as_u16(),
            body,
        })
    }
}

/// Logs messages instead of sending them. Used when no notification service
/// is configured.
#[derive(Debug, Default, Clone)]
pub struct LoggingNotificationSender;

#[async_trait]
impl NotificationSender for LoggingNotificationSender {
    async fn send(&self, message: &EmailMessage) -> Result<(), SendError> {
        info!(
            to = %message.to,
            subject = %message.subject,
            "Notification service not configured, logging e-mail instead"
        );
        Ok(())
    }
}
