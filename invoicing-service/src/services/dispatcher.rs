//! Bounded-retry delivery of e-mail notifications.

use service_core::retry::{retry_with_backoff, RetryConfig};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use tracing::{info, instrument, warn};

use crate::error::InvoicingError;
use crate::services::metrics::NOTIFICATION_ATTEMPTS_TOTAL;
use crate::services::notifier::{EmailMessage, NotificationSender};

/// Successful delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchReceipt {
    pub attempts: u32,
}

/// Shared by invoice e-mails and reminders so both use one retry policy.
#[derive(Clone)]
pub struct NotificationDispatcher {
    sender: Arc<dyn NotificationSender>,
    policy: RetryConfig,
}

impl NotificationDispatcher {
    pub fn new(sender: Arc<dyn NotificationSender>, policy: RetryConfig) -> Self {
        Self { sender, policy }
    }

    pub fn policy(&self) -> &RetryConfig {
        &self.policy
    }

    /// Deliver one message, retrying per the policy. Exhausting every attempt
    /// yields `TerminalDispatchFailure`.
    #[instrument(skip(self, message), fields(recipient = %recipient, subject = %subject))]
    pub async fn send(
        &self,
        recipient: &str,
        subject: &str,
        message: &str,
    ) -> Result<DispatchReceipt, InvoicingError> {
        let email = EmailMessage {
            to: recipient.to_string(),
            subject: subject.to_string(),
            body: message.to_string(),
        };
        let attempts = AtomicU32::new(0);

        let result = retry_with_backoff(&self.policy, "send_notification", || {
            attempts.fetch_add(1, Ordering::SeqCst);
            let sender = Arc::clone(&self.sender);
            let email = &email;
            async move {
                let outcome = sender.send(email).await;
                let label = if outcome.is_ok() { "success" } else { "failure" };
                NOTIFICATION_ATTEMPTS_TOTAL.with_label_values(&[label]).inc();
                outcome
            }
        })
        .await;

        match result {
            Ok(()) => {
                let attempts = attempts.load(Ordering::SeqCst);
                info!(attempts = attempts, "Notification delivered");
                Ok(DispatchReceipt { attempts })
            }
            Err(e) => {
                let attempts = e.attempts();
                warn!(attempts = attempts, error = %e, "Notification delivery gave up");
                Err(InvoicingError::TerminalDispatchFailure {
                    recipient: recipient.to_string(),
                    attempts,
                    last_error: e.to_string(),
                })
            }
        }
    }
}
