//! Activity events emitted by invoice and reminder operations.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::ReminderOffset;

/// Activity event with a stable, tagged JSON schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ActivityEvent {
    InvoiceCreated {
        invoice_id: Uuid,
        user_id: Uuid,
        invoice_number: String,
        total: i64,
        currency: String,
    },
    InvoiceUpdated {
        invoice_id: Uuid,
        user_id: Uuid,
        total: i64,
    },
    InvoiceSent {
        invoice_id: Uuid,
        user_id: Uuid,
        recipient: String,
    },
    ReminderSent {
        invoice_id: Uuid,
        offset_days: ReminderOffset,
        recipient: String,
    },
    ReminderFailed {
        invoice_id: Uuid,
        offset_days: ReminderOffset,
        attempts: u32,
        error: String,
    },
}

impl ActivityEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            ActivityEvent::InvoiceCreated { .. } => "invoice_created",
            ActivityEvent::InvoiceUpdated { .. } => "invoice_updated",
            ActivityEvent::InvoiceSent { .. } => "invoice_sent",
            ActivityEvent::ReminderSent { .. } => "reminder_sent",
            ActivityEvent::ReminderFailed { .. } => "reminder_failed",
        }
    }

    pub fn invoice_id(&self) -> Uuid {
        match self {
            ActivityEvent::InvoiceCreated { invoice_id, .. }
            | ActivityEvent::InvoiceUpdated { invoice_id, .. }
            | ActivityEvent::InvoiceSent { invoice_id, .. }
            | ActivityEvent::ReminderSent { invoice_id, .. }
            | ActivityEvent::ReminderFailed { invoice_id, .. } => *invoice_id,
        }
    }
}
