//! Invoice model for invoicing-service.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// Invoice status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvoiceStatus {
    Draft,
    Pending,
    Paid,
    Overdue,
    Cancelled,
}

impl InvoiceStatus {
    pub const ALL: [InvoiceStatus; 5] = [
        InvoiceStatus::Draft,
        InvoiceStatus::Pending,
        InvoiceStatus::Paid,
        InvoiceStatus::Overdue,
        InvoiceStatus::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            InvoiceStatus::Draft => "draft",
            InvoiceStatus::Pending => "pending",
            InvoiceStatus::Paid => "paid",
            InvoiceStatus::Overdue => "overdue",
            InvoiceStatus::Cancelled => "cancelled",
        }
    }

    pub fn from_string(s: &str) -> Self {
        match s {
            "pending" => InvoiceStatus::Pending,
            "paid" => InvoiceStatus::Paid,
            "overdue" => InvoiceStatus::Overdue,
            "cancelled" => InvoiceStatus::Cancelled,
            _ => InvoiceStatus::Draft,
        }
    }

    /// Whether the invoice still expects a payment. Paid and cancelled
    /// invoices never receive reminders.
    pub fn is_payable(&self) -> bool {
        !matches!(self, InvoiceStatus::Paid | InvoiceStatus::Cancelled)
    }
}

/// A single billed line. Amounts are in minor currency units.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct InvoiceItem {
    #[validate(length(min = 1, message = "Item description cannot be empty"))]
    pub description: String,
    #[validate(range(min = 0, message = "Quantity must be non-negative"))]
    pub quantity: i64,
    #[validate(range(min = 0, message = "Unit price must be non-negative"))]
    pub unit_price: i64,
}

/// Banking details printed on the invoice. Stored as given.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentInfo {
    #[serde(default)]
    pub account_name: String,
    #[serde(default)]
    pub account_number: String,
    #[serde(default)]
    pub bank_name: String,
    #[serde(default)]
    pub routing_number: String,
}

/// Invoice with its items and computed amounts.
///
/// `subtotal`, `discount_amount` and `total` are always derived from `items`
/// and `discount_bp`; they are never patched independently.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Invoice {
    pub invoice_id: Uuid,
    pub user_id: Uuid,
    pub customer_id: Uuid,
    pub invoice_number: String,
    pub status: InvoiceStatus,
    pub issue_date: NaiveDate,
    pub due_date: NaiveDate,
    pub currency: String,
    pub items: Vec<InvoiceItem>,
    /// Discount at scale 10,000 (1000 = 10.00%).
    pub discount_bp: i64,
    pub subtotal: i64,
    pub discount_amount: i64,
    pub total: i64,
    pub payment_info: PaymentInfo,
    pub note: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for creating an invoice.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct NewInvoice {
    pub user_id: Uuid,
    pub customer_id: Uuid,
    pub issue_date: NaiveDate,
    pub due_date: NaiveDate,
    #[validate(length(equal = 3, message = "Currency must be a 3-letter ISO code"))]
    pub currency: String,
    #[validate(length(min = 1, message = "At least one item is required"), nested)]
    pub items: Vec<InvoiceItem>,
    #[serde(default)]
    #[validate(range(min = 0, max = 10000, message = "Discount must be between 0 and 10000"))]
    pub discount_bp: i64,
    #[serde(default)]
    pub payment_info: PaymentInfo,
    #[serde(default)]
    pub note: String,
}

/// Input for updating an invoice. Every mutable field is replaced, including
/// the whole item list. A missing `status` keeps the current one.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct InvoiceUpdate {
    pub customer_id: Uuid,
    #[serde(default)]
    pub status: Option<InvoiceStatus>,
    pub issue_date: NaiveDate,
    pub due_date: NaiveDate,
    #[validate(length(equal = 3, message = "Currency must be a 3-letter ISO code"))]
    pub currency: String,
    #[validate(length(min = 1, message = "At least one item is required"), nested)]
    pub items: Vec<InvoiceItem>,
    #[serde(default)]
    #[validate(range(min = 0, max = 10000, message = "Discount must be between 0 and 10000"))]
    pub discount_bp: i64,
    #[serde(default)]
    pub payment_info: PaymentInfo,
    #[serde(default)]
    pub note: String,
}

/// Identifier and number handed back by invoice creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatedInvoice {
    pub invoice_id: Uuid,
    pub invoice_number: String,
}

/// One page of a user's invoices. An empty `next_page_token` means the
/// listing is exhausted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvoicePage {
    pub invoices: Vec<Invoice>,
    pub next_page_token: String,
}

/// Count and summed totals of one status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusSummary {
    pub status: InvoiceStatus,
    pub count: i64,
    pub total_amount: i64,
}

/// Per-status breakdown of a user's invoices.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceStats {
    pub user_id: Uuid,
    pub total_count: i64,
    pub total_amount: i64,
    pub by_status: Vec<StatusSummary>,
}

impl InvoiceStats {
    /// Build stats from store summaries, listing every status even when the
    /// user has no invoice in it.
    pub fn from_summaries(user_id: Uuid, summaries: &[StatusSummary]) -> Self {
        let by_status: Vec<StatusSummary> = InvoiceStatus::ALL
            .iter()
            .map(|status| {
                summaries
                    .iter()
                    .filter(|s| s.status == *status)
                    .fold(
                        StatusSummary {
                            status: *status,
                            count: 0,
                            total_amount: 0,
                        },
                        |acc, s| StatusSummary {
                            status: acc.status,
                            count: acc.count + s.count,
                            total_amount: acc.total_amount + s.total_amount,
                        },
                    )
            })
            .collect();

        Self {
            user_id,
            total_count: by_status.iter().map(|s| s.count).sum(),
            total_amount: by_status.iter().map(|s| s.total_amount).sum(),
            by_status,
        }
    }

    pub fn for_status(&self, status: InvoiceStatus) -> Option<&StatusSummary> {
        self.by_status.iter().find(|s| s.status == status)
    }
}
