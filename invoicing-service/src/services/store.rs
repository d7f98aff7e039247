//! Persistence contract for invoices.

use async_trait::async_trait;
use chrono::NaiveDate;
use uuid::Uuid;

use crate::error::InvoicingError;
use crate::models::{Invoice, StatusSummary};

#[async_trait]
pub trait InvoiceStore: Send + Sync {
    /// Persist a new invoice with its items.
    ///
    /// The invoice number is drawn from the sequence counter inside the same
    /// transaction as the inserts, and the stored invoice (with its number) is
    /// returned. Any failure leaves neither rows nor a consumed number behind.
    async fn create(&self, invoice: Invoice) -> Result<Invoice, InvoicingError>;

    async fn get_by_id(&self, invoice_id: Uuid) -> Result<Option<Invoice>, InvoicingError>;

    /// Replace every mutable field and the whole item list.
    /// `NotFound` when the invoice does not exist.
    async fn update(&self, invoice: Invoice) -> Result<Invoice, InvoicingError>;

    /// A user's invoices ordered by `issue_date DESC, invoice_number DESC`.
    async fn list_by_user(
        &self,
        user_id: Uuid,
        limit: u32,
        offset: u64,
    ) -> Result<Vec<Invoice>, InvoicingError>;

    /// Payable invoices whose due date lies in `[from, to]`.
    async fn list_due_within(
        &self,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<Invoice>, InvoicingError>;

    /// Atomically bump the sequence counter and return the new value.
    async fn increment_sequence(&self) -> Result<i64, InvoicingError>;

    /// Count and summed totals per status for one user.
    async fn stats_for_user(&self, user_id: Uuid) -> Result<Vec<StatusSummary>, InvoicingError>;

    async fn health_check(&self) -> Result<(), InvoicingError>;
}
