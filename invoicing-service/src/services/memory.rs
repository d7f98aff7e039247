//! In-process invoice store.
//!
//! One mutex guards both the counter and the rows, so creation is atomic in
//! the same way as the Postgres transaction.

use async_trait::async_trait;
use chrono::NaiveDate;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Mutex;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::error::InvoicingError;
use crate::models::{Invoice, StatusSummary};
use crate::services::sequencer::{compare_invoice_numbers, format_invoice_number};
use crate::services::store::InvoiceStore;

#[derive(Default)]
struct MemoryState {
    sequence: i64,
    invoices: HashMap<Uuid, Invoice>,
}

#[derive(Default)]
pub struct InMemoryInvoiceStore {
    state: Mutex<MemoryState>,
    sequencer_down: AtomicBool,
}

impl InMemoryInvoiceStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate the sequence counter becoming unreachable.
    pub fn set_sequencer_available(&self, available: bool) {
        self.sequencer_down.store(!available, Ordering::SeqCst);
    }

    fn bump(&self, state: &mut MemoryState) -> Result<i64, InvoicingError> {
        if self.sequencer_down.load(Ordering::SeqCst) {
            return Err(InvoicingError::SequencerFailure(anyhow::anyhow!(
                "sequence counter unavailable"
            )));
        }
        state.sequence += 1;
        Ok(state.sequence)
    }
}

#[async_trait]
impl InvoiceStore for InMemoryInvoiceStore {
    #[instrument(skip(self, invoice), fields(invoice_id = %invoice.invoice_id))]
    async fn create(&self, mut invoice: Invoice) -> Result<Invoice, InvoicingError> {
        let mut state = self.state.lock().await;

        if state.invoices.contains_key(&invoice.invoice_id) {
            return Err(InvoicingError::persistence(
                "Failed to create invoice",
                "duplicate invoice id",
            ));
        }

        let value = self.bump(&mut state)?;
        invoice.invoice_number = format_invoice_number(value);
        state.invoices.insert(invoice.invoice_id, invoice.clone());

        info!(invoice_number = %invoice.invoice_number, "Invoice created");

        Ok(invoice)
    }

    async fn get_by_id(&self, invoice_id: Uuid) -> Result<Option<Invoice>, InvoicingError> {
        Ok(self.state.lock().await.invoices.get(&invoice_id).cloned())
    }

    #[instrument(skip(self, invoice), fields(invoice_id = %invoice.invoice_id))]
    async fn update(&self, invoice: Invoice) -> Result<Invoice, InvoicingError> {
        let mut state = self.state.lock().await;
        let slot = state
            .invoices
            .get_mut(&invoice.invoice_id)
            .ok_or_else(|| InvoicingError::NotFound(format!("Invoice {}", invoice.invoice_id)))?;

        let stored = Invoice {
            invoice_number: slot.invoice_number.clone(),
            user_id: slot.user_id,
            created_at: slot.created_at,
            ..invoice
        };
        *slot = stored.clone();

        Ok(stored)
    }

    async fn list_by_user(
        &self,
        user_id: Uuid,
        limit: u32,
        offset: u64,
    ) -> Result<Vec<Invoice>, InvoicingError> {
        let state = self.state.lock().await;
        let mut invoices: Vec<&Invoice> = state
            .invoices
            .values()
            .filter(|inv| inv.user_id == user_id)
            .collect();

        invoices.sort_by(|a, b| {
            b.issue_date
                .cmp(&a.issue_date)
                .then_with(|| compare_invoice_numbers(&b.invoice_number, &a.invoice_number))
        });

        Ok(invoices
            .into_iter()
            .skip(usize::try_from(offset).unwrap_or(usize::MAX))
            .take(limit as usize)
            .cloned()
            .collect())
    }

    async fn list_due_within(
        &self,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<Invoice>, InvoicingError> {
        let state = self.state.lock().await;
        let mut due: Vec<Invoice> = state
            .invoices
            .values()
            .filter(|inv| inv.status.is_payable() && inv.due_date >= from && inv.due_date <= to)
            .cloned()
            .collect();

        due.sort_by(|a, b| {
            a.due_date
                .cmp(&b.due_date)
                .then_with(|| a.invoice_id.cmp(&b.invoice_id))
        });

        Ok(due)
    }

    async fn increment_sequence(&self) -> Result<i64, InvoicingError> {
        let mut state = self.state.lock().await;
        self.bump(&mut state)
    }

    async fn stats_for_user(&self, user_id: Uuid) -> Result<Vec<StatusSummary>, InvoicingError> {
        let state = self.state.lock().await;
        let mut by_status: HashMap<_, StatusSummary> = HashMap::new();

        for invoice in state.invoices.values().filter(|inv| inv.user_id == user_id) {
            let entry = by_status.entry(invoice.status).or_insert(StatusSummary {
                status: invoice.status,
                count: 0,
                total_amount: 0,
            });
            entry.count += 1;
            entry.total_amount += invoice.total;
        }

        Ok(by_status.into_values().collect())
    }

    async fn health_check(&self) -> Result<(), InvoicingError> {
        Ok(())
    }
}
