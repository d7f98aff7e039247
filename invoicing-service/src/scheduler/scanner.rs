//! Due-invoice scan.

use chrono::{Days, NaiveDate};
use std::sync::Arc;
use tracing::{debug, instrument};

use crate::error::InvoicingError;
use crate::models::Invoice;
use crate::services::store::InvoiceStore;

#[derive(Clone)]
pub struct DueInvoiceScanner {
    store: Arc<dyn InvoiceStore>,
}

impl DueInvoiceScanner {
    pub fn new(store: Arc<dyn InvoiceStore>) -> Self {
        Self { store }
    }

    /// Last due date covered by a scan on `today`.
    pub fn window_end(today: NaiveDate, lookahead_days: u32) -> NaiveDate {
        today
            .checked_add_days(Days::new(u64::from(lookahead_days)))
            .unwrap_or(NaiveDate::MAX)
    }

    /// Payable invoices due within `[today, today + lookahead_days]`.
    #[instrument(skip(self))]
    pub async fn scan(
        &self,
        today: NaiveDate,
        lookahead_days: u32,
    ) -> Result<Vec<Invoice>, InvoicingError> {
        let invoices = self
            .store
            .list_due_within(today, Self::window_end(today, lookahead_days))
            .await?;

        debug!(count = invoices.len(), "Due invoices scanned");

        Ok(invoices)
    }
}
