//! Invoice number sequencing.
//!
//! The counter lives in the store. Invoice creation increments it inside the
//! creation transaction; [`NumberSequencer`] exposes the same increment on its
//! own.

use std::cmp::Ordering;
use std::sync::Arc;

use crate::error::InvoicingError;
use crate::services::store::InvoiceStore;

/// Render a counter value as an invoice number, zero-padded to 6 digits.
pub fn format_invoice_number(value: i64) -> String {
    format!("{:06}", value)
}

/// Compare invoice numbers by the counter value they render. Padding stops at
/// six digits, so a longer number is always the later one.
pub fn compare_invoice_numbers(a: &str, b: &str) -> Ordering {
    a.len().cmp(&b.len()).then_with(|| a.cmp(b))
}

#[derive(Clone)]
pub struct NumberSequencer {
    store: Arc<dyn InvoiceStore>,
}

impl NumberSequencer {
    pub fn new(store: Arc<dyn InvoiceStore>) -> Self {
        Self { store }
    }

    /// Reserve the next invoice number.
    pub async fn next(&self) -> Result<String, InvoicingError> {
        let value = self.store.increment_sequence().await?;
        Ok(format_invoice_number(value))
    }
}
