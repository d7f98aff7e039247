//! Invoice operations: create, read, update, list, send and stats.

use chrono::Utc;
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;
use validator::Validate;

use crate::error::InvoicingError;
use crate::models::{
    ActivityEvent, CreatedInvoice, Invoice, InvoiceItem, InvoicePage, InvoiceStats, InvoiceStatus,
    InvoiceUpdate, NewInvoice,
};
use crate::services::activity::ActivityPublisher;
use crate::services::amounts::{self, InvoiceAmounts};
use crate::services::customers::CustomerDirectory;
use crate::services::dispatcher::NotificationDispatcher;
use crate::services::metrics::{INVOICES_CREATED_TOTAL, INVOICE_AMOUNT_TOTAL};
use crate::services::pagination::PageRequest;
use crate::services::store::InvoiceStore;
use crate::services::templates;

/// Delivery result of `send_invoice`.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct SentInvoice {
    pub invoice_id: Uuid,
    pub recipient: String,
    pub attempts: u32,
}

#[derive(Clone)]
pub struct InvoiceService {
    store: Arc<dyn InvoiceStore>,
    dispatcher: Arc<NotificationDispatcher>,
    customers: Arc<dyn CustomerDirectory>,
    activity: Arc<dyn ActivityPublisher>,
    strict_page_tokens: bool,
}

impl InvoiceService {
    pub fn new(
        store: Arc<dyn InvoiceStore>,
        dispatcher: Arc<NotificationDispatcher>,
        customers: Arc<dyn CustomerDirectory>,
        activity: Arc<dyn ActivityPublisher>,
    ) -> Self {
        Self {
            store,
            dispatcher,
            customers,
            activity,
            strict_page_tokens: false,
        }
    }

    /// Reject malformed page tokens instead of restarting at the first page.
    pub fn with_strict_page_tokens(mut self, strict: bool) -> Self {
        self.strict_page_tokens = strict;
        self
    }

    #[instrument(skip(self, input), fields(user_id = %input.user_id, customer_id = %input.customer_id))]
    pub async fn create(&self, input: NewInvoice) -> Result<CreatedInvoice, InvoicingError> {
        input.validate()?;
        check_dates_and_amounts(&input.issue_date, &input.due_date, &input.items)?;

        let InvoiceAmounts {
            subtotal,
            discount_amount,
            total,
        } = amounts::compute(&input.items, input.discount_bp);
        let now = Utc::now();

        let invoice = Invoice {
            invoice_id: Uuid::new_v4(),
            user_id: input.user_id,
            customer_id: input.customer_id,
            invoice_number: String::new(),
            status: InvoiceStatus::Pending,
            issue_date: input.issue_date,
            due_date: input.due_date,
            currency: input.currency.to_uppercase(),
            items: input.items,
            discount_bp: input.discount_bp,
            subtotal,
            discount_amount,
            total,
            payment_info: input.payment_info,
            note: input.note,
            created_at: now,
            updated_at: now,
        };

        let invoice = self.store.create(invoice).await?;

        INVOICES_CREATED_TOTAL
            .with_label_values(&[invoice.currency.as_str()])
            .inc();
        INVOICE_AMOUNT_TOTAL
            .with_label_values(&[invoice.currency.as_str()])
            .inc_by(invoice.total as f64);

        info!(
            invoice_id = %invoice.invoice_id,
            invoice_number = %invoice.invoice_number,
            total = invoice.total,
            "Invoice created"
        );

        self.activity
            .publish(ActivityEvent::InvoiceCreated {
                invoice_id: invoice.invoice_id,
                user_id: invoice.user_id,
                invoice_number: invoice.invoice_number.clone(),
                total: invoice.total,
                currency: invoice.currency.clone(),
            })
            .await;

        Ok(CreatedInvoice {
            invoice_id: invoice.invoice_id,
            invoice_number: invoice.invoice_number,
        })
    }

    #[instrument(skip(self), fields(invoice_id = %invoice_id))]
    pub async fn get(&self, invoice_id: Uuid) -> Result<Invoice, InvoicingError> {
        self.store
            .get_by_id(invoice_id)
            .await?
            .ok_or_else(|| InvoicingError::NotFound(format!("Invoice {}", invoice_id)))
    }

    #[instrument(skip(self, input), fields(invoice_id = %invoice_id))]
    pub async fn update(
        &self,
        invoice_id: Uuid,
        input: InvoiceUpdate,
    ) -> Result<Invoice, InvoicingError> {
        input.validate()?;
        check_dates_and_amounts(&input.issue_date, &input.due_date, &input.items)?;

        let current = self.get(invoice_id).await?;
        let InvoiceAmounts {
            subtotal,
            discount_amount,
            total,
        } = amounts::compute(&input.items, input.discount_bp);

        let updated = Invoice {
            customer_id: input.customer_id,
            status: input.status.unwrap_or(current.status),
            issue_date: input.issue_date,
            due_date: input.due_date,
            currency: input.currency.to_uppercase(),
            items: input.items,
            discount_bp: input.discount_bp,
            subtotal,
            discount_amount,
            total,
            payment_info: input.payment_info,
            note: input.note,
            updated_at: Utc::now(),
            ..current
        };

        let invoice = self.store.update(updated).await?;

        info!(total = invoice.total, status = invoice.status.as_str(), "Invoice updated");

        self.activity
            .publish(ActivityEvent::InvoiceUpdated {
                invoice_id: invoice.invoice_id,
                user_id: invoice.user_id,
                total: invoice.total,
            })
            .await;

        Ok(invoice)
    }

    /// One page of a user's invoices, newest issue date first.
    #[instrument(skip(self, page_token), fields(user_id = %user_id))]
    pub async fn list(
        &self,
        user_id: Uuid,
        page_size: Option<u32>,
        page_token: Option<&str>,
    ) -> Result<InvoicePage, InvoicingError> {
        let page = PageRequest::resolve(page_size, page_token, self.strict_page_tokens)?;
        let invoices = self
            .store
            .list_by_user(user_id, page.limit, page.offset)
            .await?;
        let next_page_token = page.next_token(invoices.len());

        Ok(InvoicePage {
            invoices,
            next_page_token,
        })
    }

    /// E-mail the invoice to its customer.
    #[instrument(skip(self), fields(invoice_id = %invoice_id))]
    pub async fn send_invoice(&self, invoice_id: Uuid) -> Result<SentInvoice, InvoicingError> {
        let invoice = self.get(invoice_id).await?;
        let recipient = self.customers.email_for_customer(invoice.customer_id).await?;

        let receipt = self
            .dispatcher
            .send(
                &recipient,
                templates::INVOICE_SUBJECT,
                &templates::invoice_message(&invoice),
            )
            .await?;

        self.activity
            .publish(ActivityEvent::InvoiceSent {
                invoice_id,
                user_id: invoice.user_id,
                recipient: recipient.clone(),
            })
            .await;

        Ok(SentInvoice {
            invoice_id,
            recipient,
            attempts: receipt.attempts,
        })
    }

    #[instrument(skip(self), fields(user_id = %user_id))]
    pub async fn stats(&self, user_id: Uuid) -> Result<InvoiceStats, InvoicingError> {
        let summaries = self.store.stats_for_user(user_id).await?;
        Ok(InvoiceStats::from_summaries(user_id, &summaries))
    }
}

fn check_dates_and_amounts(
    issue_date: &chrono::NaiveDate,
    due_date: &chrono::NaiveDate,
    items: &[InvoiceItem],
) -> Result<(), InvoicingError> {
    if due_date < issue_date {
        return Err(InvoicingError::InvalidRequest(
            "due_date must not be before issue_date".to_string(),
        ));
    }
    if !amounts::fits_in_minor_units(items) {
        return Err(InvoicingError::InvalidRequest(
            "invoice subtotal exceeds the supported amount range".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PaymentInfo;
    use crate::services::activity::TracingActivityPublisher;
    use crate::services::customers::StaticCustomerDirectory;
    use crate::services::memory::InMemoryInvoiceStore;
    use crate::services::notifier::LoggingNotificationSender;
    use chrono::NaiveDate;
    use service_core::retry::RetryConfig;

    fn service() -> InvoiceService {
        let dispatcher = NotificationDispatcher::new(
            Arc::new(LoggingNotificationSender),
            RetryConfig::notification(),
        );
        InvoiceService::new(
            Arc::new(InMemoryInvoiceStore::new()),
            Arc::new(dispatcher),
            Arc::new(StaticCustomerDirectory::new()),
            Arc::new(TracingActivityPublisher),
        )
    }

    fn new_invoice(discount_bp: i64) -> NewInvoice {
        NewInvoice {
            user_id: Uuid::new_v4(),
            customer_id: Uuid::new_v4(),
            issue_date: NaiveDate::from_ymd_opt(2025, 5, 1).unwrap(),
            due_date: NaiveDate::from_ymd_opt(2025, 5, 31).unwrap(),
            currency: "usd".to_string(),
            items: vec![InvoiceItem {
                description: "Design work".to_string(),
                quantity: 2,
                unit_price: 10_000,
            }],
            discount_bp,
            payment_info: PaymentInfo::default(),
            note: String::new(),
        }
    }

    #[tokio::test]
    async fn create_computes_amounts_and_starts_pending() {
        let service = service();

        let created = service.create(new_invoice(1_000)).await.unwrap();
        let invoice = service.get(created.invoice_id).await.unwrap();

        assert_eq!(created.invoice_number, "000001");
        assert_eq!(invoice.status, InvoiceStatus::Pending);
        assert_eq!(invoice.currency, "USD");
        assert_eq!(invoice.subtotal, 20_000);
        assert_eq!(invoice.discount_amount, 2_000);
        assert_eq!(invoice.total, 18_000);
    }

    #[tokio::test]
    async fn create_rejects_due_date_before_issue_date() {
        let service = service();
        let mut input = new_invoice(0);
        input.due_date = NaiveDate::from_ymd_opt(2025, 4, 1).unwrap();

        assert!(matches!(
            service.create(input).await,
            Err(InvoicingError::InvalidRequest(_))
        ));
    }

    #[tokio::test]
    async fn create_rejects_invalid_discount() {
        let service = service();
        assert!(matches!(
            service.create(new_invoice(10_001)).await,
            Err(InvoicingError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn get_unknown_invoice_is_not_found() {
        assert!(matches!(
            service().get(Uuid::new_v4()).await,
            Err(InvoicingError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn send_invoice_needs_a_known_customer() {
        let service = service();
        let created = service.create(new_invoice(0)).await.unwrap();

        assert!(matches!(
            service.send_invoice(created.invoice_id).await,
            Err(InvoicingError::NotFound(_))
        ));
    }
}
