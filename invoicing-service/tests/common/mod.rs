//! Test helper module for invoicing-service integration tests.
//!
//! Everything runs against the in-memory store; the notification sender records
//! what it is asked to deliver and can be told to fail.

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::NaiveDate;
use invoicing_service::{
    config::{
        DatabaseConfig, InvoicingConfig, NotificationConfig, ReminderConfig, StoreKind,
    },
    models::{Invoice, InvoiceItem, InvoiceUpdate, NewInvoice, PaymentInfo},
    scheduler::{ReminderScheduler, SchedulerSettings},
    services::{
        EmailMessage, InMemoryInvoiceStore, InvoiceService, InvoiceStore, NotificationDispatcher,
        NotificationSender, SendError, StaticCustomerDirectory, TracingActivityPublisher,
    },
    Application,
};
use service_core::retry::RetryConfig;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use uuid::Uuid;

pub const CUSTOMER_EMAIL: &str = "billing@acme.test";

/// Sender that records delivered messages.
#[derive(Default)]
pub struct RecordingSender {
    sent: Mutex<Vec<EmailMessage>>,
    failing: AtomicBool,
    attempts: AtomicU32,
    delay_ms: AtomicU64,
}

impl RecordingSender {
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Hold every send for `delay` before answering.
    pub fn set_delay(&self, delay: Duration) {
        self.delay_ms.store(delay.as_millis() as u64, Ordering::SeqCst);
    }

    pub fn sent(&self) -> Vec<EmailMessage> {
        self.sent.lock().unwrap().clone()
    }

    pub fn attempts(&self) -> u32 {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl NotificationSender for RecordingSender {
    async fn send(&self, message: &EmailMessage) -> Result<(), SendError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        let delay_ms = self.delay_ms.load(Ordering::SeqCst);
        if delay_ms > 0 {
            tokio::time::sleep(Duration::from_millis(delay_ms)).await;
        }
        if self.failing.load(Ordering::SeqCst) {
            return Err(SendError::Rejected {
                status: 503,
                body: "mail relay unavailable".to_string(),
            });
        }
        self.sent.lock().unwrap().push(message.clone());
        Ok(())
    }
}

/// In-process wiring of the invoice engine and the reminder scheduler.
pub struct TestHarness {
    pub store: Arc<InMemoryInvoiceStore>,
    pub sender: Arc<RecordingSender>,
    pub invoices: Arc<InvoiceService>,
    pub scheduler: Arc<ReminderScheduler>,
    pub user_id: Uuid,
    pub customer_id: Uuid,
}

impl TestHarness {
    pub fn new() -> Self {
        Self::with_settings(SchedulerSettings::default(), false)
    }

    pub fn with_settings(settings: SchedulerSettings, strict_page_tokens: bool) -> Self {
        let store = Arc::new(InMemoryInvoiceStore::new());
        let sender = Arc::new(RecordingSender::default());
        let customer_id = Uuid::new_v4();

        let dyn_store: Arc<dyn InvoiceStore> = store.clone();
        let dyn_sender: Arc<dyn NotificationSender> = sender.clone();
        let customers = Arc::new(StaticCustomerDirectory::new().with_customer(customer_id, CUSTOMER_EMAIL));
        let activity = Arc::new(TracingActivityPublisher);
        let dispatcher = Arc::new(NotificationDispatcher::new(
            dyn_sender,
            RetryConfig::notification(),
        ));

        let invoices = Arc::new(
            InvoiceService::new(
                dyn_store.clone(),
                dispatcher.clone(),
                customers.clone(),
                activity.clone(),
            )
            .with_strict_page_tokens(strict_page_tokens),
        );
        let scheduler = Arc::new(ReminderScheduler::new(
            dyn_store,
            customers,
            dispatcher,
            activity,
            settings,
        ));

        Self {
            store,
            sender,
            invoices,
            scheduler,
            user_id: Uuid::new_v4(),
            customer_id,
        }
    }

    /// Create an invoice for the harness user and customer.
    pub async fn create_invoice(&self, issue_date: NaiveDate, due_date: NaiveDate) -> Invoice {
        let created = self
            .invoices
            .create(new_invoice(self.user_id, self.customer_id, issue_date, due_date))
            .await
            .expect("Failed to create invoice");
        self.invoices
            .get(created.invoice_id)
            .await
            .expect("Failed to load invoice")
    }
}

pub fn date(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).expect("valid date")
}

pub fn item(description: &str, quantity: i64, unit_price: i64) -> InvoiceItem {
    InvoiceItem {
        description: description.to_string(),
        quantity,
        unit_price,
    }
}

pub fn new_invoice(
    user_id: Uuid,
    customer_id: Uuid,
    issue_date: NaiveDate,
    due_date: NaiveDate,
) -> NewInvoice {
    NewInvoice {
        user_id,
        customer_id,
        issue_date,
        due_date,
        currency: "USD".to_string(),
        items: vec![item("Consulting", 2, 10_000)],
        discount_bp: 1_000,
        payment_info: PaymentInfo {
            account_name: "Acme Ltd".to_string(),
            account_number: "00012345".to_string(),
            bank_name: "First Bank".to_string(),
            routing_number: "021000021".to_string(),
        },
        note: "Thank you for your business".to_string(),
    }
}

/// Update that keeps every field of `invoice` as it is.
pub fn unchanged(invoice: &Invoice) -> InvoiceUpdate {
    InvoiceUpdate {
        customer_id: invoice.customer_id,
        status: Some(invoice.status),
        issue_date: invoice.issue_date,
        due_date: invoice.due_date,
        currency: invoice.currency.clone(),
        items: invoice.items.clone(),
        discount_bp: invoice.discount_bp,
        payment_info: invoice.payment_info.clone(),
        note: invoice.note.clone(),
    }
}

/// A running HTTP server backed by the in-memory store.
pub struct TestApp {
    pub address: String,
    pub port: u16,
    client: reqwest::Client,
}

impl TestApp {
    pub async fn spawn() -> Self {
        Self::spawn_with(|_| {}).await
    }

    /// Spawn with test defaults adjusted by `configure`.
    pub async fn spawn_with(configure: impl FnOnce(&mut InvoicingConfig)) -> Self {
        let mut config = InvoicingConfig {
            common: service_core::config::Config { port: 0 },
            service_name: "invoicing-service-test".to_string(),
            log_level: "warn".to_string(),
            otlp_endpoint: None,
            store: StoreKind::Memory,
            database: DatabaseConfig {
                url: None,
                max_connections: 1,
                min_connections: 0,
            },
            notification: NotificationConfig {
                service_url: None,
                timeout: Duration::from_secs(1),
                max_attempts: 1,
                initial_backoff: Duration::from_millis(1),
            },
            customer_service_url: None,
            customer_service_timeout: Duration::from_secs(1),
            reminders: ReminderConfig {
                enabled: false,
                settings: SchedulerSettings::default(),
            },
            strict_page_tokens: false,
        };
        configure(&mut config);

        let app = Application::build(config)
            .await
            .expect("Failed to build application");
        let port = app.port();
        tokio::spawn(app.run_until_stopped(std::future::pending()));

        Self {
            address: format!("http://127.0.0.1:{}", port),
            port,
            client: reqwest::Client::new(),
        }
    }

    pub fn client(&self) -> &reqwest::Client {
        &self.client
    }
}
