//! PostgreSQL store integration tests.
//!
//! Run with `TEST_DATABASE_URL` pointing at a scratch database.

mod common;

use common::{date, item, new_invoice};
use invoicing_service::models::{InvoiceStatus, NewInvoice};
use invoicing_service::scheduler::ReminderScheduler;
use invoicing_service::services::{
    InvoiceService, InvoiceStore, LoggingNotificationSender, NotificationDispatcher,
    PgInvoiceStore, StaticCustomerDirectory, TracingActivityPublisher,
};
use service_core::retry::RetryConfig;
use std::collections::HashSet;
use std::sync::Arc;
use uuid::Uuid;

async fn pg_store() -> Arc<PgInvoiceStore> {
    let url = std::env::var("TEST_DATABASE_URL").expect("TEST_DATABASE_URL must be set");
    let store = PgInvoiceStore::connect(&url, 5, 1)
        .await
        .expect("Failed to connect to PostgreSQL");
    store.run_migrations().await.expect("Failed to run migrations");
    Arc::new(store)
}

fn service(store: Arc<dyn InvoiceStore>) -> InvoiceService {
    InvoiceService::new(
        store,
        Arc::new(NotificationDispatcher::new(
            Arc::new(LoggingNotificationSender),
            RetryConfig::notification(),
        )),
        Arc::new(StaticCustomerDirectory::new()),
        Arc::new(TracingActivityPublisher),
    )
}

fn input(user_id: Uuid, day: u32) -> NewInvoice {
    new_invoice(user_id, Uuid::new_v4(), date(2025, 3, day), date(2025, 4, day))
}

#[tokio::test]
#[ignore] // Requires PostgreSQL
async fn invoice_round_trips_with_items() {
    let store = pg_store().await;
    let service = service(store.clone());
    let user_id = Uuid::new_v4();

    let mut new = input(user_id, 1);
    new.items = vec![item("Design", 1, 5_000), item("Build", 3, 2_000)];
    let created = service.create(new).await.unwrap();

    let invoice = service.get(created.invoice_id).await.unwrap();
    assert_eq!(invoice.invoice_number, created.invoice_number);
    assert_eq!(invoice.items.len(), 2);
    assert_eq!(invoice.items[1].description, "Build");
    assert_eq!(invoice.subtotal, 11_000);
    assert_eq!(invoice.total, invoice.subtotal - invoice.discount_amount);
    assert_eq!(invoice.status, InvoiceStatus::Pending);
}

#[tokio::test]
#[ignore] // Requires PostgreSQL
async fn concurrent_creates_get_distinct_numbers() {
    let store = pg_store().await;
    let service = Arc::new(service(store.clone()));
    let user_id = Uuid::new_v4();

    let tasks = (1..=20).map(|day| {
        let service = Arc::clone(&service);
        tokio::spawn(async move { service.create(input(user_id, day)).await })
    });

    let numbers: HashSet<String> = futures::future::join_all(tasks)
        .await
        .into_iter()
        .map(|joined| joined.unwrap().unwrap().invoice_number)
        .collect();
    assert_eq!(numbers.len(), 20);

    let page = service.list(user_id, Some(100), None).await.unwrap();
    assert_eq!(page.invoices.len(), 20);
    assert_eq!(page.invoices[0].issue_date, date(2025, 3, 20));
}

#[tokio::test]
#[ignore] // Requires PostgreSQL
async fn due_scan_skips_paid_invoices() {
    let store = pg_store().await;
    let dyn_store: Arc<dyn InvoiceStore> = store.clone();
    let service = service(dyn_store.clone());
    let user_id = Uuid::new_v4();

    let open = service.create(input(user_id, 10)).await.unwrap();
    let paid = service.create(input(user_id, 11)).await.unwrap();
    let mut invoice = service.get(paid.invoice_id).await.unwrap();
    invoice.status = InvoiceStatus::Paid;
    store.update(invoice).await.unwrap();

    let due = store
        .list_due_within(date(2025, 4, 10), date(2025, 4, 11))
        .await
        .unwrap();
    let ids: HashSet<Uuid> = due.iter().map(|inv| inv.invoice_id).collect();

    assert!(ids.contains(&open.invoice_id));
    assert!(!ids.contains(&paid.invoice_id));

    let scheduler = ReminderScheduler::new(
        dyn_store,
        Arc::new(StaticCustomerDirectory::new()),
        Arc::new(NotificationDispatcher::new(
            Arc::new(LoggingNotificationSender),
            RetryConfig::notification(),
        )),
        Arc::new(TracingActivityPublisher),
        Default::default(),
    );
    let report = scheduler.run_cycle_at(date(2025, 4, 9)).await.unwrap();
    assert!(report.invoices_scanned >= 1);
}

#[tokio::test]
#[ignore] // Requires PostgreSQL
async fn stats_group_by_status() {
    let store = pg_store().await;
    let service = service(store.clone());
    let user_id = Uuid::new_v4();

    service.create(input(user_id, 1)).await.unwrap();
    service.create(input(user_id, 2)).await.unwrap();

    let stats = service.stats(user_id).await.unwrap();
    assert_eq!(stats.total_count, 2);
    assert_eq!(stats.for_status(InvoiceStatus::Pending).unwrap().count, 2);
}
