//! Invoice engine integration tests: numbering, amounts, paging and stats.

mod common;

use common::{date, item, new_invoice, unchanged, TestHarness};
use futures::future::join_all;
use invoicing_service::models::InvoiceStatus;
use invoicing_service::scheduler::SchedulerSettings;
use invoicing_service::services::{InvoiceStore, NumberSequencer};
use invoicing_service::InvoicingError;
use std::collections::HashSet;
use std::sync::Arc;
use uuid::Uuid;

#[tokio::test]
async fn first_invoice_gets_number_000001_and_computed_amounts() {
    let harness = TestHarness::new();

    let invoice = harness
        .create_invoice(date(2025, 5, 1), date(2025, 5, 31))
        .await;

    assert_eq!(invoice.invoice_number, "000001");
    assert_eq!(invoice.status, InvoiceStatus::Pending);
    assert_eq!(invoice.subtotal, 20_000);
    assert_eq!(invoice.discount_amount, 2_000);
    assert_eq!(invoice.total, 18_000);
    assert_eq!(invoice.payment_info.bank_name, "First Bank");
}

#[tokio::test]
async fn concurrent_creates_receive_distinct_numbers() {
    let harness = TestHarness::new();

    let tasks = (0..50).map(|_| {
        let invoices = Arc::clone(&harness.invoices);
        let input = new_invoice(
            harness.user_id,
            harness.customer_id,
            date(2025, 5, 1),
            date(2025, 5, 31),
        );
        tokio::spawn(async move { invoices.create(input).await })
    });

    let numbers: HashSet<String> = join_all(tasks)
        .await
        .into_iter()
        .map(|joined| joined.unwrap().unwrap().invoice_number)
        .collect();

    let expected: HashSet<String> = (1..=50).map(|n| format!("{:06}", n)).collect();
    assert_eq!(numbers, expected);
}

#[tokio::test]
async fn concurrent_sequencer_calls_never_repeat() {
    let harness = TestHarness::new();
    let store: Arc<dyn InvoiceStore> = harness.store.clone();
    let sequencer = NumberSequencer::new(store);

    let tasks = (0..50).map(|_| {
        let sequencer = sequencer.clone();
        tokio::spawn(async move { sequencer.next().await })
    });

    let numbers: Vec<String> = join_all(tasks)
        .await
        .into_iter()
        .map(|joined| joined.unwrap().unwrap())
        .collect();
    let distinct: HashSet<&String> = numbers.iter().collect();

    assert_eq!(numbers.len(), 50);
    assert_eq!(distinct.len(), 50);
}

#[tokio::test]
async fn sequencer_outage_fails_creation_without_leaving_a_row() {
    let harness = TestHarness::new();
    harness.store.set_sequencer_available(false);

    let result = harness
        .invoices
        .create(new_invoice(
            harness.user_id,
            harness.customer_id,
            date(2025, 5, 1),
            date(2025, 5, 31),
        ))
        .await;

    assert!(matches!(result, Err(InvoicingError::SequencerFailure(_))));
    let page = harness.invoices.list(harness.user_id, None, None).await.unwrap();
    assert!(page.invoices.is_empty());

    harness.store.set_sequencer_available(true);
    let invoice = harness
        .create_invoice(date(2025, 5, 1), date(2025, 5, 31))
        .await;
    assert_eq!(invoice.invoice_number, "000001");
}

#[tokio::test]
async fn update_replaces_items_and_recomputes_amounts() {
    let harness = TestHarness::new();
    let invoice = harness
        .create_invoice(date(2025, 5, 1), date(2025, 5, 31))
        .await;

    let mut update = unchanged(&invoice);
    update.items = vec![item("Hosting", 3, 3_333), item("Support", 1, 1)];
    update.discount_bp = 2_500;

    let updated = harness
        .invoices
        .update(invoice.invoice_id, update)
        .await
        .unwrap();

    assert_eq!(updated.items.len(), 2);
    assert_eq!(updated.items[0].description, "Hosting");
    assert_eq!(updated.subtotal, 10_000);
    assert_eq!(updated.discount_amount, 2_500);
    assert_eq!(updated.total, 7_500);
    assert_eq!(updated.invoice_number, invoice.invoice_number);
    assert_eq!(updated.created_at, invoice.created_at);

    let stored = harness.invoices.get(invoice.invoice_id).await.unwrap();
    assert_eq!(stored, updated);
}

#[tokio::test]
async fn update_of_unknown_invoice_is_not_found() {
    let harness = TestHarness::new();
    let invoice = harness
        .create_invoice(date(2025, 5, 1), date(2025, 5, 31))
        .await;

    let result = harness
        .invoices
        .update(Uuid::new_v4(), unchanged(&invoice))
        .await;

    assert!(matches!(result, Err(InvoicingError::NotFound(_))));
}

#[tokio::test]
async fn listing_pages_through_every_invoice_once() {
    let harness = TestHarness::new();
    for day in 1..=25 {
        harness
            .create_invoice(date(2025, 3, day), date(2025, 4, day))
            .await;
    }

    let mut seen = Vec::new();
    let mut sizes = Vec::new();
    let mut token: Option<String> = None;
    loop {
        let page = harness
            .invoices
            .list(harness.user_id, Some(10), token.as_deref())
            .await
            .unwrap();
        sizes.push(page.invoices.len());
        seen.extend(page.invoices);
        if page.next_page_token.is_empty() {
            break;
        }
        token = Some(page.next_page_token);
    }

    assert_eq!(sizes, vec![10, 10, 5]);
    let ids: HashSet<Uuid> = seen.iter().map(|inv| inv.invoice_id).collect();
    assert_eq!(ids.len(), 25);

    // Newest issue date first.
    assert_eq!(seen.first().unwrap().issue_date, date(2025, 3, 25));
    assert_eq!(seen.last().unwrap().issue_date, date(2025, 3, 1));
    assert!(seen
        .windows(2)
        .all(|pair| pair[0].issue_date >= pair[1].issue_date));
}

#[tokio::test]
async fn same_issue_date_orders_by_invoice_number_descending() {
    let harness = TestHarness::new();
    for _ in 0..3 {
        harness
            .create_invoice(date(2025, 3, 1), date(2025, 3, 31))
            .await;
    }

    let page = harness.invoices.list(harness.user_id, None, None).await.unwrap();
    let numbers: Vec<&str> = page
        .invoices
        .iter()
        .map(|inv| inv.invoice_number.as_str())
        .collect();

    assert_eq!(numbers, vec!["000003", "000002", "000001"]);
    assert!(page.next_page_token.is_empty());
}

#[tokio::test]
async fn listing_only_returns_the_users_invoices() {
    let harness = TestHarness::new();
    harness
        .create_invoice(date(2025, 3, 1), date(2025, 3, 31))
        .await;

    let page = harness.invoices.list(Uuid::new_v4(), None, None).await.unwrap();
    assert!(page.invoices.is_empty());
    assert!(page.next_page_token.is_empty());
}

#[tokio::test]
async fn malformed_page_token_restarts_listing_by_default() {
    let harness = TestHarness::new();
    harness
        .create_invoice(date(2025, 3, 1), date(2025, 3, 31))
        .await;

    let page = harness
        .invoices
        .list(harness.user_id, Some(10), Some("not a token!"))
        .await
        .unwrap();

    assert_eq!(page.invoices.len(), 1);
}

#[tokio::test]
async fn malformed_page_token_is_rejected_in_strict_mode() {
    let harness = TestHarness::with_settings(SchedulerSettings::default(), true);
    harness
        .create_invoice(date(2025, 3, 1), date(2025, 3, 31))
        .await;

    let result = harness
        .invoices
        .list(harness.user_id, Some(10), Some("not a token!"))
        .await;

    assert!(matches!(result, Err(InvoicingError::InvalidRequest(_))));
}

#[tokio::test]
async fn stats_break_totals_down_by_status() {
    let harness = TestHarness::new();
    let first = harness
        .create_invoice(date(2025, 3, 1), date(2025, 3, 31))
        .await;
    harness
        .create_invoice(date(2025, 3, 2), date(2025, 4, 1))
        .await;

    let mut paid = unchanged(&first);
    paid.status = Some(InvoiceStatus::Paid);
    harness
        .invoices
        .update(first.invoice_id, paid)
        .await
        .unwrap();

    let stats = harness.invoices.stats(harness.user_id).await.unwrap();

    assert_eq!(stats.total_count, 2);
    assert_eq!(stats.total_amount, 36_000);
    assert_eq!(stats.by_status.len(), InvoiceStatus::ALL.len());
    assert_eq!(stats.for_status(InvoiceStatus::Paid).unwrap().count, 1);
    assert_eq!(stats.for_status(InvoiceStatus::Pending).unwrap().count, 1);
    assert_eq!(stats.for_status(InvoiceStatus::Overdue).unwrap().count, 0);
}

#[tokio::test]
async fn send_invoice_delivers_to_the_customer() {
    let harness = TestHarness::new();
    let invoice = harness
        .create_invoice(date(2025, 3, 1), date(2025, 3, 31))
        .await;

    let sent = harness.invoices.send_invoice(invoice.invoice_id).await.unwrap();

    assert_eq!(sent.recipient, common::CUSTOMER_EMAIL);
    assert_eq!(sent.attempts, 1);
    let messages = harness.sender.sent();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].subject, "Your Invoice");
    assert!(messages[0].body.contains(&invoice.invoice_number));
}
