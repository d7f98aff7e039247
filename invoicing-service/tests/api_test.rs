//! HTTP API integration tests for invoicing-service.

mod common;

use common::TestApp;
use serde_json::{json, Value};
use std::time::Duration;
use tokio::net::TcpListener;
use uuid::Uuid;

fn invoice_body(user_id: Uuid, discount_bp: i64) -> Value {
    json!({
        "user_id": user_id,
        "customer_id": Uuid::new_v4(),
        "issue_date": "2025-05-01",
        "due_date": "2025-05-31",
        "currency": "usd",
        "items": [
            { "description": "Consulting", "quantity": 2, "unit_price": 10000 }
        ],
        "discount_bp": discount_bp
    })
}

#[tokio::test]
async fn health_check_returns_200() {
    let app = TestApp::spawn().await;

    let response = app
        .client()
        .get(format!("{}/health", app.address))
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(response.status(), 200);
    let body: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(body["status"], "ok");
    assert_eq!(body["service"], "invoicing-service");
}

#[tokio::test]
async fn create_then_fetch_invoice() {
    let app = TestApp::spawn().await;
    let user_id = Uuid::new_v4();

    let response = app
        .client()
        .post(format!("{}/invoices", app.address))
        .json(&invoice_body(user_id, 1000))
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(response.status(), 201);
    let created: Value = response.json().await.unwrap();
    assert_eq!(created["invoice_number"], "000001");

    let invoice_id = created["invoice_id"].as_str().unwrap();
    let response = app
        .client()
        .get(format!("{}/invoices/{}", app.address, invoice_id))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
    let invoice: Value = response.json().await.unwrap();
    assert_eq!(invoice["currency"], "USD");
    assert_eq!(invoice["status"], "pending");
    assert_eq!(invoice["subtotal"], 20000);
    assert_eq!(invoice["discount_amount"], 2000);
    assert_eq!(invoice["total"], 18000);
}

#[tokio::test]
async fn list_returns_the_users_invoices() {
    let app = TestApp::spawn().await;
    let user_id = Uuid::new_v4();

    for _ in 0..3 {
        let response = app
            .client()
            .post(format!("{}/invoices", app.address))
            .json(&invoice_body(user_id, 0))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 201);
    }

    let response = app
        .client()
        .get(format!(
            "{}/users/{}/invoices?page_size=2",
            app.address, user_id
        ))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
    let page: Value = response.json().await.unwrap();
    assert_eq!(page["invoices"].as_array().unwrap().len(), 2);
    assert!(!page["next_page_token"].as_str().unwrap().is_empty());

    let stats: Value = app
        .client()
        .get(format!("{}/users/{}/invoices/stats", app.address, user_id))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(stats["total_count"], 3);
}

#[tokio::test]
async fn unknown_invoice_returns_404() {
    let app = TestApp::spawn().await;

    let response = app
        .client()
        .get(format!("{}/invoices/{}", app.address, Uuid::new_v4()))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 404);
}

#[tokio::test]
async fn out_of_range_discount_returns_422() {
    let app = TestApp::spawn().await;

    let response = app
        .client()
        .post(format!("{}/invoices", app.address))
        .json(&invoice_body(Uuid::new_v4(), 20_000))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 422);
}

#[tokio::test]
async fn unsupported_reminder_offset_returns_400() {
    let app = TestApp::spawn().await;

    let created: Value = app
        .client()
        .post(format!("{}/invoices", app.address))
        .json(&invoice_body(Uuid::new_v4(), 0))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    let response = app
        .client()
        .post(format!(
            "{}/invoices/{}/reminders",
            app.address,
            created["invoice_id"].as_str().unwrap()
        ))
        .json(&json!({ "customer_email": "ap@customer.test", "offset_days": 5 }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 400);
}

#[tokio::test]
async fn scheduled_reminder_is_listed() {
    let app = TestApp::spawn().await;

    let created: Value = app
        .client()
        .post(format!("{}/invoices", app.address))
        .json(&invoice_body(Uuid::new_v4(), 0))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    let response = app
        .client()
        .post(format!(
            "{}/invoices/{}/reminders",
            app.address,
            created["invoice_id"].as_str().unwrap()
        ))
        .json(&json!({ "customer_email": "ap@customer.test", "offset_days": 3 }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
    let outcome: Value = response.json().await.unwrap();
    assert_eq!(outcome["status"], "sent");
    assert_eq!(outcome["offset_days"], 3);
    assert_eq!(outcome["trigger_at"], "2025-05-28T00:00:00Z");

    let listed: Value = app
        .client()
        .get(format!("{}/reminders", app.address))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(listed["count"], 1);
    assert_eq!(listed["reminders"][0]["state"], "acked");
}

#[tokio::test]
async fn unresponsive_customer_service_returns_502() {
    // Accepts connections and never answers them.
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let customer_service = format!("http://{}", listener.local_addr().unwrap());
    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((socket, _)) = listener.accept().await {
            held.push(socket);
        }
    });

    let app = TestApp::spawn_with(|config| {
        config.customer_service_url = Some(customer_service);
        config.customer_service_timeout = Duration::from_millis(200);
    })
    .await;

    let created: Value = app
        .client()
        .post(format!("{}/invoices", app.address))
        .json(&invoice_body(Uuid::new_v4(), 0))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    let response = app
        .client()
        .post(format!(
            "{}/invoices/{}/send",
            app.address,
            created["invoice_id"].as_str().unwrap()
        ))
        .timeout(Duration::from_secs(5))
        .send()
        .await
        .expect("Lookup timeout should answer before the client gives up");

    assert_eq!(response.status(), 502);
}
