//! Customer e-mail lookup.

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;
use uuid::Uuid;

use crate::error::InvoicingError;

#[async_trait]
pub trait CustomerDirectory: Send + Sync {
    async fn email_for_customer(&self, customer_id: Uuid) -> Result<String, InvoicingError>;
}

#[derive(Debug, Deserialize)]
struct CustomerResponse {
    email: String,
}

/// Looks customers up through customer-service's `GET /customers/{id}`.
#[derive(Clone)]
pub struct HttpCustomerDirectory {
    client: reqwest::Client,
    base_url: String,
}

impl HttpCustomerDirectory {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, InvoicingError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| {
                InvoicingError::CollaboratorFailure(anyhow::anyhow!(
                    "Failed to build customer client: {}",
                    e
                ))
            })?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl CustomerDirectory for HttpCustomerDirectory {
    async fn email_for_customer(&self, customer_id: Uuid) -> Result<String, InvoicingError> {
        let response = self
            .client
            .get(format!("{}/customers/{}", self.base_url, customer_id))
            .send()
            .await
            .map_err(|e| {
                InvoicingError::CollaboratorFailure(anyhow::anyhow!("Customer lookup failed: {}", e))
            })?;

        match response.status() {
            StatusCode::NOT_FOUND => Err(InvoicingError::NotFound(format!("Customer {}", customer_id))),
            status if !status.is_success() => Err(InvoicingError::CollaboratorFailure(
                anyhow::anyhow!("Customer lookup returned {}", status),
            )),
            _ => {
                let customer: CustomerResponse = response.json().await.map_err(|e| {
                    InvoicingError::CollaboratorFailure(anyhow::anyhow!(
                        "Invalid customer response: {}",
                        e
                    ))
                })?;
                Ok(customer.email)
            }
        }
    }
}

/// Fixed customer-to-email table.
#[derive(Debug, Default, Clone)]
pub struct StaticCustomerDirectory {
    emails: HashMap<Uuid, String>,
}

impl StaticCustomerDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_customer(mut self, customer_id: Uuid, email: impl Into<String>) -> Self {
        self.emails.insert(customer_id, email.into());
        self
    }
}

#[async_trait]
impl CustomerDirectory for StaticCustomerDirectory {
    async fn email_for_customer(&self, customer_id: Uuid) -> Result<String, InvoicingError> {
        self.emails
            .get(&customer_id)
            .cloned()
            .ok_or_else(|| InvoicingError::NotFound(format!("Customer {}", customer_id)))
    }
}
