use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct ListInvoicesParams {
    pub page_size: Option<u32>,
    pub page_token: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SendInvoiceResponse {
    pub invoice_id: Uuid,
    pub status: String,
    pub recipient: String,
    pub attempts: u32,
}
