use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use service_core::error::AppError;
use uuid::Uuid;

use crate::dtos::{ListInvoicesParams, SendInvoiceResponse};
use crate::models::{CreatedInvoice, Invoice, InvoicePage, InvoiceStats, InvoiceUpdate, NewInvoice};
use crate::startup::AppState;

#[tracing::instrument(skip(state, request))]
pub async fn create_invoice(
    State(state): State<AppState>,
    Json(request): Json<NewInvoice>,
) -> Result<(StatusCode, Json<CreatedInvoice>), AppError> {
    let created = state.invoices.create(request).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

#[tracing::instrument(skip(state))]
pub async fn get_invoice(
    State(state): State<AppState>,
    Path(invoice_id): Path<Uuid>,
) -> Result<Json<Invoice>, AppError> {
    Ok(Json(state.invoices.get(invoice_id).await?))
}

#[tracing::instrument(skip(state, request))]
pub async fn update_invoice(
    State(state): State<AppState>,
    Path(invoice_id): Path<Uuid>,
    Json(request): Json<InvoiceUpdate>,
) -> Result<Json<Invoice>, AppError> {
    Ok(Json(state.invoices.update(invoice_id, request).await?))
}

#[tracing::instrument(skip(state))]
pub async fn send_invoice(
    State(state): State<AppState>,
    Path(invoice_id): Path<Uuid>,
) -> Result<Json<SendInvoiceResponse>, AppError> {
    let sent = state.invoices.send_invoice(invoice_id).await?;
    Ok(Json(SendInvoiceResponse {
        invoice_id: sent.invoice_id,
        status: "sent".to_string(),
        recipient: sent.recipient,
        attempts: sent.attempts,
    }))
}

#[tracing::instrument(skip(state, params))]
pub async fn list_invoices(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
    Query(params): Query<ListInvoicesParams>,
) -> Result<Json<InvoicePage>, AppError> {
    let page = state
        .invoices
        .list(user_id, params.page_size, params.page_token.as_deref())
        .await?;
    Ok(Json(page))
}

#[tracing::instrument(skip(state))]
pub async fn invoice_stats(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> Result<Json<InvoiceStats>, AppError> {
    Ok(Json(state.invoices.stats(user_id).await?))
}
