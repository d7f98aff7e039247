use axum::{
    extract::{Path, State},
    Json,
};
use service_core::error::AppError;
use uuid::Uuid;
use validator::Validate;

use crate::dtos::{ReminderListResponse, ScheduleReminderRequest};
use crate::models::ScheduleOutcome;
use crate::startup::AppState;

#[tracing::instrument(skip(state, request))]
pub async fn schedule_reminder(
    State(state): State<AppState>,
    Path(invoice_id): Path<Uuid>,
    Json(request): Json<ScheduleReminderRequest>,
) -> Result<Json<ScheduleOutcome>, AppError> {
    request.validate()?;

    let outcome = state
        .scheduler
        .schedule_one(invoice_id, &request.customer_email, request.offset_days)
        .await?;
    Ok(Json(outcome))
}

pub async fn list_reminders(State(state): State<AppState>) -> Json<ReminderListResponse> {
    let reminders = state.scheduler.list_reminders();
    Json(ReminderListResponse {
        count: reminders.len(),
        reminders,
    })
}
