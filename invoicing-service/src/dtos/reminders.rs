use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::models::ReminderRecord;

#[derive(Debug, Deserialize, Validate)]
pub struct ScheduleReminderRequest {
    #[validate(email(message = "Invalid email address"))]
    pub customer_email: String,
    pub offset_days: i64,
}

#[derive(Debug, Serialize)]
pub struct ReminderListResponse {
    pub reminders: Vec<ReminderRecord>,
    pub count: usize,
}
