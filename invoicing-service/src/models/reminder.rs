//! Reminder schedule points and per-pair dispatch records.

use chrono::{DateTime, Days, NaiveDate, NaiveTime, SecondsFormat, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::error::InvoicingError;

/// Days before the due date at which a reminder goes out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub enum ReminderOffset {
    FourteenDays,
    SevenDays,
    ThreeDays,
    OneDay,
}

impl ReminderOffset {
    /// Every offset, furthest from the due date first.
    pub const ALL: [ReminderOffset; 4] = [
        ReminderOffset::FourteenDays,
        ReminderOffset::SevenDays,
        ReminderOffset::ThreeDays,
        ReminderOffset::OneDay,
    ];

    pub fn days(&self) -> u32 {
        match self {
            ReminderOffset::FourteenDays => 14,
            ReminderOffset::SevenDays => 7,
            ReminderOffset::ThreeDays => 3,
            ReminderOffset::OneDay => 1,
        }
    }

    /// Calendar date on which this reminder is due for an invoice.
    pub fn trigger_date(&self, due_date: NaiveDate) -> NaiveDate {
        due_date
            .checked_sub_days(Days::new(u64::from(self.days())))
            .unwrap_or(NaiveDate::MIN)
    }
}

impl TryFrom<i64> for ReminderOffset {
    type Error = InvoicingError;

    fn try_from(days: i64) -> Result<Self, Self::Error> {
        match days {
            14 => Ok(ReminderOffset::FourteenDays),
            7 => Ok(ReminderOffset::SevenDays),
            3 => Ok(ReminderOffset::ThreeDays),
            1 => Ok(ReminderOffset::OneDay),
            other => Err(InvoicingError::InvalidRequest(format!(
                "offset_days must be one of 14, 7, 3 or 1, got {}",
                other
            ))),
        }
    }
}

impl From<ReminderOffset> for i64 {
    fn from(offset: ReminderOffset) -> Self {
        i64::from(offset.days())
    }
}

impl fmt::Display for ReminderOffset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.days())
    }
}

/// Start of the trigger date in UTC.
pub fn trigger_instant(trigger_date: NaiveDate) -> DateTime<Utc> {
    Utc.from_utc_datetime(&trigger_date.and_time(NaiveTime::default()))
}

/// RFC3339 form used when a trigger time crosses a service boundary.
pub fn format_trigger(trigger_date: NaiveDate) -> String {
    trigger_instant(trigger_date).to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Delivery state of one (invoice, offset) pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatchState {
    Pending,
    Dispatching,
    Acked,
    Failed,
}

impl DispatchState {
    pub fn as_str(&self) -> &'static str {
        match self {
            DispatchState::Pending => "pending",
            DispatchState::Dispatching => "dispatching",
            DispatchState::Acked => "acked",
            DispatchState::Failed => "failed",
        }
    }
}

/// Idempotency key of a reminder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ReminderKey {
    pub invoice_id: Uuid,
    pub offset: ReminderOffset,
}

impl ReminderKey {
    pub fn new(invoice_id: Uuid, offset: ReminderOffset) -> Self {
        Self { invoice_id, offset }
    }
}

/// What the scheduler knows about one (invoice, offset) pair within the
/// current due-date cycle of the invoice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReminderRecord {
    pub invoice_id: Uuid,
    pub offset_days: ReminderOffset,
    pub due_date: NaiveDate,
    pub trigger_at: DateTime<Utc>,
    pub state: DispatchState,
    pub attempts: u32,
    pub last_error: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl ReminderRecord {
    pub fn new(key: ReminderKey, due_date: NaiveDate, state: DispatchState) -> Self {
        Self {
            invoice_id: key.invoice_id,
            offset_days: key.offset,
            due_date,
            trigger_at: trigger_instant(key.offset.trigger_date(due_date)),
            state,
            attempts: 0,
            last_error: None,
            updated_at: Utc::now(),
        }
    }

    pub fn key(&self) -> ReminderKey {
        ReminderKey::new(self.invoice_id, self.offset_days)
    }

    /// Start a new cycle for a moved due date.
    pub fn reset(&mut self, due_date: NaiveDate) {
        *self = Self::new(self.key(), due_date, DispatchState::Pending);
    }
}

/// Result of an on-demand reminder request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScheduleStatus {
    /// Delivered by this call.
    Sent,
    /// Already delivered for the current due date.
    AlreadySent,
    /// Another dispatch of the same pair is running.
    InFlight,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleOutcome {
    pub invoice_id: Uuid,
    pub offset_days: ReminderOffset,
    pub status: ScheduleStatus,
    /// RFC3339 trigger time of the pair.
    pub trigger_at: String,
    pub attempts: u32,
}

/// Tally of one scheduler cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CycleReport {
    pub invoices_scanned: usize,
    pub dispatched: usize,
    pub acked: usize,
    pub failed: usize,
    pub deferred: usize,
    pub missed: usize,
    pub directory_failures: usize,
}
