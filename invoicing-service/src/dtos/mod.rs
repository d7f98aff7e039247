pub mod invoices;
pub mod reminders;

pub use invoices::{ListInvoicesParams, SendInvoiceResponse};
pub use reminders::{ReminderListResponse, ScheduleReminderRequest};
