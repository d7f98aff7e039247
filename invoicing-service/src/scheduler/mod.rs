//! Due-date reminder scheduling.

pub mod ledger;
pub mod reminders;
pub mod scanner;

pub use ledger::ReminderLedger;
pub use reminders::{ReminderScheduler, SchedulerSettings, TriggerWindow};
pub use scanner::DueInvoiceScanner;
