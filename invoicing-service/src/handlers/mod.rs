pub mod health;
pub mod invoices;
pub mod reminders;

pub use health::{health_check, metrics_endpoint, readiness_check};
pub use invoices::{
    create_invoice, get_invoice, invoice_stats, list_invoices, send_invoice, update_invoice,
};
pub use reminders::{list_reminders, schedule_reminder};
