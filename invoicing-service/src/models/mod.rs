//! Domain models for invoicing-service.

pub mod activity;
pub mod invoice;
pub mod reminder;

pub use activity::ActivityEvent;
pub use invoice::{
    CreatedInvoice, Invoice, InvoiceItem, InvoicePage, InvoiceStats, InvoiceStatus, InvoiceUpdate,
    NewInvoice, PaymentInfo, StatusSummary,
};
pub use reminder::{
    CycleReport, DispatchState, ReminderKey, ReminderOffset, ReminderRecord, ScheduleOutcome,
    ScheduleStatus,
};
