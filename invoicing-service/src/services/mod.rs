//! Services module for invoicing-service.

pub mod activity;
pub mod amounts;
pub mod customers;
pub mod database;
pub mod dispatcher;
pub mod invoices;
pub mod memory;
pub mod metrics;
pub mod notifier;
pub mod pagination;
pub mod sequencer;
pub mod store;
pub mod templates;

pub use activity::{ActivityPublisher, TracingActivityPublisher};
pub use customers::{CustomerDirectory, HttpCustomerDirectory, StaticCustomerDirectory};
pub use database::PgInvoiceStore;
pub use dispatcher::{DispatchReceipt, NotificationDispatcher};
pub use invoices::{InvoiceService, SentInvoice};
pub use memory::InMemoryInvoiceStore;
pub use metrics::{get_metrics, init_metrics};
pub use notifier::{
    EmailMessage, HttpNotificationSender, LoggingNotificationSender, NotificationSender, SendError,
};
pub use sequencer::NumberSequencer;
pub use store::InvoiceStore;
