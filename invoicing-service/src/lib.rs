//! invoicing-service: invoice financial engine and due-date reminder scheduler.

pub mod config;
pub mod dtos;
pub mod error;
pub mod handlers;
pub mod models;
pub mod scheduler;
pub mod services;
pub mod startup;

pub use error::InvoicingError;
pub use startup::{build_router, AppState, Application};
