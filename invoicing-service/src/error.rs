//! Domain errors for invoicing-service and their HTTP mapping.

use crate::services::metrics::ERRORS_TOTAL;
use service_core::error::AppError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum InvoicingError {
    #[error("{0} not found")]
    NotFound(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Validation failed: {0}")]
    Validation(#[from] validator::ValidationErrors),

    #[error("Invoice number sequence unavailable: {0}")]
    SequencerFailure(anyhow::Error),

    #[error("Notification to {recipient} failed after {attempts} attempts: {last_error}")]
    TerminalDispatchFailure {
        recipient: String,
        attempts: u32,
        last_error: String,
    },

    #[error("Upstream service failed: {0}")]
    CollaboratorFailure(anyhow::Error),

    #[error("Persistence failure: {0}")]
    PersistenceFailure(anyhow::Error),
}

impl InvoicingError {
    /// Label used for the errors metric.
    pub fn error_type(&self) -> &'static str {
        match self {
            InvoicingError::NotFound(_) => "not_found",
            InvoicingError::InvalidRequest(_) => "invalid_request",
            InvoicingError::Validation(_) => "validation",
            InvoicingError::SequencerFailure(_) => "sequencer_failure",
            InvoicingError::TerminalDispatchFailure { .. } => "terminal_dispatch_failure",
            InvoicingError::CollaboratorFailure(_) => "collaborator_failure",
            InvoicingError::PersistenceFailure(_) => "persistence_failure",
        }
    }

    pub fn persistence(context: &str, err: impl std::fmt::Display) -> Self {
        InvoicingError::PersistenceFailure(anyhow::anyhow!("{}: {}", context, err))
    }
}

impl From<InvoicingError> for AppError {
    fn from(err: InvoicingError) -> Self {
        ERRORS_TOTAL.with_label_values(&[err.error_type()]).inc();

        match err {
            InvoicingError::NotFound(what) => AppError::NotFound(anyhow::anyhow!("{} not found", what)),
            InvoicingError::InvalidRequest(msg) => AppError::BadRequest(anyhow::anyhow!(msg)),
            InvoicingError::Validation(errors) => AppError::ValidationError(errors),
            InvoicingError::SequencerFailure(e) => AppError::ServiceUnavailable(e.to_string()),
            e @ InvoicingError::TerminalDispatchFailure { .. } => AppError::BadGateway(e.to_string()),
            InvoicingError::CollaboratorFailure(e) => AppError::BadGateway(e.to_string()),
            InvoicingError::PersistenceFailure(e) => AppError::DatabaseError(e),
        }
    }
}
