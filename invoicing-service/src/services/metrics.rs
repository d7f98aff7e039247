//! Prometheus metrics for invoicing-service.

use once_cell::sync::Lazy;
use prometheus::{
    register_counter_vec, register_histogram, register_histogram_vec, CounterVec, Histogram,
    HistogramVec, TextEncoder,
};

/// Invoices created, by currency.
pub static INVOICES_CREATED_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "invoicing_invoices_created_total",
        "Total number of invoices created",
        &["currency"]
    )
    .expect("Failed to register invoices_created_total")
});

/// Monetary amount counter by currency, in minor units.
pub static INVOICE_AMOUNT_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "invoicing_invoice_amount_total",
        "Total invoiced amount in minor units by currency",
        &["currency"]
    )
    .expect("Failed to register invoice_amount_total")
});

/// Error counter for alerting.
pub static ERRORS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "invoicing_errors_total",
        "Total number of errors by type",
        &["error_type"]
    )
    .expect("Failed to register errors_total")
});

/// Database query duration histogram.
pub static DB_QUERY_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "invoicing_db_query_duration_seconds",
        "Database query duration in seconds",
        &["operation"],
        vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0]
    )
    .expect("Failed to register db_query_duration")
});

/// Individual notification attempts by outcome.
pub static NOTIFICATION_ATTEMPTS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "invoicing_notification_attempts_total",
        "Total number of notification send attempts",
        &["outcome"] // success, failure
    )
    .expect("Failed to register notification_attempts_total")
});

/// Reminder pairs by offset and outcome.
pub static REMINDERS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "invoicing_reminders_total",
        "Total number of reminder dispatches by offset and outcome",
        &["offset_days", "outcome"] // acked, failed, directory_failure
    )
    .expect("Failed to register reminders_total")
});

/// Duration of a full scheduler cycle.
pub static SCHEDULER_CYCLE_DURATION: Lazy<Histogram> = Lazy::new(|| {
    register_histogram!(
        "invoicing_scheduler_cycle_duration_seconds",
        "Reminder scheduler cycle duration in seconds",
        vec![0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 15.0, 30.0, 60.0, 300.0]
    )
    .expect("Failed to register scheduler_cycle_duration")
});

/// Initialize all metrics (forces lazy initialization).
pub fn init_metrics() {
    Lazy::force(&INVOICES_CREATED_TOTAL);
    Lazy::force(&INVOICE_AMOUNT_TOTAL);
    Lazy::force(&ERRORS_TOTAL);
    Lazy::force(&DB_QUERY_DURATION);
    Lazy::force(&NOTIFICATION_ATTEMPTS_TOTAL);
    Lazy::force(&REMINDERS_TOTAL);
    Lazy::force(&SCHEDULER_CYCLE_DURATION);
}

/// Get metrics in Prometheus text format.
pub fn get_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    encoder
        .encode_to_string(&metric_families)
        .unwrap_or_default()
}
