//! Activity event publishing.

use async_trait::async_trait;
use tracing::{info, warn};

use crate::models::ActivityEvent;

/// Receives activity events. Publishing never fails the operation that
/// produced the event.
#[async_trait]
pub trait ActivityPublisher: Send + Sync {
    async fn publish(&self, event: ActivityEvent);
}

/// Writes each event as a structured log line.
#[derive(Debug, Default, Clone)]
pub struct TracingActivityPublisher;

#[async_trait]
impl ActivityPublisher for TracingActivityPublisher {
    async fn publish(&self, event: ActivityEvent) {
        match serde_json::to_string(&event) {
            Ok(payload) => info!(
                activity = event.kind(),
                invoice_id = %event.invoice_id(),
                payload = %payload,
                "Activity"
            ),
            Err(e) => warn!(activity = event.kind(), error = %e, "Failed to encode activity event"),
        }
    }
}
