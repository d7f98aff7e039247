//! Retry utilities for service-to-service calls.
//!
//! Provides bounded retry with exponential backoff and an optional per-attempt
//! timeout. The operation being retried decides which of its errors are worth
//! another attempt.

use rand::Rng;
use std::fmt;
use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use tokio::time::{sleep, timeout};
use tracing::{info, warn};

/// Configuration for retry behavior.
#[derive(Clone, Debug)]
pub struct RetryConfig {
    /// Total number of attempts, including the first one.
    pub max_attempts: u32,
    /// Backoff after the first failed attempt.
    pub initial_backoff: Duration,
    /// Maximum backoff duration.
    pub max_backoff: Duration,
    /// Backoff multiplier for exponential backoff.
    pub backoff_multiplier: f64,
    /// Whether to add jitter to backoff duration.
    pub add_jitter: bool,
    /// Upper bound for a single attempt. `None` leaves attempts unbounded.
    pub attempt_timeout: Option<Duration>,
    /// Also wait out the backoff after the last failed attempt before giving up.
    pub backoff_after_final_attempt: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            initial_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_secs(10),
            backoff_multiplier: 2.0,
            add_jitter: true,
            attempt_timeout: None,
            backoff_after_final_attempt: false,
        }
    }
}

impl RetryConfig {
    /// Policy for outbound notifications: 5 attempts, 100/200/400/800/1600 ms
    /// waits after each failure, 10 s per attempt, no jitter.
    pub fn notification() -> Self {
        Self {
            max_attempts: 5,
            initial_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_secs(10),
            backoff_multiplier: 2.0,
            add_jitter: false,
            attempt_timeout: Some(Duration::from_secs(10)),
            backoff_after_final_attempt: true,
        }
    }

    /// Backoff to wait after the failed attempt with the given zero-based index.
    pub fn backoff_duration(&self, attempt: u32) -> Duration {
        let backoff =
            self.initial_backoff.as_millis() as f64 * self.backoff_multiplier.powi(attempt as i32);
        let backoff_ms = backoff.min(self.max_backoff.as_millis() as f64) as u64;

        let mut duration = Duration::from_millis(backoff_ms);

        if self.add_jitter {
            // Up to 25% jitter
            let jitter = (backoff_ms as f64 * 0.25 * rand::thread_rng().r#gen::<f64>()) as u64;
            duration += Duration::from_millis(jitter);
        }

        duration
    }
}

/// Outcome of a single failed attempt.
#[derive(Debug)]
pub enum AttemptError<E> {
    /// The operation returned an error.
    Failed(E),
    /// The operation did not finish within the attempt timeout.
    TimedOut(Duration),
}

impl<E: fmt::Display> fmt::Display for AttemptError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttemptError::Failed(e) => write!(f, "{}", e),
            AttemptError::TimedOut(limit) => write!(f, "timed out after {:?}", limit),
        }
    }
}

/// Error returned once retrying stops.
#[derive(Debug, Error)]
pub enum RetryError<E: fmt::Debug + fmt::Display> {
    #[error("{operation} failed after {attempts} attempts: {last_error}")]
    Exhausted {
        operation: String,
        attempts: u32,
        last_error: AttemptError<E>,
    },

    #[error("{operation} failed with a permanent error on attempt {attempts}: {error}")]
    Permanent {
        operation: String,
        attempts: u32,
        error: E,
    },
}

impl<E: fmt::Debug + fmt::Display> RetryError<E> {
    /// Number of attempts made before giving up.
    pub fn attempts(&self) -> u32 {
        match self {
            RetryError::Exhausted { attempts, .. } | RetryError::Permanent { attempts, .. } => {
                *attempts
            }
        }
    }
}

/// Execute an async operation, retrying every failure.
///
/// # Example
/// ```ignore
/// let result = retry_with_backoff(&RetryConfig::notification(), "send_email", || async {
///     sender.send(&message).await
/// })
/// .await;
/// ```
pub async fn retry_with_backoff<F, Fut, T, E>(
    config: &RetryConfig,
    operation_name: &str,
    f: F,
) -> Result<T, RetryError<E>>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: fmt::Debug + fmt::Display,
{
    retry_with_backoff_if(config, operation_name, |_| true, f).await
}

/// Execute an async operation, retrying only failures accepted by `should_retry`.
///
/// Timed-out attempts are always retried.
pub async fn retry_with_backoff_if<F, Fut, T, E, P>(
    config: &RetryConfig,
    operation_name: &str,
    should_retry: P,
    f: F,
) -> Result<T, RetryError<E>>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: fmt::Debug + fmt::Display,
    P: Fn(&E) -> bool,
{
    let max_attempts = config.max_attempts.max(1);
    let mut attempt = 0;

    loop {
        let outcome = match config.attempt_timeout {
            Some(limit) => match timeout(limit, f()).await {
                Ok(result) => result.map_err(AttemptError::Failed),
                Err(_) => Err(AttemptError::TimedOut(limit)),
            },
            None => f().await.map_err(AttemptError::Failed),
        };

        let error = match outcome {
            Ok(result) => {
                if attempt > 0 {
                    info!(
                        operation = operation_name,
                        attempt = attempt + 1,
                        "Call succeeded after retry"
                    );
                }
                return Ok(result);
            }
            Err(AttemptError::Failed(e)) if !should_retry(&e) => {
                warn!(
                    operation = operation_name,
                    attempt = attempt + 1,
                    error = %e,
                    "Call failed with permanent error, not retrying"
                );
                return Err(RetryError::Permanent {
                    operation: operation_name.to_string(),
                    attempts: attempt + 1,
                    error: e,
                });
            }
            Err(error) => error,
        };

        let backoff = config.backoff_duration(attempt);
        let is_final = attempt + 1 >= max_attempts;

        if is_final {
            warn!(
                operation = operation_name,
                attempt = attempt + 1,
                error = %error,
                "Call failed after max attempts"
            );
            if config.backoff_after_final_attempt {
                sleep(backoff).await;
            }
            return Err(RetryError::Exhausted {
                operation: operation_name.to_string(),
                attempts: attempt + 1,
                last_error: error,
            });
        }

        warn!(
            operation = operation_name,
            attempt = attempt + 1,
            error = %error,
            backoff_ms = backoff.as_millis() as u64,
            "Call failed, retrying after backoff"
        );

        sleep(backoff).await;
        attempt += 1;
    }
}
