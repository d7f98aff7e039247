use serde::Deserialize;
use service_core::config::{self as core_config, get_env, is_production, optional_env, parse_env};
use service_core::error::AppError;
use service_core::retry::RetryConfig;
use std::time::Duration;

use crate::scheduler::SchedulerSettings;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreKind {
    Postgres,
    Memory,
}

impl std::str::FromStr for StoreKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "postgres" => Ok(StoreKind::Postgres),
            "memory" => Ok(StoreKind::Memory),
            other => Err(format!("unknown store '{}', expected postgres or memory", other)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: Option<String>,
    pub max_connections: u32,
    pub min_connections: u32,
}

#[derive(Debug, Clone)]
pub struct NotificationConfig {
    /// Base URL of notification-service. Unset logs messages instead.
    pub service_url: Option<String>,
    pub timeout: Duration,
    pub max_attempts: u32,
    pub initial_backoff: Duration,
}

impl NotificationConfig {
    /// Retry policy shared by every outbound notification.
    pub fn retry_policy(&self) -> RetryConfig {
        RetryConfig {
            max_attempts: self.max_attempts.max(1),
            initial_backoff: self.initial_backoff,
            attempt_timeout: Some(self.timeout),
            ..RetryConfig::notification()
        }
    }
}

#[derive(Debug, Clone)]
pub struct ReminderConfig {
    pub enabled: bool,
    pub settings: SchedulerSettings,
}

#[derive(Debug, Clone)]
pub struct InvoicingConfig {
    pub common: core_config::Config,
    pub service_name: String,
    pub log_level: String,
    pub otlp_endpoint: Option<String>,
    pub store: StoreKind,
    pub database: DatabaseConfig,
    pub notification: NotificationConfig,
    /// Base URL of customer-service. Unset means every lookup is `NotFound`.
    pub customer_service_url: Option<String>,
    /// Request timeout for customer-service lookups.
    pub customer_service_timeout: Duration,
    pub reminders: ReminderConfig,
    pub strict_page_tokens: bool,
}

impl InvoicingConfig {
    pub fn load() -> Result<Self, AppError> {
        let common_config = core_config::Config::load()?;
        let is_prod = is_production();

        let store: StoreKind = parse_env("INVOICE_STORE", StoreKind::Postgres)?;
        let database_url = match store {
            StoreKind::Postgres => Some(get_env("DATABASE_URL", None, is_prod)?),
            StoreKind::Memory => optional_env("DATABASE_URL"),
        };

        let otlp_endpoint = get_env("OTLP_ENDPOINT", Some("http://tempo:4317"), is_prod)?;

        let cadence_secs: u64 = parse_env("REMINDER_CADENCE_SECS", 86_400)?;
        if cadence_secs == 0 {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "REMINDER_CADENCE_SECS must be greater than zero"
            )));
        }

        Ok(InvoicingConfig {
            common: common_config,
            service_name: get_env("SERVICE_NAME", Some("invoicing-service"), is_prod)?,
            log_level: get_env("LOG_LEVEL", Some("info"), is_prod)?,
            otlp_endpoint: Some(otlp_endpoint).filter(|e| !e.trim().is_empty()),
            store,
            database: DatabaseConfig {
                url: database_url,
                max_connections: parse_env("DATABASE_MAX_CONNECTIONS", 10)?,
                min_connections: parse_env("DATABASE_MIN_CONNECTIONS", 1)?,
            },
            notification: NotificationConfig {
                service_url: optional_env("NOTIFICATION_SERVICE_URL"),
                timeout: Duration::from_secs(parse_env("NOTIFICATION_TIMEOUT_SECS", 10)?),
                max_attempts: parse_env("NOTIFICATION_MAX_ATTEMPTS", 5)?,
                initial_backoff: Duration::from_millis(parse_env(
                    "NOTIFICATION_INITIAL_BACKOFF_MS",
                    100,
                )?),
            },
            customer_service_url: optional_env("CUSTOMER_SERVICE_URL"),
            customer_service_timeout: Duration::from_secs(parse_env(
                "CUSTOMER_SERVICE_TIMEOUT_SECS",
                10,
            )?),
            reminders: ReminderConfig {
                enabled: parse_env("REMINDER_SCHEDULER_ENABLED", true)?,
                settings: SchedulerSettings {
                    cadence: Duration::from_secs(cadence_secs),
                    lookahead_days: parse_env("REMINDER_LOOKAHEAD_DAYS", 14)?,
                    max_concurrent_dispatches: parse_env("REMINDER_MAX_CONCURRENT_DISPATCHES", 8)?,
                },
            },
            strict_page_tokens: parse_env("STRICT_PAGE_TOKENS", false)?,
        })
    }
}
